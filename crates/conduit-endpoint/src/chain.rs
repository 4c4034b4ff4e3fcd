//! Factories that turn an endpoint's processors into an executable chain.

use std::fmt::Debug;
use std::sync::Arc;

use crate::descriptor::EndpointDescriptor;
use crate::error::ChainConstructionError;
use crate::index::{BoundSecurityFilter, BoundTransformer, EndpointIndex};
use crate::processor::{FilterProcessor, MessageProcessor, MessageProcessorChain};

/// Builds the chain an endpoint runs messages through. Invoked at most once per
/// endpoint instance.
pub trait EndpointChainFactory: Send + Sync + Debug {
    fn create_chain(&self, endpoint: &EndpointDescriptor) -> Result<MessageProcessorChain, ChainConstructionError>;
}

/// Chain layout used unless an endpoint is given another factory.
///
/// Request path: filter, security filter, transformers, message processors.
/// Request-response endpoints append a nested response chain of response
/// message processors followed by response transformers.
#[derive(Debug, Clone, Default)]
pub struct DefaultChainFactory {
    index: Arc<EndpointIndex>,
}

impl DefaultChainFactory {
    /// Binds transformers and security filters through `index`, which should be
    /// the index the endpoints are registered in.
    pub fn new(index: Arc<EndpointIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<EndpointIndex> {
        &self.index
    }

    fn response_chain(&self, endpoint: &EndpointDescriptor) -> MessageProcessorChain {
        let mut steps: Vec<Arc<dyn MessageProcessor>> = endpoint.response_message_processors().to_vec();
        steps.extend(endpoint.response_transformers().iter().map(|transformer| {
            Arc::new(BoundTransformer::new(endpoint.id(), Arc::clone(&self.index), Arc::clone(transformer)))
                as Arc<dyn MessageProcessor>
        }));
        MessageProcessorChain::new(format!("{}:response", chain_name(endpoint)), steps)
    }
}

impl EndpointChainFactory for DefaultChainFactory {
    fn create_chain(&self, endpoint: &EndpointDescriptor) -> Result<MessageProcessorChain, ChainConstructionError> {
        let mut steps: Vec<Arc<dyn MessageProcessor>> = Vec::new();

        if let Some(filter) = endpoint.filter() {
            steps.push(Arc::new(FilterProcessor::new(Arc::clone(filter))));
        }
        if let Some(security_filter) = endpoint.security_filter() {
            steps.push(Arc::new(BoundSecurityFilter::new(
                endpoint.id(),
                Arc::clone(&self.index),
                Arc::clone(security_filter),
            )));
        }
        for transformer in endpoint.transformers() {
            steps.push(Arc::new(BoundTransformer::new(
                endpoint.id(),
                Arc::clone(&self.index),
                Arc::clone(transformer),
            )));
        }
        steps.extend(endpoint.message_processors().iter().cloned());

        if endpoint.exchange_pattern().has_response() {
            let response = self.response_chain(endpoint);
            if !response.is_empty() {
                steps.push(Arc::new(response));
            }
        }

        Ok(MessageProcessorChain::new(chain_name(endpoint), steps))
    }
}

fn chain_name(endpoint: &EndpointDescriptor) -> String {
    endpoint
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| endpoint.endpoint_uri().sanitized().into_owned())
}
