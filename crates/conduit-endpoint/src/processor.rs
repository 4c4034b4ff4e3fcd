//! Contracts of the pluggable pieces an endpoint is assembled from.
//!
//! Their behaviour belongs to transports and applications; this crate only
//! orders them into chains.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::trace;

use crate::descriptor::EndpointDescriptor;
use crate::error::ProcessingError;
use crate::message::Message;

/// One step of a chain. `Ok(None)` ends processing without an error.
pub trait MessageProcessor: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn process(&self, message: Message) -> Result<Option<Message>, ProcessingError>;
}

/// Converts a message. Receives its owning endpoint when the endpoint is
/// still registered.
pub trait Transformer: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn transform(&self, message: Message, owner: Option<&EndpointDescriptor>) -> Result<Message, ProcessingError>;
}

/// Decides whether a message is accepted by an endpoint.
pub trait Filter: Send + Sync + Debug {
    fn accept(&self, message: &Message) -> bool;
}

/// Authenticates messages passing through an endpoint.
pub trait SecurityFilter: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn authenticate(&self, message: Message, owner: Option<&EndpointDescriptor>) -> Result<Message, ProcessingError>;
}

/// The protocol adapter an endpoint is bound to.
pub trait Connector: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn protocol(&self) -> &str;

    fn supports_protocol(&self, protocol: &str) -> bool {
        self.protocol().eq_ignore_ascii_case(protocol)
    }
}

/// Ordered processors run one after another.
///
/// A chain is itself a [`MessageProcessor`], so chains nest.
#[derive(Debug, Clone)]
pub struct MessageProcessorChain {
    name: String,
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl MessageProcessorChain {
    pub fn new(name: impl Into<String>, processors: Vec<Arc<dyn MessageProcessor>>) -> Self {
        Self {
            name: name.into(),
            processors,
        }
    }

    pub fn processors(&self) -> &[Arc<dyn MessageProcessor>] {
        &self.processors
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Names of the direct steps in execution order.
    pub fn step_names(&self) -> Vec<String> {
        self.processors.iter().map(|processor| processor.name().to_owned()).collect()
    }
}

impl MessageProcessor for MessageProcessorChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, message: Message) -> Result<Option<Message>, ProcessingError> {
        let mut current = message;
        for processor in &self.processors {
            match processor.process(current)? {
                Some(next) => current = next,
                None => {
                    trace!(chain = %self.name, processor = processor.name(), "chain stopped");
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }
}

/// Applies a [`Filter`]; a rejected message ends the chain.
#[derive(Debug, Clone)]
pub struct FilterProcessor {
    filter: Arc<dyn Filter>,
}

impl FilterProcessor {
    pub fn new(filter: Arc<dyn Filter>) -> Self {
        Self { filter }
    }
}

impl MessageProcessor for FilterProcessor {
    fn name(&self) -> &str {
        "filter"
    }

    fn process(&self, message: Message) -> Result<Option<Message>, ProcessingError> {
        if self.filter.accept(&message) {
            Ok(Some(message))
        } else {
            trace!("message rejected by endpoint filter");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    struct Append(&'static str);

    impl MessageProcessor for Append {
        fn name(&self) -> &str {
            self.0
        }

        fn process(&self, message: Message) -> Result<Option<Message>, ProcessingError> {
            let payload = format!("{}{}", message.payload().as_str().unwrap_or_default(), self.0);
            Ok(Some(message.with_payload(payload)))
        }
    }

    #[derive(Debug)]
    struct NonEmpty;

    impl Filter for NonEmpty {
        fn accept(&self, message: &Message) -> bool {
            message.payload().as_str().is_some_and(|payload| !payload.is_empty())
        }
    }

    #[derive(Debug)]
    struct Jms;

    impl Connector for Jms {
        fn name(&self) -> &str {
            "jms-connector"
        }

        fn protocol(&self) -> &str {
            "jms"
        }
    }

    #[test]
    fn chain_runs_processors_in_order() {
        let chain = MessageProcessorChain::new(
            "abc",
            vec![Arc::new(Append("a")), Arc::new(Append("b")), Arc::new(Append("c"))],
        );

        let processed = chain.process(Message::new(">")).expect("processes").expect("not filtered");

        assert_eq!(processed.payload(), &json!(">abc"));
        assert_eq!(chain.step_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn rejected_message_stops_the_chain() {
        let chain = MessageProcessorChain::new(
            "filtered",
            vec![Arc::new(FilterProcessor::new(Arc::new(NonEmpty))), Arc::new(Append("x"))],
        );

        assert_eq!(chain.process(Message::new("")).expect("processes"), None);
        assert!(chain.process(Message::new("y")).expect("processes").is_some());
    }

    #[test]
    fn connector_protocol_match_ignores_case() {
        assert!(Jms.supports_protocol("JMS"));
        assert!(!Jms.supports_protocol("amqp"));
    }
}
