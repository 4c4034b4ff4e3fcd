//! Non-owning association from transformers and security filters back to the
//! endpoint that contains them.
//!
//! Ownership only runs endpoint → chain → processor. A bound processor keeps the
//! owner's [`EndpointId`] and looks the endpoint up in an [`EndpointIndex`]
//! when it runs.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::descriptor::EndpointDescriptor;
use crate::error::ProcessingError;
use crate::message::Message;
use crate::processor::{MessageProcessor, SecurityFilter, Transformer};

/// Lifecycle identity of an endpoint instance. Not part of endpoint equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(Uuid);

impl EndpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EndpointId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry of live endpoints keyed by id. Holds weak references only.
#[derive(Debug, Default)]
pub struct EndpointIndex {
    endpoints: DashMap<EndpointId, Weak<EndpointDescriptor>>,
}

impl EndpointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `endpoint`, registers it and hands back the shared handle.
    ///
    /// An endpoint without an explicit chain factory resolves the owners of its
    /// transformers and security filter through this index from now on.
    pub fn register(self: &Arc<Self>, mut endpoint: EndpointDescriptor) -> Arc<EndpointDescriptor> {
        endpoint.attach_index(Arc::clone(self));
        let endpoint = Arc::new(endpoint);
        self.endpoints.insert(endpoint.id(), Arc::downgrade(&endpoint));
        trace!(endpoint_id = %endpoint.id(), uri = %endpoint.endpoint_uri(), "endpoint registered");
        endpoint
    }

    /// The endpoint with `id`, if it is registered and still alive.
    pub fn get(&self, id: EndpointId) -> Option<Arc<EndpointDescriptor>> {
        self.endpoints.get(&id).and_then(|entry| entry.upgrade())
    }

    pub fn remove(&self, id: EndpointId) -> bool {
        self.endpoints.remove(&id).is_some()
    }

    /// Drops entries whose endpoint no longer exists.
    pub fn purge(&self) {
        self.endpoints.retain(|_, endpoint| endpoint.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// A [`Transformer`] bound to its owning endpoint.
#[derive(Debug, Clone)]
pub struct BoundTransformer {
    owner: EndpointId,
    index: Arc<EndpointIndex>,
    transformer: Arc<dyn Transformer>,
}

impl BoundTransformer {
    pub fn new(owner: EndpointId, index: Arc<EndpointIndex>, transformer: Arc<dyn Transformer>) -> Self {
        Self {
            owner,
            index,
            transformer,
        }
    }

    pub fn owner_id(&self) -> EndpointId {
        self.owner
    }

    pub fn owner(&self) -> Option<Arc<EndpointDescriptor>> {
        self.index.get(self.owner)
    }
}

impl MessageProcessor for BoundTransformer {
    fn name(&self) -> &str {
        self.transformer.name()
    }

    fn process(&self, message: Message) -> Result<Option<Message>, ProcessingError> {
        let owner = self.owner();
        self.transformer.transform(message, owner.as_deref()).map(Some)
    }
}

/// A [`SecurityFilter`] bound to its owning endpoint.
#[derive(Debug, Clone)]
pub struct BoundSecurityFilter {
    owner: EndpointId,
    index: Arc<EndpointIndex>,
    filter: Arc<dyn SecurityFilter>,
}

impl BoundSecurityFilter {
    pub fn new(owner: EndpointId, index: Arc<EndpointIndex>, filter: Arc<dyn SecurityFilter>) -> Self {
        Self { owner, index, filter }
    }

    pub fn owner_id(&self) -> EndpointId {
        self.owner
    }

    pub fn owner(&self) -> Option<Arc<EndpointDescriptor>> {
        self.index.get(self.owner)
    }
}

impl MessageProcessor for BoundSecurityFilter {
    fn name(&self) -> &str {
        self.filter.name()
    }

    fn process(&self, message: Message) -> Result<Option<Message>, ProcessingError> {
        let owner = self.owner();
        self.filter.authenticate(message, owner.as_deref()).map(Some)
    }
}
