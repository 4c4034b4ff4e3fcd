//! The connection provider contract shared by raw providers and their decorators.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConnectionError;
use crate::retry::RetryPolicyTemplate;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a liveness check on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionValidation {
    Valid,
    Invalid { message: String },
}

impl ConnectionValidation {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Which policy a provider in a decorator stack implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderLayer {
    Raw,
    Pooled,
    Cached,
}

impl ProviderLayer {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Pooled => "pooled",
            Self::Cached => "cached",
        }
    }
}

impl Display for ProviderLayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Factory and manager of live connections of type `C`.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`connect`](ConnectionProvider::connect) | Establish (or hand out) a connection |
/// | [`disconnect`](ConnectionProvider::disconnect) | Release a connection obtained from `connect` |
/// | [`validate`](ConnectionProvider::validate) | Report whether a connection is still usable |
///
/// The remaining methods have defaults suited to raw providers; decorators
/// override them so the runtime can inspect the stack.
///
/// # Thread Safety
///
/// Providers are long-lived and shared across tasks, so implementations must be
/// `Send + Sync`.
pub trait ConnectionProvider<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    /// Establishes a connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the external system cannot be reached.
    /// Errors marked retryable are retried by decorators under their policy.
    fn connect(&self) -> BoxFuture<'_, Result<Arc<C>, ConnectionError>>;

    /// Releases a connection. Must tolerate connections that were never fully established.
    fn disconnect(&self, connection: Arc<C>) -> BoxFuture<'_, ()>;

    fn validate<'a>(&'a self, connection: &'a C) -> BoxFuture<'a, ConnectionValidation>;

    /// Releases everything the provider still holds. Safe to call repeatedly.
    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn layer(&self) -> ProviderLayer {
        ProviderLayer::Raw
    }

    /// The provider this one decorates, if any.
    fn delegate(&self) -> Option<&Arc<dyn ConnectionProvider<C>>> {
        None
    }

    /// The retry policy this provider applies around `connect`, if any.
    fn retry_policy(&self) -> Option<&Arc<RetryPolicyTemplate>> {
        None
    }
}

/// Layers of a decorated provider, outermost first.
pub fn layers<C, P>(provider: &P) -> Vec<ProviderLayer>
where
    C: Send + Sync + 'static,
    P: ConnectionProvider<C> + ?Sized,
{
    let mut layers = vec![provider.layer()];
    let mut current = provider.delegate();
    while let Some(next) = current {
        layers.push(next.layer());
        current = next.delegate();
    }
    layers
}
