//! Process-wide connection management: the default retry policy and shutdown.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::retry::RetryPolicyTemplate;
use crate::shutdown::{ShutdownSignal, ShutdownTrigger};

/// Collaborator consulted by the provider builder.
pub trait ConnectionManager: Send + Sync {
    /// Retry policy applied to providers that do not configure one. `None`
    /// means no default is registered.
    fn default_retry_policy_template(&self) -> Option<Arc<RetryPolicyTemplate>>;

    /// Signal observed by retry loops and pool waiters of built providers.
    fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::never()
    }
}

/// [`ConnectionManager`] with a replaceable default template.
///
/// Replacing the default affects later builds only; providers already built keep
/// the template they captured.
#[derive(Debug)]
pub struct DefaultConnectionManager {
    default_template: ArcSwapOption<RetryPolicyTemplate>,
    shutdown: ShutdownTrigger,
}

impl Default for DefaultConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultConnectionManager {
    /// Manager whose default is [`RetryPolicyTemplate::default`].
    pub fn new() -> Self {
        Self::with_default_retry_policy(RetryPolicyTemplate::default())
    }

    pub fn with_default_retry_policy(template: RetryPolicyTemplate) -> Self {
        let (shutdown, _) = ShutdownSignal::channel();
        Self {
            default_template: ArcSwapOption::from_pointee(template),
            shutdown,
        }
    }

    /// Manager with no default registered. Builds that need a retry policy and
    /// do not configure one fail.
    pub fn without_default() -> Self {
        let (shutdown, _) = ShutdownSignal::channel();
        Self {
            default_template: ArcSwapOption::empty(),
            shutdown,
        }
    }

    pub fn set_default_retry_policy_template(&self, template: RetryPolicyTemplate) {
        debug!(max_retries = template.max_retries, "default retry policy replaced");
        self.default_template.store(Some(Arc::new(template)));
    }

    pub fn clear_default_retry_policy_template(&self) {
        debug!("default retry policy cleared");
        self.default_template.store(None);
    }

    /// Aborts every in-flight retry loop and pool wait of providers built
    /// against this manager.
    pub fn shutdown(&self) {
        debug!("connection manager shutting down");
        self.shutdown.trigger();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

impl ConnectionManager for DefaultConnectionManager {
    fn default_retry_policy_template(&self) -> Option<Arc<RetryPolicyTemplate>> {
        self.default_template.load_full()
    }

    fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }
}
