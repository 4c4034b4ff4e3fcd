//! Caching decorator: one shared connection for every caller.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::connection::provider::{
    BoxFuture, ConnectionProvider, ConnectionValidation, ProviderLayer,
};
use crate::error::ConnectionError;
use crate::retry::RetryPolicyTemplate;
use crate::shutdown::ShutdownSignal;

/// [`ConnectionProvider`] decorator memoizing a single connection.
///
/// The first `connect` establishes the connection through the delegate under
/// the retry policy; concurrent first callers wait on the same attempt, so the
/// delegate sees exactly one successful `connect`. A failed attempt caches
/// nothing and the next caller tries again.
///
/// `disconnect` of the shared connection is a no-op: it stays alive for the
/// other callers until [`close`](ConnectionProvider::close).
pub struct CachedConnectionProvider<C> {
    delegate: Arc<dyn ConnectionProvider<C>>,
    disable_validation: bool,
    retry_policy: Arc<RetryPolicyTemplate>,
    shutdown: ShutdownSignal,
    connection: ArcSwapOption<C>,
    establishing: Mutex<()>,
}

impl<C> CachedConnectionProvider<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(
        delegate: Arc<dyn ConnectionProvider<C>>,
        disable_validation: bool,
        retry_policy: Arc<RetryPolicyTemplate>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            delegate,
            disable_validation,
            retry_policy,
            shutdown,
            connection: ArcSwapOption::empty(),
            establishing: Mutex::new(()),
        }
    }

    pub fn disable_validation(&self) -> bool {
        self.disable_validation
    }

    pub fn is_connected(&self) -> bool {
        self.connection.load().is_some()
    }

    async fn shared(&self) -> Result<Arc<C>, ConnectionError> {
        if let Some(connection) = self.connection.load_full() {
            return Ok(connection);
        }

        let _guard = self.establishing.lock().await;
        if let Some(connection) = self.connection.load_full() {
            return Ok(connection);
        }

        let connection = self
            .retry_policy
            .execute("cached connection", &self.shutdown, || self.delegate.connect())
            .await?;
        self.connection.store(Some(Arc::clone(&connection)));
        debug!("cached connection established");
        Ok(connection)
    }

    async fn release(&self, connection: Arc<C>) {
        let is_shared = self
            .connection
            .load()
            .as_ref()
            .is_some_and(|shared| Arc::ptr_eq(shared, &connection));
        if is_shared {
            trace!("keeping cached connection alive for other callers");
            return;
        }
        self.delegate.disconnect(connection).await;
    }

    async fn evict(&self) {
        let _guard = self.establishing.lock().await;
        if let Some(connection) = self.connection.swap(None) {
            debug!("closing cached connection");
            self.delegate.disconnect(connection).await;
        }
        self.delegate.close().await;
    }
}

impl<C> ConnectionProvider<C> for CachedConnectionProvider<C>
where
    C: Send + Sync + 'static,
{
    fn connect(&self) -> BoxFuture<'_, Result<Arc<C>, ConnectionError>> {
        Box::pin(self.shared())
    }

    fn disconnect(&self, connection: Arc<C>) -> BoxFuture<'_, ()> {
        Box::pin(self.release(connection))
    }

    fn validate<'a>(&'a self, connection: &'a C) -> BoxFuture<'a, ConnectionValidation> {
        if self.disable_validation {
            return Box::pin(async { ConnectionValidation::Valid });
        }
        self.delegate.validate(connection)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.evict())
    }

    fn layer(&self) -> ProviderLayer {
        ProviderLayer::Cached
    }

    fn delegate(&self) -> Option<&Arc<dyn ConnectionProvider<C>>> {
        Some(&self.delegate)
    }

    fn retry_policy(&self) -> Option<&Arc<RetryPolicyTemplate>> {
        Some(&self.retry_policy)
    }
}
