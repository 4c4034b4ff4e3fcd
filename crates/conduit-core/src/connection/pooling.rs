//! Pooling decorator: bounds and reuses live connections.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tracing::{debug, trace, warn};

use crate::connection::provider::{
    BoxFuture, ConnectionProvider, ConnectionValidation, ProviderLayer,
};
use crate::error::ConnectionError;
use crate::retry::RetryPolicyTemplate;
use crate::shutdown::ShutdownSignal;

/// What `connect` does when every pool slot is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedAction {
    /// Fail immediately with a pool-exhausted error.
    Fail,
    /// Wait up to `max_wait` for a slot to be released.
    #[default]
    Wait,
    /// Hand out a connection beyond `max_active`.
    Grow,
}

/// Sizing and exhaustion behaviour of a connection pool.
///
/// `max_active` is capped at [`Semaphore::MAX_PERMITS`] when the pool is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolingProfile {
    pub max_active: usize,
    pub max_idle: usize,
    /// `None` waits indefinitely (shutdown still interrupts the wait).
    #[serde(with = "humantime_serde::option")]
    pub max_wait: Option<Duration>,
    pub exhausted_action: ExhaustedAction,
}

impl Default for PoolingProfile {
    fn default() -> Self {
        Self {
            max_active: 5,
            max_idle: 5,
            max_wait: Some(Duration::from_millis(4000)),
            exhausted_action: ExhaustedAction::Wait,
        }
    }
}

impl PoolingProfile {
    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_exhausted_action(mut self, action: ExhaustedAction) -> Self {
        self.exhausted_action = action;
        self
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently handed out.
    pub active: usize,
    /// Connections parked for reuse.
    pub idle: usize,
    pub max_active: usize,
}

/// A reserved pool slot. Dropping it uncommitted gives the slot back.
struct Slot<'a> {
    permit: Option<SemaphorePermit<'a>>,
}

/// A connection out of the idle set that has not been handed over yet.
/// Dropped while still held (the caller's future was cancelled), it is parked
/// again if there is room.
struct IdleLease<'a, C> {
    idle: &'a Mutex<Vec<Arc<C>>>,
    max_idle: usize,
    connection: Option<Arc<C>>,
}

impl<'a, C> IdleLease<'a, C> {
    fn new(idle: &'a Mutex<Vec<Arc<C>>>, max_idle: usize, connection: Arc<C>) -> Self {
        Self {
            idle,
            max_idle,
            connection: Some(connection),
        }
    }

    fn connection(&self) -> Option<&C> {
        self.connection.as_deref()
    }

    fn into_inner(mut self) -> Option<Arc<C>> {
        self.connection.take()
    }
}

impl<C> Drop for IdleLease<'_, C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let mut idle = lock(self.idle);
            if idle.len() < self.max_idle {
                idle.push(connection);
            }
        }
    }
}

/// The idle set is never locked across an await point.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`ConnectionProvider`] decorator bounding concurrently live connections.
///
/// `connect` reserves a slot, reuses a validated idle connection when one is
/// parked, and otherwise connects through the delegate under the retry policy.
/// A failed attempt drops its reservation, so no slot leaks. `disconnect`
/// returns the connection to the idle set (up to `max_idle`) and frees the slot.
pub struct PooledConnectionProvider<C> {
    delegate: Arc<dyn ConnectionProvider<C>>,
    profile: PoolingProfile,
    disable_validation: bool,
    retry_policy: Arc<RetryPolicyTemplate>,
    shutdown: ShutdownSignal,
    slots: Semaphore,
    idle: Mutex<Vec<Arc<C>>>,
    active: AtomicUsize,
    overflow: AtomicUsize,
}

impl<C> PooledConnectionProvider<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(
        delegate: Arc<dyn ConnectionProvider<C>>,
        mut profile: PoolingProfile,
        disable_validation: bool,
        retry_policy: Arc<RetryPolicyTemplate>,
        shutdown: ShutdownSignal,
    ) -> Self {
        if profile.max_active > Semaphore::MAX_PERMITS {
            warn!(
                requested = profile.max_active,
                limit = Semaphore::MAX_PERMITS,
                "max_active above the supported limit, capping"
            );
            profile.max_active = Semaphore::MAX_PERMITS;
        }
        Self {
            slots: Semaphore::new(profile.max_active),
            idle: Mutex::new(Vec::with_capacity(profile.max_idle.min(64))),
            delegate,
            profile,
            disable_validation,
            retry_policy,
            shutdown,
            active: AtomicUsize::new(0),
            overflow: AtomicUsize::new(0),
        }
    }

    pub fn profile(&self) -> &PoolingProfile {
        &self.profile
    }

    pub fn disable_validation(&self) -> bool {
        self.disable_validation
    }

    pub async fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active.load(Ordering::SeqCst),
            idle: lock(&self.idle).len(),
            max_active: self.profile.max_active,
        }
    }

    async fn reserve(&self) -> Result<Slot<'_>, ConnectionError> {
        match self.slots.try_acquire() {
            Ok(permit) => return Ok(Slot { permit: Some(permit) }),
            Err(TryAcquireError::Closed) => {
                return Err(ConnectionError::shutdown("connection pool is closed"))
            }
            Err(TryAcquireError::NoPermits) => {}
        }

        warn!(
            max_active = self.profile.max_active,
            action = ?self.profile.exhausted_action,
            "connection pool exhausted"
        );

        match self.profile.exhausted_action {
            ExhaustedAction::Fail => Err(ConnectionError::pool_exhausted(format!(
                "all {} pooled connections are in use",
                self.profile.max_active
            ))),
            ExhaustedAction::Grow => Ok(Slot { permit: None }),
            ExhaustedAction::Wait => {
                let acquire = async {
                    let acquired = match self.profile.max_wait {
                        Some(max_wait) => tokio::time::timeout(max_wait, self.slots.acquire())
                            .await
                            .map_err(|_| {
                                ConnectionError::pool_exhausted(format!(
                                    "no pooled connection released within {}ms",
                                    max_wait.as_millis()
                                ))
                            })?,
                        None => self.slots.acquire().await,
                    };
                    acquired.map_err(|_| ConnectionError::shutdown("connection pool is closed"))
                };

                tokio::select! {
                    permit = acquire => Ok(Slot { permit: Some(permit?) }),
                    _ = self.shutdown.triggered() => {
                        Err(ConnectionError::shutdown("waiting for a pooled connection aborted by shutdown"))
                    }
                }
            }
        }
    }

    fn commit(&self, slot: Slot<'_>) {
        match slot.permit {
            Some(permit) => permit.forget(),
            None => {
                self.overflow.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Frees the slot of a connection handed out earlier. Returns `false` when
    /// no connection was outstanding.
    fn release(&self) -> bool {
        let released = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| active.checked_sub(1))
            .is_ok();
        if !released {
            return false;
        }

        let was_overflow = self
            .overflow
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |overflow| overflow.checked_sub(1))
            .is_ok();
        if !was_overflow {
            self.slots.add_permits(1);
        }
        true
    }

    fn lease(&self, connection: Arc<C>) -> IdleLease<'_, C> {
        IdleLease::new(&self.idle, self.profile.max_idle, connection)
    }

    async fn take_idle(&self) -> Option<Arc<C>> {
        loop {
            let candidate = lock(&self.idle).pop()?;
            let lease = self.lease(candidate);
            if self.disable_validation {
                return lease.into_inner();
            }
            let validation = match lease.connection() {
                Some(connection) => self.delegate.validate(connection).await,
                None => continue,
            };
            match validation {
                ConnectionValidation::Valid => return lease.into_inner(),
                ConnectionValidation::Invalid { message } => {
                    debug!(reason = %message, "evicting idle connection that failed validation");
                    if let Some(candidate) = lease.into_inner() {
                        self.delegate.disconnect(candidate).await;
                    }
                }
            }
        }
    }

    async fn checkout(&self) -> Result<Arc<C>, ConnectionError> {
        let slot = self.reserve().await?;

        if let Some(connection) = self.take_idle().await {
            self.commit(slot);
            trace!("reusing idle pooled connection");
            return Ok(connection);
        }

        let connection = self
            .retry_policy
            .execute("pooled connection", &self.shutdown, || self.delegate.connect())
            .await?;
        self.commit(slot);
        Ok(connection)
    }

    async fn checkin(&self, connection: Arc<C>) {
        if !self.release() {
            trace!("disconnect of a connection the pool never handed out");
            self.delegate.disconnect(connection).await;
            return;
        }

        if !self.disable_validation && !self.delegate.validate(&connection).await.is_valid() {
            self.delegate.disconnect(connection).await;
            return;
        }

        let surplus = {
            let mut idle = lock(&self.idle);
            if idle.len() < self.profile.max_idle {
                idle.push(connection);
                None
            } else {
                Some(connection)
            }
        };
        if let Some(connection) = surplus {
            self.delegate.disconnect(connection).await;
        }
    }

    async fn drain(&self) {
        let parked: Vec<Arc<C>> = std::mem::take(&mut *lock(&self.idle));
        debug!(idle = parked.len(), "closing connection pool");
        for connection in parked {
            self.delegate.disconnect(connection).await;
        }
        self.delegate.close().await;
    }
}

impl<C> ConnectionProvider<C> for PooledConnectionProvider<C>
where
    C: Send + Sync + 'static,
{
    fn connect(&self) -> BoxFuture<'_, Result<Arc<C>, ConnectionError>> {
        Box::pin(self.checkout())
    }

    fn disconnect(&self, connection: Arc<C>) -> BoxFuture<'_, ()> {
        Box::pin(self.checkin(connection))
    }

    fn validate<'a>(&'a self, connection: &'a C) -> BoxFuture<'a, ConnectionValidation> {
        if self.disable_validation {
            return Box::pin(async { ConnectionValidation::Valid });
        }
        self.delegate.validate(connection)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.drain())
    }

    fn layer(&self) -> ProviderLayer {
        ProviderLayer::Pooled
    }

    fn delegate(&self) -> Option<&Arc<dyn ConnectionProvider<C>>> {
        Some(&self.delegate)
    }

    fn retry_policy(&self) -> Option<&Arc<RetryPolicyTemplate>> {
        Some(&self.retry_policy)
    }
}
