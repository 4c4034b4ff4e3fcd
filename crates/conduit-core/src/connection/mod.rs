//! # Connection Providers
//!
//! The provider contract, its pooling and caching decorators, and the builder
//! that assembles them from a provider model.
//!
//! ## Decorator Order
//!
//! | Handling type | Resulting stack (outermost first) |
//! |---------------|-----------------------------------|
//! | absent | raw |
//! | `NONE` | raw |
//! | `POOLED` | pooled → raw |
//! | `CACHED` | cached → raw |
//! | `POOLED_CACHED` | cached → pooled → raw |
//!
//! Every decorator applies the retry policy resolved when the provider was
//! built, and observes the connection manager's shutdown signal.

mod builder;
mod caching;
mod manager;
mod pooling;
mod provider;

pub use builder::{ConnectionHandlingType, ConnectionProviderBuilder, ConnectionProviderModel};
pub use caching::CachedConnectionProvider;
pub use manager::{ConnectionManager, DefaultConnectionManager};
pub use pooling::{ExhaustedAction, PoolStats, PooledConnectionProvider, PoolingProfile};
pub use provider::{layers, BoxFuture, ConnectionProvider, ConnectionValidation, ProviderLayer};
