//! # Conduit Core
//!
//! Resource construction for the conduit integration runtime: turning resolved
//! parameter values into live objects, and connection providers into
//! pooled, cached and retrying ones.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | Provider contract, decorators, manager and provider builder |
//! | [`error`] | Construction, build and connection errors |
//! | [`object_builder`] | Factory-driven construction from resolved parameters |
//! | [`parameter`] | Parameter and parameter-group models |
//! | [`resolver`] | Resolver sets and their resolved snapshots |
//! | [`retry`] | Retry policy templates and backoff |
//! | [`shutdown`] | Shutdown trigger and signal |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use conduit_core::{
//!     ConnectionHandlingType, ConnectionProviderBuilder, ConnectionProviderModel,
//!     DefaultConnectionManager, ResolverSetResult,
//! };
//!
//! let model = ConnectionProviderModel::new("ftp", factory, parameters)
//!     .with_handling_type(ConnectionHandlingType::POOLED);
//! let manager = Arc::new(DefaultConnectionManager::new());
//! let provider = ConnectionProviderBuilder::new(&model, resolvers, manager)
//!     .build(&ResolverSetResult::builder().add("host", "ftp.example.com").build())?;
//!
//! let connection = provider.connect().await?;
//! provider.disconnect(connection).await;
//! ```

pub mod connection;
pub mod error;
pub mod object_builder;
pub mod parameter;
pub mod resolver;
pub mod retry;
pub mod shutdown;

// Connection providers
pub use connection::{
    layers, BoxFuture, CachedConnectionProvider, ConnectionHandlingType, ConnectionManager,
    ConnectionProvider, ConnectionProviderBuilder, ConnectionProviderModel, ConnectionValidation,
    DefaultConnectionManager, ExhaustedAction, PoolStats, PooledConnectionProvider, PoolingProfile,
    ProviderLayer,
};

// Error types
pub use error::{
    ConnectionError, ConnectionErrorKind, ConstructionError, ConstructionErrorKind, ParameterError,
    ProviderBuildError, ResolutionError,
};

// Construction
pub use object_builder::{FnObjectFactory, ObjectBuilder, ObjectFactory};
pub use parameter::{
    expect_bool, expect_str, expect_u64, Configurable, ParameterGroupModel, ParameterGroupValues,
    ParameterModel, ParameterizedModel,
};
pub use resolver::{
    ContextValueResolver, ResolutionContext, ResolverSet, ResolverSetResult,
    ResolverSetResultBuilder, StaticValueResolver, ValueResolver,
};

// Retry and shutdown
pub use retry::{Backoff, RetryPolicyTemplate};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
