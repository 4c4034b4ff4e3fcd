//! Builds connection providers from their models and decorates them.

use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::caching::CachedConnectionProvider;
use crate::connection::manager::ConnectionManager;
use crate::connection::pooling::{PoolingProfile, PooledConnectionProvider};
use crate::connection::provider::{layers, ConnectionProvider, ProviderLayer};
use crate::error::ProviderBuildError;
use crate::object_builder::{ObjectBuilder, ObjectFactory};
use crate::parameter::{Configurable, ParameterizedModel};
use crate::resolver::{ResolutionContext, ResolverSet, ResolverSetResult};
use crate::retry::RetryPolicyTemplate;
use crate::shutdown::ShutdownSignal;

/// Connection handling requested by a provider model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionHandlingType {
    pub pooled: bool,
    pub cached: bool,
}

impl ConnectionHandlingType {
    pub const NONE: Self = Self {
        pooled: false,
        cached: false,
    };
    pub const POOLED: Self = Self {
        pooled: true,
        cached: false,
    };
    pub const CACHED: Self = Self {
        pooled: false,
        cached: true,
    };
    pub const POOLED_CACHED: Self = Self {
        pooled: true,
        cached: true,
    };

    pub const fn is_pooled(self) -> bool {
        self.pooled
    }

    pub const fn is_cached(self) -> bool {
        self.cached
    }
}

/// Describes a connection-provider type: how to instantiate it, which
/// parameters it takes and which connection handling it asks for.
///
/// A model without a handling type produces undecorated providers.
pub struct ConnectionProviderModel<P> {
    name: String,
    factory: Arc<dyn ObjectFactory<P>>,
    parameters: Arc<ParameterizedModel>,
    handling: Option<ConnectionHandlingType>,
}

impl<P> Clone for ConnectionProviderModel<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            factory: Arc::clone(&self.factory),
            parameters: Arc::clone(&self.parameters),
            handling: self.handling,
        }
    }
}

impl<P> Debug for ConnectionProviderModel<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProviderModel")
            .field("name", &self.name)
            .field("object_type", &self.factory.object_type())
            .field("handling", &self.handling)
            .finish_non_exhaustive()
    }
}

impl<P> ConnectionProviderModel<P> {
    pub fn new(
        name: impl Into<String>,
        factory: Arc<dyn ObjectFactory<P>>,
        parameters: ParameterizedModel,
    ) -> Self {
        Self {
            name: name.into(),
            factory,
            parameters: Arc::new(parameters),
            handling: None,
        }
    }

    pub fn with_handling_type(mut self, handling: ConnectionHandlingType) -> Self {
        self.handling = Some(handling);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &ParameterizedModel {
        &self.parameters
    }

    pub fn handling_type(&self) -> Option<ConnectionHandlingType> {
        self.handling
    }
}

/// Values every decorator of one build closes over.
struct Decoration<'a> {
    pooling_profile: &'a PoolingProfile,
    disable_validation: bool,
    retry_policy: &'a Arc<RetryPolicyTemplate>,
    shutdown: &'a ShutdownSignal,
}

type Decorate<C> = fn(Arc<dyn ConnectionProvider<C>>, &Decoration<'_>) -> Arc<dyn ConnectionProvider<C>>;

struct DecoratorSpec<C> {
    layer: ProviderLayer,
    applies: fn(ConnectionHandlingType) -> bool,
    decorate: Decorate<C>,
}

/// Decorators in application order, innermost first: caching always ends up
/// outermost when both are requested.
fn decorator_specs<C>() -> [DecoratorSpec<C>; 2]
where
    C: Send + Sync + 'static,
{
    [
        DecoratorSpec {
            layer: ProviderLayer::Pooled,
            applies: ConnectionHandlingType::is_pooled,
            decorate: |provider, decoration| {
                Arc::new(PooledConnectionProvider::new(
                    provider,
                    decoration.pooling_profile.clone(),
                    decoration.disable_validation,
                    Arc::clone(decoration.retry_policy),
                    decoration.shutdown.clone(),
                ))
            },
        },
        DecoratorSpec {
            layer: ProviderLayer::Cached,
            applies: ConnectionHandlingType::is_cached,
            decorate: |provider, decoration| {
                Arc::new(CachedConnectionProvider::new(
                    provider,
                    decoration.disable_validation,
                    Arc::clone(decoration.retry_policy),
                    decoration.shutdown.clone(),
                ))
            },
        },
    ]
}

/// [`ObjectBuilder`] specialised for connection providers.
///
/// `build` instantiates the raw provider `P`, then wraps it according to the
/// model's handling type. The effective retry policy is the configured template,
/// or else the manager's default at the time of the call; the decorators keep
/// that exact template for their whole lifetime. Building performs no I/O.
///
/// ```rust,ignore
/// let builder = ConnectionProviderBuilder::new(&model, resolvers, manager)
///     .with_pooling_profile(PoolingProfile::default().with_max_active(10));
/// let provider = builder.build(&resolved)?;
/// let connection = provider.connect().await?;
/// ```
pub struct ConnectionProviderBuilder<P, C> {
    provider_name: String,
    base: ObjectBuilder<P>,
    handling: Option<ConnectionHandlingType>,
    pooling_profile: PoolingProfile,
    disable_validation: bool,
    retry_policy: Option<Arc<RetryPolicyTemplate>>,
    manager: Arc<dyn ConnectionManager>,
    _connection: PhantomData<fn() -> C>,
}

impl<P, C> Debug for ConnectionProviderBuilder<P, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProviderBuilder")
            .field("provider_name", &self.provider_name)
            .field("handling", &self.handling)
            .field("pooling_profile", &self.pooling_profile)
            .field("disable_validation", &self.disable_validation)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl<P, C> ConnectionProviderBuilder<P, C>
where
    P: ConnectionProvider<C> + Configurable + 'static,
    C: Send + Sync + 'static,
{
    pub fn new(
        model: &ConnectionProviderModel<P>,
        resolver_set: ResolverSet,
        manager: Arc<dyn ConnectionManager>,
    ) -> Self {
        Self {
            provider_name: model.name.clone(),
            base: ObjectBuilder::new(
                Arc::clone(&model.factory),
                Arc::clone(&model.parameters),
                resolver_set,
            ),
            handling: model.handling,
            pooling_profile: PoolingProfile::default(),
            disable_validation: false,
            retry_policy: None,
            manager,
            _connection: PhantomData,
        }
    }

    pub fn with_pooling_profile(mut self, profile: PoolingProfile) -> Self {
        self.pooling_profile = profile;
        self
    }

    /// Makes every decorator report connections as valid without checking.
    pub fn with_disable_validation(mut self, disable_validation: bool) -> Self {
        self.disable_validation = disable_validation;
        self
    }

    /// Overrides the connection manager's default retry policy.
    pub fn with_retry_policy_template(mut self, template: impl Into<Arc<RetryPolicyTemplate>>) -> Self {
        self.retry_policy = Some(template.into());
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn pooling_profile(&self) -> &PoolingProfile {
        &self.pooling_profile
    }

    /// Whether the raw provider depends on the resolution context.
    pub fn is_dynamic(&self) -> bool {
        self.base.is_dynamic()
    }

    /// Resolves the parameter values for `context`, then builds.
    pub fn resolve_and_build(
        &self,
        context: &ResolutionContext,
    ) -> Result<Arc<dyn ConnectionProvider<C>>, ProviderBuildError> {
        let raw = self
            .base
            .resolve_and_build(context)
            .map_err(|source| self.construction_error(source))?;
        self.decorate(raw)
    }

    /// Builds and decorates a provider from an already resolved snapshot.
    ///
    /// # Errors
    ///
    /// - [`ProviderBuildError::Construction`] when the raw provider cannot be
    ///   instantiated or configured.
    /// - [`ProviderBuildError::RetryPolicyUnavailable`] when decoration is
    ///   requested, no template is configured and the manager has no default.
    pub fn build(&self, result: &ResolverSetResult) -> Result<Arc<dyn ConnectionProvider<C>>, ProviderBuildError> {
        let raw = self
            .base
            .build(result)
            .map_err(|source| self.construction_error(source))?;
        self.decorate(raw)
    }

    fn decorate(&self, raw: P) -> Result<Arc<dyn ConnectionProvider<C>>, ProviderBuildError> {
        let raw: Arc<dyn ConnectionProvider<C>> = Arc::new(raw);
        let Some(handling) = self.handling else {
            debug!(provider = %self.provider_name, "connection provider built without connection handling");
            return Ok(raw);
        };

        let retry_policy = self.effective_retry_policy()?;
        let shutdown = self.manager.shutdown_signal();
        let decoration = Decoration {
            pooling_profile: &self.pooling_profile,
            disable_validation: self.disable_validation,
            retry_policy: &retry_policy,
            shutdown: &shutdown,
        };

        let provider = decorator_specs::<C>()
            .iter()
            .filter(|spec| (spec.applies)(handling))
            .fold(raw, |provider, spec| {
                debug!(provider = %self.provider_name, layer = %spec.layer, "applying connection decorator");
                (spec.decorate)(provider, &decoration)
            });

        debug!(
            provider = %self.provider_name,
            layers = ?layers::<C, _>(provider.as_ref()),
            max_retries = retry_policy.max_retries,
            "connection provider built"
        );
        Ok(provider)
    }

    fn effective_retry_policy(&self) -> Result<Arc<RetryPolicyTemplate>, ProviderBuildError> {
        if let Some(template) = &self.retry_policy {
            return Ok(Arc::clone(template));
        }
        self.manager
            .default_retry_policy_template()
            .ok_or_else(|| ProviderBuildError::RetryPolicyUnavailable {
                provider: self.provider_name.clone(),
            })
    }

    fn construction_error(&self, source: crate::error::ConstructionError) -> ProviderBuildError {
        ProviderBuildError::Construction {
            provider: self.provider_name.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handling_type_constants() {
        assert!(!ConnectionHandlingType::NONE.is_pooled());
        assert!(!ConnectionHandlingType::NONE.is_cached());
        assert!(ConnectionHandlingType::POOLED.is_pooled());
        assert!(ConnectionHandlingType::CACHED.is_cached());
        assert_eq!(ConnectionHandlingType::default(), ConnectionHandlingType::NONE);
    }

    #[test]
    fn handling_type_deserializes_missing_flags_as_false() {
        let handling: ConnectionHandlingType =
            serde_json::from_str(r#"{"cached": true}"#).expect("valid handling type");
        assert_eq!(handling, ConnectionHandlingType::CACHED);
    }

    #[test]
    fn decorators_apply_pooling_before_caching() {
        let order: Vec<ProviderLayer> = decorator_specs::<String>()
            .iter()
            .filter(|spec| (spec.applies)(ConnectionHandlingType::POOLED_CACHED))
            .map(|spec| spec.layer)
            .collect();
        assert_eq!(order, vec![ProviderLayer::Pooled, ProviderLayer::Cached]);
    }
}
