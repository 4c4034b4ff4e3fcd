//! Generic construction of live objects from resolved parameter values.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::error::{ConstructionError, ConstructionErrorKind};
use crate::parameter::{Configurable, ParameterizedModel};
use crate::resolver::{ResolutionContext, ResolverSet, ResolverSetResult};

/// Produces blank instances of `T` for the object builder to populate.
pub trait ObjectFactory<T>: Send + Sync {
    /// Name used to attribute construction failures.
    fn object_type(&self) -> &str;

    fn new_instance(&self) -> Result<T, String>;
}

/// [`ObjectFactory`] backed by a closure.
pub struct FnObjectFactory<F> {
    object_type: String,
    create: F,
}

impl<F> FnObjectFactory<F> {
    pub fn new(object_type: impl Into<String>, create: F) -> Self {
        Self {
            object_type: object_type.into(),
            create,
        }
    }
}

impl<T, F> ObjectFactory<T> for FnObjectFactory<F>
where
    F: Fn() -> Result<T, String> + Send + Sync,
{
    fn object_type(&self) -> &str {
        &self.object_type
    }

    fn new_instance(&self) -> Result<T, String> {
        (self.create)()
    }
}

/// Instantiates objects through an [`ObjectFactory`] and injects resolved parameter values.
///
/// Top-level parameters are applied first, then each parameter group as a unit.
/// Absent values fall back to the model's declared defaults.
pub struct ObjectBuilder<T> {
    factory: Arc<dyn ObjectFactory<T>>,
    model: Arc<ParameterizedModel>,
    resolver_set: ResolverSet,
}

impl<T> Clone for ObjectBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            model: Arc::clone(&self.model),
            resolver_set: self.resolver_set.clone(),
        }
    }
}

impl<T> Debug for ObjectBuilder<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBuilder")
            .field("object_type", &self.factory.object_type())
            .field("model", &self.model.name)
            .finish_non_exhaustive()
    }
}

impl<T: Configurable> ObjectBuilder<T> {
    pub fn new(
        factory: Arc<dyn ObjectFactory<T>>,
        model: Arc<ParameterizedModel>,
        resolver_set: ResolverSet,
    ) -> Self {
        Self {
            factory,
            model,
            resolver_set,
        }
    }

    pub fn object_type(&self) -> &str {
        self.factory.object_type()
    }

    pub fn model(&self) -> &ParameterizedModel {
        &self.model
    }

    /// Whether the produced instance depends on the resolution context.
    pub fn is_dynamic(&self) -> bool {
        self.resolver_set.is_dynamic()
    }

    /// Resolves this builder's [`ResolverSet`] against `context`, then builds.
    pub fn resolve_and_build(&self, context: &ResolutionContext) -> Result<T, ConstructionError> {
        let result = self
            .resolver_set
            .resolve(context)
            .map_err(|error| self.error(ConstructionErrorKind::from(error)))?;
        self.build(&result)
    }

    /// Builds a populated instance from an already resolved snapshot.
    pub fn build(&self, result: &ResolverSetResult) -> Result<T, ConstructionError> {
        let mut instance = self
            .factory
            .new_instance()
            .map_err(|message| self.error(ConstructionErrorKind::Instantiation { message }))?;

        for parameter in &self.model.parameters {
            let value = result.get(&parameter.name).or(parameter.default.as_ref());
            match value {
                Some(value) => instance
                    .set_parameter(&parameter.name, value)
                    .map_err(|error| self.error(error.into_kind()))?,
                None if parameter.required => {
                    return Err(self.error(ConstructionErrorKind::MissingParameter {
                        parameter: parameter.name.clone(),
                    }));
                }
                None => {}
            }
        }

        for group in &self.model.groups {
            let values = group
                .collect(|name| result.get(name))
                .map_err(|parameter| self.error(ConstructionErrorKind::MissingParameter { parameter }))?;
            if let Some(values) = values {
                instance
                    .set_parameter_group(&values)
                    .map_err(|error| self.error(error.into_kind()))?;
            }
        }

        Ok(instance)
    }

    fn error(&self, kind: ConstructionErrorKind) -> ConstructionError {
        ConstructionError::new(self.factory.object_type(), kind)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::{json, Value};

    use super::*;
    use crate::error::{ParameterError, ResolutionError};
    use crate::parameter::{expect_str, expect_u64, ParameterGroupModel, ParameterGroupValues, ParameterModel};
    use crate::resolver::ContextValueResolver;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Credentials {
        username: String,
        password: Option<String>,
    }

    #[derive(Debug, Default)]
    struct FtpSettings {
        host: String,
        port: u64,
        credentials: Option<Credentials>,
    }

    impl Configurable for FtpSettings {
        fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), ParameterError> {
            match name {
                "host" => self.host = expect_str(name, value)?.to_owned(),
                "port" => self.port = expect_u64(name, value)?,
                other => return Err(ParameterError::Unknown(other.to_owned())),
            }
            Ok(())
        }

        fn set_parameter_group(&mut self, values: &ParameterGroupValues) -> Result<(), ParameterError> {
            match values.group() {
                "credentials" => self.credentials = Some(values.deserialize()?),
                other => return Err(ParameterError::UnknownGroup(other.to_owned())),
            }
            Ok(())
        }
    }

    fn model() -> Arc<ParameterizedModel> {
        Arc::new(
            ParameterizedModel::new("ftp")
                .with_parameter(ParameterModel::required("host"))
                .with_parameter(ParameterModel::optional("port").with_default(21))
                .with_group(ParameterGroupModel::new(
                    "credentials",
                    vec![ParameterModel::optional("username"), ParameterModel::optional("password")],
                )),
        )
    }

    fn builder(resolver_set: ResolverSet) -> ObjectBuilder<FtpSettings> {
        let factory = FnObjectFactory::new("FtpSettings", || Ok(FtpSettings::default()));
        ObjectBuilder::new(Arc::new(factory), model(), resolver_set)
    }

    #[test]
    fn applies_parameters_defaults_and_groups() {
        let result = ResolverSetResult::builder()
            .add("host", "ftp.example.com")
            .add("username", "anonymous")
            .build();

        let settings = builder(ResolverSet::new()).build(&result).expect("builds");

        assert_eq!(settings.host, "ftp.example.com");
        assert_eq!(settings.port, 21);
        assert_eq!(
            settings.credentials,
            Some(Credentials {
                username: "anonymous".to_owned(),
                password: None,
            })
        );
    }

    #[test]
    fn unset_optional_group_is_not_applied() {
        let result = ResolverSetResult::builder().add("host", "h").build();

        let settings = builder(ResolverSet::new()).build(&result).expect("builds");

        assert!(settings.credentials.is_none());
    }

    #[test]
    fn missing_required_parameter_is_attributed_to_object_type() {
        let error = builder(ResolverSet::new())
            .build(&ResolverSetResult::default())
            .expect_err("host is required");

        assert_eq!(error.object_type, "FtpSettings");
        assert_eq!(
            error.kind,
            ConstructionErrorKind::MissingParameter {
                parameter: "host".to_owned()
            }
        );
    }

    #[test]
    fn rejected_value_surfaces_as_invalid_parameter() {
        let result = ResolverSetResult::builder()
            .add("host", "h")
            .add("port", "twenty-one")
            .build();

        let error = builder(ResolverSet::new()).build(&result).expect_err("port is not a number");

        assert!(matches!(
            error.kind,
            ConstructionErrorKind::InvalidParameter { ref parameter, .. } if parameter == "port"
        ));
    }

    #[test]
    fn factory_failure_surfaces_as_instantiation_error() {
        let factory = FnObjectFactory::new("Broken", || Err::<FtpSettings, _>("no default constructor".to_owned()));
        let builder = ObjectBuilder::new(Arc::new(factory), model(), ResolverSet::new());

        let error = builder.build(&ResolverSetResult::default()).expect_err("factory fails");

        assert_eq!(error.object_type, "Broken");
        assert!(matches!(error.kind, ConstructionErrorKind::Instantiation { .. }));
    }

    #[test]
    fn resolve_and_build_uses_the_resolver_set() {
        let set = ResolverSet::new().add("host", ContextValueResolver::required("ftp.host"));
        let builder = builder(set);
        assert!(builder.is_dynamic());

        let context = ResolutionContext::new().with_variable("ftp.host", json!("dyn.example.com"));
        let settings = builder.resolve_and_build(&context).expect("builds");
        assert_eq!(settings.host, "dyn.example.com");

        let error = builder
            .resolve_and_build(&ResolutionContext::new())
            .expect_err("variable missing");
        assert_eq!(
            error.kind,
            ConstructionErrorKind::Resolution(ResolutionError::UndefinedVariable {
                variable: "ftp.host".to_owned()
            })
        );
    }
}
