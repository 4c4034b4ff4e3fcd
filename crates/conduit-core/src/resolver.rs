//! Parameter resolution: turning declared parameters into a snapshot of values.
//!
//! A [`ResolverSet`] maps each parameter name to a [`ValueResolver`]. Resolving
//! the set against a [`ResolutionContext`] yields a [`ResolverSetResult`], the
//! immutable input of one object construction.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ResolutionError;

/// Variables visible to resolvers during a single resolution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionContext {
    variables: BTreeMap<String, Value>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Produces the value of one parameter.
pub trait ValueResolver: Send + Sync + Debug {
    /// Returns `Ok(None)` when the parameter has no value in this context.
    fn resolve(&self, context: &ResolutionContext) -> Result<Option<Value>, ResolutionError>;

    /// Whether the value may differ between contexts.
    fn is_dynamic(&self) -> bool {
        false
    }
}

/// Resolver for a literal configured value.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticValueResolver(Value);

impl StaticValueResolver {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }
}

impl ValueResolver for StaticValueResolver {
    fn resolve(&self, _context: &ResolutionContext) -> Result<Option<Value>, ResolutionError> {
        Ok(Some(self.0.clone()))
    }
}

/// Resolver reading a variable from the resolution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextValueResolver {
    variable: String,
    optional: bool,
}

impl ContextValueResolver {
    pub fn required(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            optional: false,
        }
    }

    pub fn optional(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            optional: true,
        }
    }
}

impl ValueResolver for ContextValueResolver {
    fn resolve(&self, context: &ResolutionContext) -> Result<Option<Value>, ResolutionError> {
        match context.variable(&self.variable) {
            Some(value) => Ok(Some(value.clone())),
            None if self.optional => Ok(None),
            None => Err(ResolutionError::UndefinedVariable {
                variable: self.variable.clone(),
            }),
        }
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}

/// Ordered parameter name to resolver mapping.
#[derive(Debug, Clone, Default)]
pub struct ResolverSet {
    resolvers: BTreeMap<String, Arc<dyn ValueResolver>>,
}

impl ResolverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, parameter: impl Into<String>, resolver: impl ValueResolver + 'static) -> Self {
        self.resolvers.insert(parameter.into(), Arc::new(resolver));
        self
    }

    pub fn add_static(self, parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(parameter, StaticValueResolver::new(value))
    }

    pub fn is_dynamic(&self) -> bool {
        self.resolvers.values().any(|resolver| resolver.is_dynamic())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolves every parameter. Parameters whose resolver yields no value are omitted.
    pub fn resolve(&self, context: &ResolutionContext) -> Result<ResolverSetResult, ResolutionError> {
        let mut builder = ResolverSetResult::builder();
        for (name, resolver) in &self.resolvers {
            if let Some(value) = resolver.resolve(context)? {
                builder = builder.add(name.clone(), value);
            }
        }
        Ok(builder.build())
    }
}

/// Immutable snapshot of resolved parameter values for one construction attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverSetResult {
    values: Arc<BTreeMap<String, Value>>,
}

impl ResolverSetResult {
    pub fn builder() -> ResolverSetResultBuilder {
        ResolverSetResultBuilder::default()
    }

    pub fn get(&self, parameter: &str) -> Option<&Value> {
        self.values.get(parameter)
    }

    pub fn contains(&self, parameter: &str) -> bool {
        self.values.contains_key(parameter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ResolverSetResultBuilder {
    values: BTreeMap<String, Value>,
}

impl ResolverSetResultBuilder {
    pub fn add(mut self, parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(parameter.into(), value.into());
        self
    }

    pub fn build(self) -> ResolverSetResult {
        ResolverSetResult {
            values: Arc::new(self.values),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolves_static_and_context_values() {
        let set = ResolverSet::new()
            .add_static("host", "ftp.example.com")
            .add("port", ContextValueResolver::required("ftp.port"))
            .add("passive", ContextValueResolver::optional("ftp.passive"));
        let context = ResolutionContext::new().with_variable("ftp.port", json!(21));

        let result = set.resolve(&context).expect("resolution succeeds");

        assert_eq!(result.get("host"), Some(&json!("ftp.example.com")));
        assert_eq!(result.get("port"), Some(&json!(21)));
        assert!(!result.contains("passive"));
        assert_eq!(result.len(), 2);
        assert!(set.is_dynamic());
    }

    #[test]
    fn missing_required_context_variable_fails() {
        let set = ResolverSet::new().add("port", ContextValueResolver::required("ftp.port"));

        let error = set
            .resolve(&ResolutionContext::new())
            .expect_err("variable is undefined");

        assert_eq!(
            error,
            ResolutionError::UndefinedVariable {
                variable: "ftp.port".to_owned()
            }
        );
    }

    #[test]
    fn static_only_set_is_not_dynamic() {
        let set = ResolverSet::new().add_static("user", "admin");
        assert!(!set.is_dynamic());
    }
}
