//! Declarative parameter metadata and the contract for objects that accept values.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ParameterError;

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterModel {
    pub name: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParameterModel {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Parameters that are applied together as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGroupModel {
    pub name: String,
    pub parameters: Vec<ParameterModel>,
}

impl ParameterGroupModel {
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterModel>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    fn has_required(&self) -> bool {
        self.parameters.iter().any(|parameter| parameter.required)
    }
}

/// Parameter layout of a buildable type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterizedModel {
    pub name: String,
    pub parameters: Vec<ParameterModel>,
    pub groups: Vec<ParameterGroupModel>,
}

impl ParameterizedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterModel) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_group(mut self, group: ParameterGroupModel) -> Self {
        self.groups.push(group);
        self
    }
}

/// Values collected for one parameter group.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGroupValues {
    group: String,
    values: BTreeMap<String, Value>,
}

impl ParameterGroupValues {
    pub(crate) fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            values: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, parameter: impl Into<String>, value: Value) {
        self.values.insert(parameter.into(), value);
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn get(&self, parameter: &str) -> Option<&Value> {
        self.values.get(parameter)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deserializes the group into a typed struct whose fields mirror the parameter names.
    pub fn deserialize<G: DeserializeOwned>(&self) -> Result<G, ParameterError> {
        let object = Value::Object(
            self.values
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        );
        serde_json::from_value(object).map_err(|error| ParameterError::invalid(&self.group, error))
    }
}

/// Target of parameter injection.
pub trait Configurable {
    fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), ParameterError>;

    fn set_parameter_group(&mut self, values: &ParameterGroupValues) -> Result<(), ParameterError> {
        Err(ParameterError::UnknownGroup(values.group().to_owned()))
    }
}

/// Reads a string parameter value.
pub fn expect_str<'a>(name: &str, value: &'a Value) -> Result<&'a str, ParameterError> {
    value
        .as_str()
        .ok_or_else(|| ParameterError::invalid(name, format!("expected a string, got {value}")))
}

/// Reads an unsigned integer parameter value.
pub fn expect_u64(name: &str, value: &Value) -> Result<u64, ParameterError> {
    value
        .as_u64()
        .ok_or_else(|| ParameterError::invalid(name, format!("expected an unsigned integer, got {value}")))
}

/// Reads a boolean parameter value.
pub fn expect_bool(name: &str, value: &Value) -> Result<bool, ParameterError> {
    value
        .as_bool()
        .ok_or_else(|| ParameterError::invalid(name, format!("expected a boolean, got {value}")))
}

impl ParameterGroupModel {
    /// Collects this group's values from `lookup`, falling back to declared defaults.
    ///
    /// Returns `Ok(None)` when nothing is set and no member is required.
    pub(crate) fn collect<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a Value>,
    ) -> Result<Option<ParameterGroupValues>, String> {
        let mut values = ParameterGroupValues::new(&self.name);
        let mut explicit = false;
        for parameter in &self.parameters {
            match lookup(&parameter.name) {
                Some(value) => {
                    explicit = true;
                    values.insert(&parameter.name, value.clone());
                }
                None => {
                    if let Some(default) = &parameter.default {
                        values.insert(&parameter.name, default.clone());
                    } else if parameter.required {
                        return Err(parameter.name.clone());
                    }
                }
            }
        }

        if !explicit && !self.has_required() {
            return Ok(None);
        }
        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Credentials {
        username: String,
        password: String,
    }

    #[test]
    fn group_values_deserialize_into_typed_struct() {
        let mut values = ParameterGroupValues::new("credentials");
        values.insert("username", json!("admin"));
        values.insert("password", json!("secret"));

        let credentials: Credentials = values.deserialize().expect("valid group");

        assert_eq!(
            credentials,
            Credentials {
                username: "admin".to_owned(),
                password: "secret".to_owned(),
            }
        );
    }

    #[test]
    fn group_deserialization_reports_the_group() {
        let mut values = ParameterGroupValues::new("credentials");
        values.insert("username", json!("admin"));

        let error = values
            .deserialize::<Credentials>()
            .expect_err("password is missing");

        assert!(matches!(error, ParameterError::Invalid { ref parameter, .. } if parameter == "credentials"));
    }

    #[test]
    fn optional_group_without_values_is_skipped() {
        let group = ParameterGroupModel::new(
            "tls",
            vec![ParameterModel::optional("keystore"), ParameterModel::optional("truststore")],
        );

        let collected = group.collect(|_| None).expect("no required members");
        assert!(collected.is_none());
    }

    #[test]
    fn required_group_member_without_value_is_reported() {
        let group = ParameterGroupModel::new(
            "credentials",
            vec![ParameterModel::required("username"), ParameterModel::optional("password")],
        );

        let missing = group.collect(|_| None).expect_err("username is required");
        assert_eq!(missing, "username");
    }

    #[test]
    fn defaults_fill_unset_members() {
        let group = ParameterGroupModel::new(
            "timeouts",
            vec![
                ParameterModel::optional("connect").with_default(5000),
                ParameterModel::optional("read"),
            ],
        );
        let read = json!(100);

        let collected = group
            .collect(|name| (name == "read").then_some(&read))
            .expect("collects")
            .expect("explicit value present");

        assert_eq!(collected.get("connect"), Some(&json!(5000)));
        assert_eq!(collected.get("read"), Some(&json!(100)));
    }
}
