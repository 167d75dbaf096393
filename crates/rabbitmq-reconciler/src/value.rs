//! Value types on both sides of the normalizer.
//!
//! [`ConfigValue`] is the loosely typed configuration tree exchanged with the
//! state store. [`DefinitionValue`] is the scalar carried in open-ended
//! definition maps on the wire (policy definitions, exchange and queue
//! arguments).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A configuration map, keyed by field name.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// An open-ended definition map as submitted to or retrieved from the
/// management API.
pub type Definition = BTreeMap<String, DefinitionValue>;

/// A node of the configuration value tree.
///
/// Blocks (like the `policy` block of a policy) are represented as a
/// [`ConfigValue::List`] holding [`ConfigValue::Map`] elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Map(ConfigMap),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Wraps a single map into a one-element block list.
    pub fn block(map: ConfigMap) -> Self {
        Self::List(vec![Self::Map(map)])
    }

    /// Returns a human readable name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(value: ConfigMap) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        Self::List(value)
    }
}

/// A scalar of an open-ended definition map.
///
/// JSON numbers that fit into an [`i64`] become [`DefinitionValue::Int`],
/// every other number becomes [`DefinitionValue::Float`]. Lists only keep
/// their string elements, everything else inside a list is dropped on
/// decode. Objects and `null` have no scalar form and are kept as their JSON
/// text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum DefinitionValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl From<serde_json::Value> for DefinitionValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Int(value),
                None => Self::Float(number.as_f64().unwrap_or_default()),
            },
            Value::String(value) => Self::String(value),
            Value::Array(values) => Self::List(
                values
                    .into_iter()
                    .filter_map(|value| match value {
                        Value::String(value) => Some(value),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Null => Self::String(String::new()),
            value @ Value::Object(_) => Self::String(value.to_string()),
        }
    }
}

impl From<DefinitionValue> for serde_json::Value {
    fn from(value: DefinitionValue) -> Self {
        match value {
            DefinitionValue::String(value) => Self::String(value),
            DefinitionValue::Int(value) => Self::from(value),
            DefinitionValue::Float(value) => serde_json::Number::from_f64(value)
                .map(Self::Number)
                .unwrap_or(Self::Null),
            DefinitionValue::Bool(value) => Self::Bool(value),
            DefinitionValue::List(values) => {
                Self::Array(values.into_iter().map(Self::String).collect())
            }
        }
    }
}

impl From<&str> for DefinitionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for DefinitionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for DefinitionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(json!(10000), DefinitionValue::Int(10000))]
    #[case(json!(1.5), DefinitionValue::Float(1.5))]
    #[case(json!(u64::MAX), DefinitionValue::Float(u64::MAX as f64))]
    #[case(json!(true), DefinitionValue::Bool(true))]
    #[case(json!("all"), DefinitionValue::String("all".into()))]
    #[case(json!(["a", 1, "b", null]), DefinitionValue::List(vec!["a".into(), "b".into()]))]
    #[case(json!(null), DefinitionValue::String(String::new()))]
    fn definition_value_from_json(#[case] input: serde_json::Value, #[case] expected: DefinitionValue) {
        let value: DefinitionValue = serde_json::from_value(input).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn definition_value_keeps_wire_types() {
        let definition = Definition::from([
            ("max-length".to_owned(), DefinitionValue::Int(10000)),
            ("ha-mode".to_owned(), DefinitionValue::from("all")),
            (
                "ha-params".to_owned(),
                DefinitionValue::List(vec!["node-a".into(), "node-b".into()]),
            ),
        ]);

        assert_eq!(
            serde_json::to_value(&definition).unwrap(),
            json!({
                "ha-mode": "all",
                "ha-params": ["node-a", "node-b"],
                "max-length": 10000,
            })
        );
    }

    #[rstest]
    #[case("true", ConfigValue::Bool(true))]
    #[case("10000", ConfigValue::Int(10000))]
    #[case("1.5", ConfigValue::Float(1.5))]
    #[case("-0.25", ConfigValue::Float(-0.25))]
    #[case("'1.5'", ConfigValue::from("1.5"))]
    #[case("all", ConfigValue::from("all"))]
    fn config_scalars_keep_their_type(#[case] yaml: &str, #[case] expected: ConfigValue) {
        let value: ConfigValue = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn config_value_deserializes_untagged() {
        let value: ConfigValue =
            serde_yaml::from_str("[{pattern: '.*', priority: 1, enabled: true}]").unwrap();

        let expected = ConfigValue::block(ConfigMap::from([
            ("enabled".to_owned(), true.into()),
            ("pattern".to_owned(), ".*".into()),
            ("priority".to_owned(), ConfigValue::Int(1)),
        ]));
        assert_eq!(value, expected);
    }
}
