//! Bidirectional mapping between the configuration value tree and the typed
//! payloads of the management API.
//!
//! Every object kind has its own submodule with a `to_payload` (write
//! direction) and a `from_payload` (read direction) function. The open-ended
//! definition maps shared by several kinds are handled by
//! [`definition_to_payload`] and [`definition_from_payload`].
//!
//! ## Integer heuristic
//!
//! Open-ended definition maps carry no per-key types. On write, any string
//! that parses fully as a base-10 [`i64`] is submitted as an integer. A value
//! the broker expects to stay a string but that happens to look like an
//! integer is therefore misclassified. On read, every number is rendered as
//! its decimal string and string lists are comma-joined, which is ambiguous
//! for list elements that contain commas. Both are accepted limitations.
//! Floats that were configured as numbers are the exception and are read
//! back as numbers.

use snafu::{OptionExt, Snafu, ensure};

use crate::{
    alias::AliasError,
    value::{ConfigMap, ConfigValue, Definition, DefinitionValue},
};

pub mod binding;
pub mod exchange;
pub mod federation_upstream;
pub mod permissions;
pub mod policy;
pub mod queue;
pub mod shovel;
pub mod user;
pub mod vhost;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("required field {field:?} is missing"))]
    MissingField { field: String },

    #[snafu(display("field {field:?} must be a {expected}, got a {actual}"))]
    UnexpectedType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[snafu(display("exactly one {field:?} block is required, got {count}"))]
    BlockCount { field: String, count: usize },

    #[snafu(display("definition entry {key:?} cannot hold a nested {actual}"))]
    NestedDefinitionValue { key: String, actual: &'static str },

    #[snafu(display("field {field:?} must be one of {allowed:?}, got {value:?}"))]
    InvalidChoice {
        field: String,
        value: String,
        allowed: &'static [&'static str],
    },

    #[snafu(display("field {field:?} does not contain a valid JSON object"))]
    InvalidJson {
        source: serde_json::Error,
        field: String,
    },

    #[snafu(display("configuration contains conflicting fields"))]
    ConflictingFields { source: AliasError },
}

/// Converts a configuration definition map into its wire representation.
///
/// Strings that parse as base-10 integers become [`DefinitionValue::Int`],
/// booleans and numbers pass through, lists become string lists. Nested
/// maps have no wire representation and are rejected.
pub fn definition_to_payload(definition: &ConfigMap) -> Result<Definition> {
    definition
        .iter()
        .map(|(key, value)| {
            let value = match value {
                ConfigValue::String(value) => coerce_scalar(value),
                ConfigValue::Int(value) => DefinitionValue::Int(*value),
                ConfigValue::Float(value) => DefinitionValue::Float(*value),
                ConfigValue::Bool(value) => DefinitionValue::Bool(*value),
                ConfigValue::List(values) => DefinitionValue::List(
                    values
                        .iter()
                        .map(|value| list_element(key, value))
                        .collect::<Result<_>>()?,
                ),
                ConfigValue::Map(_) => {
                    return NestedDefinitionValueSnafu {
                        key,
                        actual: value.type_name(),
                    }
                    .fail();
                }
            };

            Ok((key.clone(), value))
        })
        .collect()
}

/// Converts a wire definition map back into the configuration representation.
pub fn definition_from_payload(definition: &Definition) -> ConfigMap {
    definition_from_payload_with_prior(definition, None)
}

/// Like [`definition_from_payload`], but a float stays a number where the
/// prior definition configured it as one.
pub fn definition_from_payload_with_prior(
    definition: &Definition,
    prior: Option<&ConfigMap>,
) -> ConfigMap {
    definition
        .iter()
        .map(|(key, value)| {
            let value = match (value, prior.and_then(|prior| prior.get(key))) {
                (DefinitionValue::Float(value), Some(ConfigValue::Float(_))) => {
                    ConfigValue::Float(*value)
                }
                _ => render_scalar(value),
            };

            (key.clone(), value)
        })
        .collect()
}

/// Applies the integer heuristic to a single string.
pub fn coerce_scalar(value: &str) -> DefinitionValue {
    match value.parse::<i64>() {
        Ok(number) => DefinitionValue::Int(number),
        Err(_) => DefinitionValue::String(value.to_owned()),
    }
}

/// Renders a wire scalar for the configuration side.
///
/// Numbers become their shortest decimal string (no trailing zeros, no
/// exponent), lists are comma-joined, booleans and strings pass through.
pub fn render_scalar(value: &DefinitionValue) -> ConfigValue {
    match value {
        DefinitionValue::String(value) => ConfigValue::String(value.clone()),
        DefinitionValue::Int(value) => ConfigValue::String(value.to_string()),
        DefinitionValue::Float(value) => ConfigValue::String(render_float(*value)),
        DefinitionValue::Bool(value) => ConfigValue::Bool(*value),
        DefinitionValue::List(values) => ConfigValue::String(values.join(",")),
    }
}

/// Formats a float without exponent and without trailing zeros.
pub fn render_float(value: f64) -> String {
    format!("{value}")
}

fn list_element(key: &str, value: &ConfigValue) -> Result<String> {
    match value {
        ConfigValue::String(value) => Ok(value.clone()),
        ConfigValue::Int(value) => Ok(value.to_string()),
        ConfigValue::Float(value) => Ok(render_float(*value)),
        ConfigValue::Bool(value) => Ok(value.to_string()),
        ConfigValue::List(_) | ConfigValue::Map(_) => NestedDefinitionValueSnafu {
            key,
            actual: value.type_name(),
        }
        .fail(),
    }
}

/// Extracts the single map of a block field.
///
/// A block is a list of maps. Exactly one element is allowed, both a missing
/// block and multiple blocks are configuration errors.
pub fn single_block<'a>(value: Option<&'a ConfigValue>, field: &str) -> Result<&'a ConfigMap> {
    let blocks = blocks(value, field)?;

    ensure!(
        blocks.len() == 1,
        BlockCountSnafu {
            field,
            count: blocks.len()
        }
    );

    Ok(blocks[0])
}

/// Extracts all maps of a block field, which may be repeated.
pub fn blocks<'a>(value: Option<&'a ConfigValue>, field: &str) -> Result<Vec<&'a ConfigMap>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let elements = match value {
        ConfigValue::List(elements) => elements.as_slice(),
        // A bare map is accepted as a single block
        ConfigValue::Map(map) => return Ok(vec![map]),
        other => {
            return UnexpectedTypeSnafu {
                field,
                expected: "block",
                actual: other.type_name(),
            }
            .fail();
        }
    };

    elements
        .iter()
        .map(|element| {
            element.as_map().context(UnexpectedTypeSnafu {
                field,
                expected: "map",
                actual: element.type_name(),
            })
        })
        .collect()
}

/// Reads a required string from a single top-level value.
pub fn required_str<'a>(value: Option<&'a ConfigValue>, field: &str) -> Result<&'a str> {
    let value = value.context(MissingFieldSnafu { field })?;

    value.as_str().context(UnexpectedTypeSnafu {
        field,
        expected: "string",
        actual: value.type_name(),
    })
}

/// Typed read access to the fields of a configuration map.
///
/// Absent keys are `None`. Present keys with the wrong variant are errors;
/// there is no coercion between strings, integers and booleans.
#[derive(Clone, Copy, Debug)]
pub struct Fields<'a> {
    map: &'a ConfigMap,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a ConfigMap) -> Self {
        Self { map }
    }

    pub fn get(&self, field: &str) -> Option<&'a ConfigValue> {
        self.map.get(field)
    }

    pub fn optional_str(&self, field: &str) -> Result<Option<&'a str>> {
        self.typed(field, "string", ConfigValue::as_str)
    }

    pub fn required_str(&self, field: &str) -> Result<&'a str> {
        self.optional_str(field)?
            .context(MissingFieldSnafu { field })
    }

    pub fn optional_int(&self, field: &str) -> Result<Option<i64>> {
        self.typed(field, "int", ConfigValue::as_int)
    }

    pub fn required_int(&self, field: &str) -> Result<i64> {
        self.optional_int(field)?
            .context(MissingFieldSnafu { field })
    }

    pub fn optional_bool(&self, field: &str) -> Result<Option<bool>> {
        self.typed(field, "bool", ConfigValue::as_bool)
    }

    pub fn optional_map(&self, field: &str) -> Result<Option<&'a ConfigMap>> {
        self.typed(field, "map", ConfigValue::as_map)
    }

    pub fn required_map(&self, field: &str) -> Result<&'a ConfigMap> {
        self.optional_map(field)?
            .context(MissingFieldSnafu { field })
    }

    /// Reads a list of strings.
    pub fn string_list(&self, field: &str) -> Result<Vec<String>> {
        let Some(values) = self.typed(field, "list", ConfigValue::as_list)? else {
            return Ok(Vec::new());
        };

        values
            .iter()
            .map(|value| {
                value.as_str().map(str::to_owned).context(UnexpectedTypeSnafu {
                    field,
                    expected: "string",
                    actual: value.type_name(),
                })
            })
            .collect()
    }

    /// Reads a string field restricted to a fixed set of values.
    pub fn required_choice(&self, field: &str, allowed: &'static [&'static str]) -> Result<&'a str> {
        let value = self.required_str(field)?;

        ensure!(
            allowed.contains(&value),
            InvalidChoiceSnafu {
                field,
                value,
                allowed
            }
        );

        Ok(value)
    }

    fn typed<T>(
        &self,
        field: &str,
        expected: &'static str,
        accessor: impl FnOnce(&'a ConfigValue) -> Option<T>,
    ) -> Result<Option<T>> {
        let Some(value) = self.map.get(field) else {
            return Ok(None);
        };

        accessor(value)
            .context(UnexpectedTypeSnafu {
                field,
                expected,
                actual: value.type_name(),
            })
            .map(Some)
    }
}

/// Inserts `value` under `key` when it is present.
pub(crate) fn insert_some<V>(map: &mut ConfigMap, key: &str, value: Option<V>)
where
    V: Into<ConfigValue>,
{
    if let Some(value) = value {
        map.insert(key.to_owned(), value.into());
    }
}
