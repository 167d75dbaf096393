use std::{fmt::Display, str::FromStr};

use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    api::{BindingInfo, BindingSettings},
    normalize::{Fields, Result, definition_from_payload, definition_to_payload},
    value::{ConfigMap, ConfigValue},
};

const DESTINATION_TYPES: &[&str] = &["queue", "exchange"];

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum BindingKeyError {
    #[snafu(display("binding key {input:?} must have the form <source>/<destination>/<type>/<properties>"))]
    MalformedKey { input: String },

    #[snafu(display("binding key segment {segment:?} is not valid percent-encoded UTF-8"))]
    InvalidEncoding {
        source: std::string::FromUtf8Error,
        segment: String,
    },
}

/// The name part of a binding identity.
///
/// Bindings have no name of their own. They are addressed by source,
/// destination, destination type and the properties key the API assigns on
/// creation. Each segment is percent-encoded, so names containing `/` or
/// `@` survive the identity round trip.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub source: String,
    pub destination: String,
    pub destination_type: String,
    pub properties_key: String,
}

impl BindingKey {
    /// The single-letter destination type used in API paths.
    pub fn destination_code(&self) -> &'static str {
        destination_code(&self.destination_type)
    }
}

impl Display for BindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            urlencoding::encode(&self.source),
            urlencoding::encode(&self.destination),
            urlencoding::encode(&self.destination_type),
            urlencoding::encode(&self.properties_key),
        )
    }
}

impl FromStr for BindingKey {
    type Err = BindingKeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut segments = input.split('/');
        let mut next = || -> Result<String, BindingKeyError> {
            let segment = segments
                .next()
                .context(MalformedKeySnafu { input })?;
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .context(InvalidEncodingSnafu { segment })
        };

        let key = Self {
            source: next()?,
            destination: next()?,
            destination_type: next()?,
            properties_key: next()?,
        };

        match segments.next() {
            None => Ok(key),
            Some(_) => MalformedKeySnafu { input }.fail(),
        }
    }
}

/// Maps `queue`/`exchange` to the `q`/`e` path segment.
pub fn destination_code(destination_type: &str) -> &'static str {
    if destination_type == "queue" { "q" } else { "e" }
}

/// The addressing fields of a binding, as configured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingTarget {
    pub source: String,
    pub vhost: String,
    pub destination: String,
    pub destination_type: String,
}

/// Converts a binding configuration into its addressing fields and the
/// creation body. `routing_key` defaults to the empty string.
pub fn to_payload(config: &ConfigMap) -> Result<(BindingTarget, BindingSettings)> {
    let fields = Fields::new(config);

    let target = BindingTarget {
        source: fields.required_str("source")?.to_owned(),
        vhost: fields.required_str("vhost")?.to_owned(),
        destination: fields.required_str("destination")?.to_owned(),
        destination_type: fields
            .required_choice("destination_type", DESTINATION_TYPES)?
            .to_owned(),
    };

    let settings = BindingSettings {
        routing_key: fields.optional_str("routing_key")?.unwrap_or_default().to_owned(),
        arguments: fields
            .optional_map("arguments")?
            .map(definition_to_payload)
            .transpose()?
            .unwrap_or_default(),
    };

    Ok((target, settings))
}

pub fn from_payload(info: &BindingInfo) -> ConfigMap {
    let mut config = ConfigMap::from([
        ("source".to_owned(), ConfigValue::from(info.source.as_str())),
        ("vhost".to_owned(), ConfigValue::from(info.vhost.as_str())),
        (
            "destination".to_owned(),
            ConfigValue::from(info.destination.as_str()),
        ),
        (
            "destination_type".to_owned(),
            ConfigValue::from(info.destination_type.as_str()),
        ),
        (
            "routing_key".to_owned(),
            ConfigValue::from(info.routing_key.as_str()),
        ),
        (
            "properties_key".to_owned(),
            ConfigValue::from(info.properties_key.as_str()),
        ),
    ]);

    if !info.arguments.is_empty() {
        config.insert(
            "arguments".to_owned(),
            ConfigValue::Map(definition_from_payload(&info.arguments)),
        );
    }

    config
}
