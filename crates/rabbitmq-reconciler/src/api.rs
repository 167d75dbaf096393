//! Wire types of the management API.
//!
//! Request bodies and response bodies share one type per kind where the API
//! allows it. Fields the API only returns (like the name of a policy) are
//! optional and skipped on serialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::value::{Definition, DefinitionValue};

/// Runtime parameter component of shovels.
pub const SHOVEL_COMPONENT: &str = "shovel";

/// Runtime parameter component of federation upstreams.
pub const FEDERATION_UPSTREAM_COMPONENT: &str = "federation-upstream";

/// A policy or an operator policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vhost: Option<String>,

    pub pattern: String,
    pub apply_to: String,
    pub priority: i64,

    #[serde(default)]
    pub definition: Definition,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub durable: bool,

    #[serde(default)]
    pub auto_delete: bool,

    #[serde(default)]
    pub arguments: Definition,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ExchangeInfo {
    pub name: String,
    pub vhost: String,

    #[serde(flatten)]
    pub settings: ExchangeSettings,
}

/// Queue arguments keep their JSON types, `arguments_json` submits nested
/// values as they are.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default)]
    pub durable: bool,

    #[serde(default)]
    pub auto_delete: bool,

    #[serde(default)]
    pub arguments: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct QueueInfo {
    pub name: String,
    pub vhost: String,

    #[serde(flatten)]
    pub settings: QueueSettings,
}

/// Body of a binding creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BindingSettings {
    pub routing_key: String,
    pub arguments: Definition,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BindingInfo {
    pub source: String,
    pub vhost: String,
    pub destination: String,
    pub destination_type: String,

    #[serde(default)]
    pub routing_key: String,

    #[serde(default)]
    pub arguments: Definition,

    pub properties_key: String,
}

/// A runtime parameter, the envelope of shovels and federation upstreams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeParameter<T> {
    pub name: String,
    pub vhost: String,
    pub component: String,
    pub value: T,
}

/// Definition of a dynamic shovel.
///
/// The deprecated keys `add-forward-headers`, `delete-after` and
/// `prefetch-count` are only ever read. They show up when another tool
/// declared the shovel and are folded into their replacements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShovelDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_mode: Option<String>,

    #[serde(rename = "src-uri", default, deserialize_with = "uri_list")]
    pub source_uri: Vec<String>,

    #[serde(rename = "src-protocol", default, skip_serializing_if = "Option::is_none")]
    pub source_protocol: Option<String>,

    #[serde(rename = "src-address", default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,

    #[serde(rename = "src-exchange", default, skip_serializing_if = "Option::is_none")]
    pub source_exchange: Option<String>,

    #[serde(rename = "src-exchange-key", default, skip_serializing_if = "Option::is_none")]
    pub source_exchange_key: Option<String>,

    #[serde(rename = "src-queue", default, skip_serializing_if = "Option::is_none")]
    pub source_queue: Option<String>,

    #[serde(rename = "src-prefetch-count", default, skip_serializing_if = "Option::is_none")]
    pub source_prefetch_count: Option<i64>,

    #[serde(rename = "src-delete-after", default, skip_serializing_if = "Option::is_none")]
    pub source_delete_after: Option<DefinitionValue>,

    #[serde(rename = "dest-uri", default, deserialize_with = "uri_list")]
    pub destination_uri: Vec<String>,

    #[serde(rename = "dest-protocol", default, skip_serializing_if = "Option::is_none")]
    pub destination_protocol: Option<String>,

    #[serde(rename = "dest-address", default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,

    #[serde(rename = "dest-exchange", default, skip_serializing_if = "Option::is_none")]
    pub destination_exchange: Option<String>,

    #[serde(rename = "dest-exchange-key", default, skip_serializing_if = "Option::is_none")]
    pub destination_exchange_key: Option<String>,

    #[serde(rename = "dest-queue", default, skip_serializing_if = "Option::is_none")]
    pub destination_queue: Option<String>,

    #[serde(
        rename = "dest-add-forward-headers",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_add_forward_headers: Option<bool>,

    #[serde(
        rename = "dest-add-timestamp-header",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_add_timestamp_header: Option<bool>,

    #[serde(
        rename = "dest-application-properties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_application_properties: Option<String>,

    #[serde(rename = "dest-properties", default, skip_serializing_if = "Option::is_none")]
    pub destination_properties: Option<String>,

    #[serde(
        rename = "dest-publish-properties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_publish_properties: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay: Option<i64>,

    #[serde(default, skip_serializing)]
    pub add_forward_headers: Option<bool>,

    #[serde(default, skip_serializing)]
    pub delete_after: Option<DefinitionValue>,

    #[serde(default, skip_serializing)]
    pub prefetch_count: Option<i64>,
}

/// Definition of a federation upstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FederationDefinition {
    #[serde(default, deserialize_with = "uri_list")]
    pub uri: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_user_id: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hops: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_ttl: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VhostSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_queue_type: Option<String>,

    #[serde(default)]
    pub tracing: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct VhostInfo {
    pub name: String,

    #[serde(flatten)]
    pub settings: VhostSettings,
}

/// Body of a user declaration. Tags are comma-separated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserSettings {
    pub password: String,
    pub tags: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UserInfo {
    pub name: String,

    /// A list on recent brokers, a comma-separated string on older ones.
    #[serde(default = "empty_tags")]
    pub tags: DefinitionValue,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub configure: String,
    pub write: String,
    pub read: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPermission {
    pub exchange: String,
    pub write: String,
    pub read: String,
}

fn empty_tags() -> DefinitionValue {
    DefinitionValue::List(Vec::new())
}

/// Accepts both a single URI and a list of URIs.
fn uri_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(uri) => vec![uri],
        OneOrMany::Many(uris) => uris,
    })
}
