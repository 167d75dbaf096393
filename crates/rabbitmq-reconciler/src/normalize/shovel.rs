//! Shovel definitions.
//!
//! The wire definition is a fixed structure, so apart from the delete-after
//! field there is no type inference: every field is mapped one-to-one. The
//! URIs are singleton lists on the wire and scalars in the configuration.

use snafu::ResultExt;

use crate::{
    alias::{self, FieldAlias},
    api::ShovelDefinition,
    normalize::{
        ConflictingFieldsSnafu, Fields, Result, UnexpectedTypeSnafu, coerce_scalar, insert_some,
        render_scalar,
    },
    value::{ConfigMap, ConfigValue, DefinitionValue},
};

pub const DEFAULT_ACK_MODE: &str = "on-confirm";
pub const DEFAULT_PROTOCOL: &str = "amqp091";
pub const DEFAULT_RECONNECT_DELAY: i64 = 1;

pub const FORWARD_HEADERS: FieldAlias =
    FieldAlias::new("add_forward_headers", "destination_add_forward_headers");
pub const DELETE_AFTER: FieldAlias = FieldAlias::new("delete_after", "source_delete_after");
pub const PREFETCH_COUNT: FieldAlias = FieldAlias::new("prefetch_count", "source_prefetch_count");

pub const ALIASES: [FieldAlias; 3] = [FORWARD_HEADERS, DELETE_AFTER, PREFETCH_COUNT];

/// Fields that exclude each other, in addition to the alias pairs.
const EXCLUSIVE: [(&str, &str); 5] = [
    (FORWARD_HEADERS.legacy, FORWARD_HEADERS.current),
    (DELETE_AFTER.legacy, DELETE_AFTER.current),
    (PREFETCH_COUNT.legacy, PREFETCH_COUNT.current),
    ("source_exchange", "source_queue"),
    ("destination_exchange", "destination_queue"),
];

/// Rejects configurations that populate both fields of an exclusive pair.
pub fn validate(info: &ConfigMap) -> Result<()> {
    alias::validate(info, &EXCLUSIVE).context(ConflictingFieldsSnafu)
}

/// Converts a shovel `info` block into the wire definition.
///
/// Validation runs first, so each alias pair has at most one populated
/// field, and whichever it is ends up in the current wire field.
pub fn to_payload(info: &ConfigMap) -> Result<ShovelDefinition> {
    validate(info)?;
    let fields = Fields::new(info);
    let string = |field: &str| -> Result<Option<String>> {
        Ok(fields.optional_str(field)?.map(str::to_owned))
    };

    Ok(ShovelDefinition {
        ack_mode: Some(string("ack_mode")?.unwrap_or_else(|| DEFAULT_ACK_MODE.to_owned())),

        source_uri: vec![fields.required_str("source_uri")?.to_owned()],
        source_protocol: Some(
            string("source_protocol")?.unwrap_or_else(|| DEFAULT_PROTOCOL.to_owned()),
        ),
        source_address: string("source_address")?,
        source_exchange: string("source_exchange")?,
        source_exchange_key: string("source_exchange_key")?,
        source_queue: string("source_queue")?,
        source_prefetch_count: resolve(info, &PREFETCH_COUNT, |fields, name| {
            fields.optional_int(name)
        })?,
        source_delete_after: resolve(info, &DELETE_AFTER, delete_after)?,

        destination_uri: vec![fields.required_str("destination_uri")?.to_owned()],
        destination_protocol: Some(
            string("destination_protocol")?.unwrap_or_else(|| DEFAULT_PROTOCOL.to_owned()),
        ),
        destination_address: string("destination_address")?,
        destination_exchange: string("destination_exchange")?,
        destination_exchange_key: string("destination_exchange_key")?,
        destination_queue: string("destination_queue")?,
        destination_add_forward_headers: resolve(info, &FORWARD_HEADERS, |fields, name| {
            fields.optional_bool(name)
        })?,
        destination_add_timestamp_header: Some(
            fields
                .optional_bool("destination_add_timestamp_header")?
                .unwrap_or(false),
        ),
        destination_application_properties: string("destination_application_properties")?,
        destination_properties: string("destination_properties")?,
        destination_publish_properties: string("destination_publish_properties")?,

        reconnect_delay: Some(
            fields
                .optional_int("reconnect_delay")?
                .unwrap_or(DEFAULT_RECONNECT_DELAY),
        ),

        add_forward_headers: None,
        delete_after: None,
        prefetch_count: None,
    })
}

/// Converts a wire definition back into an `info` block.
///
/// Values of deprecated wire keys are folded into their replacements. Each
/// aliased value is projected under the name the prior block used.
pub fn from_payload(definition: &ShovelDefinition, prior: Option<&ConfigMap>) -> ConfigMap {
    let mut info = ConfigMap::new();
    let mut put = |key: &str, value: Option<&String>| {
        insert_some(&mut info, key, value.map(String::as_str));
    };

    put("ack_mode", definition.ack_mode.as_ref());
    put("source_uri", definition.source_uri.first());
    put("source_protocol", definition.source_protocol.as_ref());
    put("source_address", definition.source_address.as_ref());
    put("source_exchange", definition.source_exchange.as_ref());
    put("source_exchange_key", definition.source_exchange_key.as_ref());
    put("source_queue", definition.source_queue.as_ref());
    put("destination_uri", definition.destination_uri.first());
    put("destination_protocol", definition.destination_protocol.as_ref());
    put("destination_address", definition.destination_address.as_ref());
    put("destination_exchange", definition.destination_exchange.as_ref());
    put(
        "destination_exchange_key",
        definition.destination_exchange_key.as_ref(),
    );
    put("destination_queue", definition.destination_queue.as_ref());
    put(
        "destination_application_properties",
        definition.destination_application_properties.as_ref(),
    );
    put(
        "destination_properties",
        definition.destination_properties.as_ref(),
    );
    put(
        "destination_publish_properties",
        definition.destination_publish_properties.as_ref(),
    );

    insert_some(
        &mut info,
        "destination_add_timestamp_header",
        definition.destination_add_timestamp_header,
    );
    insert_some(&mut info, "reconnect_delay", definition.reconnect_delay);

    insert_some(
        &mut info,
        FORWARD_HEADERS.projected_name(prior),
        definition
            .destination_add_forward_headers
            .or(definition.add_forward_headers),
    );
    insert_some(
        &mut info,
        PREFETCH_COUNT.projected_name(prior),
        definition.source_prefetch_count.or(definition.prefetch_count),
    );
    insert_some(
        &mut info,
        DELETE_AFTER.projected_name(prior),
        definition
            .source_delete_after
            .as_ref()
            .or(definition.delete_after.as_ref())
            .map(render_scalar),
    );

    info
}

/// Reads whichever field of an alias pair is populated.
fn resolve<T>(
    info: &ConfigMap,
    alias: &FieldAlias,
    read: impl FnOnce(&Fields<'_>, &str) -> Result<Option<T>>,
) -> Result<Option<T>> {
    match alias.resolve(info) {
        Some((name, _)) => read(&Fields::new(info), name),
        None => Ok(None),
    }
}

/// `delete_after` is either a mode (`never`, `queue-length`) or a message
/// count, so it goes through the integer heuristic.
fn delete_after(fields: &Fields<'_>, name: &str) -> Result<Option<DefinitionValue>> {
    match fields.get(name) {
        None => Ok(None),
        Some(ConfigValue::String(value)) => Ok(Some(coerce_scalar(value))),
        Some(ConfigValue::Int(value)) => Ok(Some(DefinitionValue::Int(*value))),
        Some(other) => UnexpectedTypeSnafu {
            field: name,
            expected: "string",
            actual: other.type_name(),
        }
        .fail(),
    }
}
