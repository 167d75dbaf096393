use crate::{
    api::FederationDefinition,
    normalize::{Fields, Result, insert_some},
    value::{ConfigMap, ConfigValue},
};

pub const DEFAULT_PREFETCH_COUNT: i64 = 1000;
pub const DEFAULT_RECONNECT_DELAY: i64 = 5;
pub const DEFAULT_ACK_MODE: &str = "on-confirm";
pub const DEFAULT_MAX_HOPS: i64 = 1;

/// Converts a federation upstream `definition` block, applying defaults.
pub fn to_payload(block: &ConfigMap) -> Result<FederationDefinition> {
    let fields = Fields::new(block);

    Ok(FederationDefinition {
        uri: vec![fields.required_str("uri")?.to_owned()],
        prefetch_count: Some(
            fields
                .optional_int("prefetch_count")?
                .unwrap_or(DEFAULT_PREFETCH_COUNT),
        ),
        reconnect_delay: Some(
            fields
                .optional_int("reconnect_delay")?
                .unwrap_or(DEFAULT_RECONNECT_DELAY),
        ),
        ack_mode: Some(
            fields
                .optional_str("ack_mode")?
                .unwrap_or(DEFAULT_ACK_MODE)
                .to_owned(),
        ),
        trust_user_id: Some(fields.optional_bool("trust_user_id")?.unwrap_or(false)),
        exchange: fields.optional_str("exchange")?.map(str::to_owned),
        max_hops: Some(fields.optional_int("max_hops")?.unwrap_or(DEFAULT_MAX_HOPS)),
        expires: fields.optional_int("expires")?,
        message_ttl: fields.optional_int("message_ttl")?,
        queue: fields.optional_str("queue")?.map(str::to_owned),
    })
}

pub fn from_payload(definition: &FederationDefinition) -> ConfigMap {
    let mut block = ConfigMap::new();

    insert_some(&mut block, "uri", definition.uri.first().map(String::as_str));
    insert_some(&mut block, "prefetch_count", definition.prefetch_count);
    insert_some(&mut block, "reconnect_delay", definition.reconnect_delay);
    insert_some(&mut block, "ack_mode", definition.ack_mode.as_deref());
    insert_some(&mut block, "trust_user_id", definition.trust_user_id);
    insert_some(&mut block, "exchange", definition.exchange.as_deref());
    insert_some(&mut block, "max_hops", definition.max_hops);
    insert_some(&mut block, "expires", definition.expires);
    insert_some(&mut block, "message_ttl", definition.message_ttl);
    insert_some(&mut block, "queue", definition.queue.as_deref());

    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_and_read_back() {
        let block = ConfigMap::from([(
            "uri".to_owned(),
            ConfigValue::from("amqp://upstream.example.com"),
        )]);

        let definition = to_payload(&block).unwrap();
        let read_back = from_payload(&definition);

        assert_eq!(read_back["uri"], ConfigValue::from("amqp://upstream.example.com"));
        assert_eq!(read_back["prefetch_count"], ConfigValue::Int(DEFAULT_PREFETCH_COUNT));
        assert_eq!(read_back["reconnect_delay"], ConfigValue::Int(DEFAULT_RECONNECT_DELAY));
        assert_eq!(read_back["ack_mode"], ConfigValue::from(DEFAULT_ACK_MODE));
        assert_eq!(read_back["trust_user_id"], ConfigValue::Bool(false));
        assert_eq!(read_back["max_hops"], ConfigValue::Int(DEFAULT_MAX_HOPS));
        assert!(!read_back.contains_key("expires"));
    }

    #[test]
    fn uri_is_sent_as_list() {
        let block = ConfigMap::from([("uri".to_owned(), ConfigValue::from("amqp://a"))]);
        let value = serde_json::to_value(to_payload(&block).unwrap()).unwrap();

        assert_eq!(value["uri"], serde_json::json!(["amqp://a"]));
    }
}
