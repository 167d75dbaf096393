use crate::{
    api::ExchangeSettings,
    normalize::{Fields, Result, definition_from_payload, definition_to_payload},
    value::{ConfigMap, ConfigValue},
};

/// Converts an exchange `settings` block. `durable` and `auto_delete`
/// default to `false`.
pub fn to_payload(block: &ConfigMap) -> Result<ExchangeSettings> {
    let fields = Fields::new(block);

    Ok(ExchangeSettings {
        kind: fields.required_str("type")?.to_owned(),
        durable: fields.optional_bool("durable")?.unwrap_or(false),
        auto_delete: fields.optional_bool("auto_delete")?.unwrap_or(false),
        arguments: fields
            .optional_map("arguments")?
            .map(definition_to_payload)
            .transpose()?
            .unwrap_or_default(),
    })
}

pub fn from_payload(settings: &ExchangeSettings) -> ConfigMap {
    let mut block = ConfigMap::from([
        ("type".to_owned(), ConfigValue::from(settings.kind.as_str())),
        ("durable".to_owned(), ConfigValue::Bool(settings.durable)),
        ("auto_delete".to_owned(), ConfigValue::Bool(settings.auto_delete)),
    ]);

    if !settings.arguments.is_empty() {
        block.insert(
            "arguments".to_owned(),
            ConfigValue::Map(definition_from_payload(&settings.arguments)),
        );
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DefinitionValue;

    #[test]
    fn defaults_are_applied() {
        let block = ConfigMap::from([("type".to_owned(), ConfigValue::from("fanout"))]);
        let settings = to_payload(&block).unwrap();

        assert!(!settings.durable);
        assert!(!settings.auto_delete);
        assert!(settings.arguments.is_empty());

        let read_back = from_payload(&settings);
        assert_eq!(read_back["durable"], ConfigValue::Bool(false));
        assert!(!read_back.contains_key("arguments"));
    }

    #[test]
    fn arguments_use_integer_heuristic() {
        let block = ConfigMap::from([
            ("type".to_owned(), ConfigValue::from("x-delayed-message")),
            (
                "arguments".to_owned(),
                ConfigValue::Map(ConfigMap::from([(
                    "x-delayed-type".to_owned(),
                    ConfigValue::from("direct"),
                )])),
            ),
        ]);

        let settings = to_payload(&block).unwrap();
        assert_eq!(
            settings.arguments["x-delayed-type"],
            DefinitionValue::from("direct")
        );
    }
}
