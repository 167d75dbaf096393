use std::collections::BTreeMap;

use snafu::ResultExt;

use crate::{
    alias,
    api::QueueSettings,
    normalize::{
        ConflictingFieldsSnafu, Fields, InvalidJsonSnafu, Result, definition_to_payload,
        render_scalar,
    },
    value::{ConfigMap, ConfigValue, DefinitionValue},
};

const ARGUMENTS: &str = "arguments";
const ARGUMENTS_JSON: &str = "arguments_json";

/// Converts a queue `settings` block.
///
/// Arguments are either given as a flat map (subject to the integer
/// heuristic) or as a JSON object string in `arguments_json`, whose values
/// are submitted with their JSON types.
pub fn to_payload(block: &ConfigMap) -> Result<QueueSettings> {
    alias::validate(block, &[(ARGUMENTS, ARGUMENTS_JSON)]).context(ConflictingFieldsSnafu)?;
    let fields = Fields::new(block);

    let arguments = match (
        fields.optional_map(ARGUMENTS)?,
        fields.optional_str(ARGUMENTS_JSON)?,
    ) {
        (Some(arguments), _) => definition_to_payload(arguments)?
            .into_iter()
            .map(|(key, value)| (key, value.into()))
            .collect(),
        (None, Some(json)) => parse_arguments_json(json)?,
        (None, None) => BTreeMap::new(),
    };

    Ok(QueueSettings {
        durable: fields.optional_bool("durable")?.unwrap_or(false),
        auto_delete: fields.optional_bool("auto_delete")?.unwrap_or(false),
        arguments,
    })
}

/// Renders queue settings for the configuration side.
///
/// Arguments are projected under the field the prior block used. A JSON
/// string that is semantically equal to the remote arguments is kept
/// verbatim, so formatting differences do not show up as drift.
pub fn from_payload(settings: &QueueSettings, prior: Option<&ConfigMap>) -> ConfigMap {
    let mut block = ConfigMap::from([
        ("durable".to_owned(), ConfigValue::Bool(settings.durable)),
        ("auto_delete".to_owned(), ConfigValue::Bool(settings.auto_delete)),
    ]);

    let prior_json = prior
        .and_then(|prior| prior.get(ARGUMENTS_JSON))
        .and_then(ConfigValue::as_str);

    if let Some(prior_json) = prior_json {
        let unchanged = parse_arguments_json(prior_json)
            .is_ok_and(|arguments| arguments == settings.arguments);
        let json = if unchanged {
            prior_json.to_owned()
        } else {
            serde_json::Value::Object(settings.arguments.clone().into_iter().collect()).to_string()
        };
        block.insert(ARGUMENTS_JSON.to_owned(), ConfigValue::String(json));
    } else if !settings.arguments.is_empty() {
        let arguments = settings
            .arguments
            .iter()
            .map(|(key, value)| {
                (
                    key.clone(),
                    render_scalar(&DefinitionValue::from(value.clone())),
                )
            })
            .collect();
        block.insert(ARGUMENTS.to_owned(), ConfigValue::Map(arguments));
    }

    block
}

fn parse_arguments_json(json: &str) -> Result<BTreeMap<String, serde_json::Value>> {
    serde_json::from_str(json).context(InvalidJsonSnafu {
        field: ARGUMENTS_JSON,
    })
}
