use crate::{
    api::Policy,
    normalize::{Fields, Result, definition_from_payload_with_prior, definition_to_payload},
    value::{ConfigMap, ConfigValue},
};

/// Converts a `policy` block into the wire policy.
///
/// Used for policies and operator policies alike, both share one shape.
pub fn to_payload(block: &ConfigMap) -> Result<Policy> {
    let fields = Fields::new(block);

    Ok(Policy {
        name: None,
        vhost: None,
        pattern: fields.required_str("pattern")?.to_owned(),
        apply_to: fields.required_str("apply_to")?.to_owned(),
        priority: fields.required_int("priority")?,
        definition: definition_to_payload(fields.required_map("definition")?)?,
    })
}

/// Renders a policy for the configuration side. `prior` is the block the
/// policy was declared from, if known.
pub fn from_payload(policy: &Policy, prior: Option<&ConfigMap>) -> ConfigMap {
    let prior_definition = prior
        .and_then(|prior| prior.get("definition"))
        .and_then(ConfigValue::as_map);

    ConfigMap::from([
        ("pattern".to_owned(), ConfigValue::from(policy.pattern.as_str())),
        ("priority".to_owned(), ConfigValue::Int(policy.priority)),
        ("apply_to".to_owned(), ConfigValue::from(policy.apply_to.as_str())),
        (
            "definition".to_owned(),
            ConfigValue::Map(definition_from_payload_with_prior(
                &policy.definition,
                prior_definition,
            )),
        ),
    ])
}
