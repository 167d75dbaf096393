use crate::{
    api::{UserInfo, UserSettings},
    normalize::{Fields, Result},
    value::{ConfigMap, ConfigValue, DefinitionValue},
};

pub const TAG_SEPARATOR: char = ',';

/// Converts a user configuration. Tags are submitted comma-joined.
pub fn to_payload(config: &ConfigMap) -> Result<UserSettings> {
    let fields = Fields::new(config);

    Ok(UserSettings {
        password: fields.required_str("password")?.to_owned(),
        tags: fields
            .string_list("tags")?
            .join(&TAG_SEPARATOR.to_string()),
    })
}

/// The API never returns the password, the caller passes in the locally
/// known one.
pub fn from_payload(info: &UserInfo, password: Option<&ConfigValue>) -> ConfigMap {
    let mut config = ConfigMap::from([
        ("name".to_owned(), ConfigValue::from(info.name.as_str())),
        (
            "tags".to_owned(),
            ConfigValue::List(tags(&info.tags).into_iter().map(ConfigValue::from).collect()),
        ),
    ]);

    if let Some(password) = password {
        config.insert("password".to_owned(), password.clone());
    }

    config
}

fn tags(tags: &DefinitionValue) -> Vec<String> {
    match tags {
        DefinitionValue::List(tags) => tags.clone(),
        DefinitionValue::String(tags) => tags
            .split(TAG_SEPARATOR)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}
