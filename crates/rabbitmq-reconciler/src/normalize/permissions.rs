use crate::{
    api::{Permissions, TopicPermission},
    normalize::{Fields, Result},
    value::{ConfigMap, ConfigValue},
};

/// Converts a `permissions` block of a vhost permission grant.
pub fn to_payload(block: &ConfigMap) -> Result<Permissions> {
    let fields = Fields::new(block);

    Ok(Permissions {
        configure: fields.required_str("configure")?.to_owned(),
        write: fields.required_str("write")?.to_owned(),
        read: fields.required_str("read")?.to_owned(),
    })
}

pub fn from_payload(permissions: &Permissions) -> ConfigMap {
    ConfigMap::from([
        (
            "configure".to_owned(),
            ConfigValue::from(permissions.configure.as_str()),
        ),
        ("write".to_owned(), ConfigValue::from(permissions.write.as_str())),
        ("read".to_owned(), ConfigValue::from(permissions.read.as_str())),
    ])
}

/// Converts all `permissions` blocks of a topic permission grant, one per
/// exchange.
pub fn topic_to_payload(blocks: &[&ConfigMap]) -> Result<Vec<TopicPermission>> {
    blocks
        .iter()
        .map(|block| {
            let fields = Fields::new(block);

            Ok(TopicPermission {
                exchange: fields.required_str("exchange")?.to_owned(),
                write: fields.required_str("write")?.to_owned(),
                read: fields.required_str("read")?.to_owned(),
            })
        })
        .collect()
}

pub fn topic_from_payload(permissions: &[TopicPermission]) -> ConfigValue {
    ConfigValue::List(
        permissions
            .iter()
            .map(|permission| {
                ConfigValue::Map(ConfigMap::from([
                    (
                        "exchange".to_owned(),
                        ConfigValue::from(permission.exchange.as_str()),
                    ),
                    ("write".to_owned(), ConfigValue::from(permission.write.as_str())),
                    ("read".to_owned(), ConfigValue::from(permission.read.as_str())),
                ]))
            })
            .collect(),
    )
}
