use crate::{
    api::{VhostInfo, VhostSettings},
    normalize::{Fields, Result, insert_some},
    value::{ConfigMap, ConfigValue},
};

pub fn to_payload(config: &ConfigMap) -> Result<VhostSettings> {
    let fields = Fields::new(config);

    Ok(VhostSettings {
        description: fields.optional_str("description")?.map(str::to_owned),
        default_queue_type: fields.optional_str("default_queue_type")?.map(str::to_owned),
        tracing: fields.optional_bool("tracing")?.unwrap_or(false),
    })
}

pub fn from_payload(info: &VhostInfo) -> ConfigMap {
    let mut config = ConfigMap::from([
        ("name".to_owned(), ConfigValue::from(info.name.as_str())),
        ("tracing".to_owned(), ConfigValue::Bool(info.settings.tracing)),
    ]);
    insert_some(
        &mut config,
        "description",
        info.settings.description.as_deref(),
    );
    insert_some(
        &mut config,
        "default_queue_type",
        info.settings.default_queue_type.as_deref(),
    );

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let config = ConfigMap::from([
            ("name".to_owned(), ConfigValue::from("team-a")),
            ("description".to_owned(), ConfigValue::from("Team A")),
            ("default_queue_type".to_owned(), ConfigValue::from("quorum")),
            ("tracing".to_owned(), ConfigValue::Bool(true)),
        ]);

        let info = VhostInfo {
            name: "team-a".to_owned(),
            settings: to_payload(&config).unwrap(),
        };

        assert_eq!(from_payload(&info), config);
    }
}
