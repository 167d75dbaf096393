use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::Permissions,
    client::{ApiPath, Client},
    identity::Identity,
    kind::{ObjectKind, ObjectRef},
    normalize,
    reconcile::{
        InvalidConfigurationSnafu, Reconciler, Result, config_block, config_str, declare,
        ensure_unchanged, fetch, parse_identity, remove, set_identity_fields,
    },
    state::StateStore,
    value::ConfigValue,
};

const PERMISSIONS: &str = "permissions";

/// Permissions of a user in a vhost. The identity is `<user>@<vhost>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermissionsReconciler;

impl PermissionsReconciler {
    async fn put(client: &Client, user: &str, vhost: &str, data: &dyn StateStore) -> Result<()> {
        let kind = ObjectKind::Permissions;
        let permissions = normalize::permissions::to_payload(config_block(kind, data, PERMISSIONS)?)
            .context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::new(kind, user, vhost);
        declare(
            client,
            &object,
            ApiPath::permissions(vhost, user),
            &permissions,
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Reconciler for PermissionsReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Permissions
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let user = config_str(self.kind(), data, "user")?.to_owned();
        let vhost = config_str(self.kind(), data, "vhost")?.to_owned();

        Self::put(client, &user, &vhost, data).await?;
        data.set_id(Some(Identity::encode(&user, &vhost)));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        let path = ApiPath::permissions(identity.vhost(), identity.name());
        let Some(permissions) = fetch::<Permissions>(client, &object, path).await? else {
            data.set_id(None);
            return Ok(());
        };

        set_identity_fields(data, "user", identity.name(), identity.vhost());
        data.set(
            PERMISSIONS,
            ConfigValue::block(normalize::permissions::from_payload(&permissions)),
        );

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        ensure_unchanged(self.kind(), data, &["user", "vhost"])?;

        if data.has_change(PERMISSIONS) {
            Self::put(client, identity.name(), identity.vhost(), data).await?;
        }

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        remove(
            client,
            &object,
            ApiPath::permissions(identity.vhost(), identity.name()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::StatusCode;
    use indoc::indoc;

    use super::*;
    use crate::{
        absence::Classification, reconcile::Error, state::ResourceData, testing::FakeBroker,
        value::ConfigMap,
    };

    fn config(yaml: &str) -> ConfigMap {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn permissions_lifecycle() {
        let broker = Arc::new(FakeBroker::new().with_vhost("team-a"));
        let client = Client::new(broker.clone());

        let desired = config(indoc! {"
            user: alice
            vhost: team-a
            permissions:
              - configure: ''
                write: ^orders\\.
                read: .*
        "});
        let mut data = ResourceData::new(desired.clone());
        PermissionsReconciler.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), Some("alice@team-a"));
        assert_eq!(data.state(), &desired);

        let (id, state) = data.into_parts();
        let mut data = ResourceData::from_state(id.unwrap(), state).with_config(config(indoc! {"
            user: alice
            vhost: team-a
            permissions:
              - configure: ''
                write: ''
                read: .*
        "}));
        PermissionsReconciler.update(&client, &mut data).await.unwrap();

        let stored = broker
            .object(&ApiPath::permissions("team-a", "alice"))
            .unwrap();
        assert_eq!(stored["write"], "");

        PermissionsReconciler.delete(&client, &mut data).await.unwrap();
        assert!(
            broker
                .object(&ApiPath::permissions("team-a", "alice"))
                .is_none()
        );
    }

    #[tokio::test]
    async fn changing_user_is_rejected() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let mut data = ResourceData::from_state("alice@/", config("{user: alice, vhost: /}"))
            .with_config(config("{user: bob, vhost: /}"));

        let err = PermissionsReconciler
            .update(&client, &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImmutableField { field, .. } if field == "user"));
    }

    #[tokio::test]
    async fn missing_vhost_is_soft_error() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let mut data = ResourceData::new(config(
            "{user: alice, vhost: missing, permissions: [{configure: '.*', write: '.*', read: '.*'}]}",
        ));

        let err = PermissionsReconciler
            .create(&client, &mut data)
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            Error::Declare { status, .. } if *status == StatusCode::NOT_FOUND
        ));
        assert_eq!(err.classification(), Some(Classification::SoftError));
        assert_eq!(data.id(), None);
    }
}
