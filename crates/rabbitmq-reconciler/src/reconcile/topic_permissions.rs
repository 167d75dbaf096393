use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::TopicPermission,
    client::{ApiPath, Client},
    identity::Identity,
    kind::{ObjectKind, ObjectRef},
    normalize,
    reconcile::{
        InvalidConfigurationSnafu, Reconciler, Result, config_str, declare, ensure_unchanged,
        fetch, parse_identity, remove, set_identity_fields,
    },
    state::StateStore,
};

const PERMISSIONS: &str = "permissions";

/// Topic permissions of a user in a vhost, one `permissions` block per
/// exchange. The identity is `<user>@<vhost>`.
///
/// The API declares them one exchange at a time, so an update first removes
/// all of them and then declares every block again.
#[derive(Clone, Copy, Debug, Default)]
pub struct TopicPermissionsReconciler;

impl TopicPermissionsReconciler {
    async fn put_all(
        client: &Client,
        user: &str,
        vhost: &str,
        data: &dyn StateStore,
    ) -> Result<()> {
        let kind = ObjectKind::TopicPermissions;
        let permissions = normalize::blocks(data.get(PERMISSIONS), PERMISSIONS)
            .and_then(|blocks| normalize::permissions::topic_to_payload(&blocks))
            .context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::new(kind, user, vhost);
        for permission in &permissions {
            tracing::debug!(%object, exchange = %permission.exchange, "declaring topic permission");
            declare(
                client,
                &object,
                ApiPath::topic_permissions(vhost, user),
                permission,
            )
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Reconciler for TopicPermissionsReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::TopicPermissions
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let user = config_str(self.kind(), data, "user")?.to_owned();
        let vhost = config_str(self.kind(), data, "vhost")?.to_owned();

        Self::put_all(client, &user, &vhost, data).await?;
        data.set_id(Some(Identity::encode(&user, &vhost)));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        let path = ApiPath::topic_permissions(identity.vhost(), identity.name());
        let permissions = fetch::<Vec<TopicPermission>>(client, &object, path)
            .await?
            .unwrap_or_default();

        if permissions.is_empty() {
            tracing::info!(%object, "no topic permissions left remotely");
            data.set_id(None);
            return Ok(());
        }

        set_identity_fields(data, "user", identity.name(), identity.vhost());
        data.set(
            PERMISSIONS,
            normalize::permissions::topic_from_payload(&permissions),
        );

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        ensure_unchanged(self.kind(), data, &["user", "vhost"])?;

        if data.has_change(PERMISSIONS) {
            self.delete(client, data).await?;
            Self::put_all(client, identity.name(), identity.vhost(), data).await?;
        }

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        remove(
            client,
            &object,
            ApiPath::topic_permissions(identity.vhost(), identity.name()),
        )
        .await
    }
}
