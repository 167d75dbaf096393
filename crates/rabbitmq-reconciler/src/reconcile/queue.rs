use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::QueueInfo,
    client::{ApiPath, Client},
    identity::Identity,
    kind::{ObjectKind, ObjectRef},
    normalize,
    reconcile::{
        InvalidConfigurationSnafu, Reconciler, Result, config_block, config_str, declare,
        ensure_block_unchanged, ensure_unchanged, fetch, parse_identity, remove,
        set_identity_fields,
    },
    state::StateStore,
    value::ConfigValue,
};

const SETTINGS: &str = "settings";

#[derive(Clone, Copy, Debug, Default)]
pub struct QueueReconciler;

#[async_trait]
impl Reconciler for QueueReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Queue
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let kind = self.kind();
        let name = config_str(kind, data, "name")?.to_owned();
        let vhost = config_str(kind, data, "vhost")?.to_owned();
        let settings = normalize::queue::to_payload(config_block(kind, data, SETTINGS)?)
            .context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::new(kind, &name, &vhost);
        declare(client, &object, ApiPath::queue(&vhost, &name), &settings).await?;
        data.set_id(Some(Identity::encode(&name, &vhost)));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        let path = ApiPath::queue(identity.vhost(), identity.name());
        let Some(queue) = fetch::<QueueInfo>(client, &object, path).await? else {
            data.set_id(None);
            return Ok(());
        };

        let prior = normalize::single_block(data.get(SETTINGS), SETTINGS)
            .ok()
            .cloned();
        let settings = normalize::queue::from_payload(&queue.settings, prior.as_ref());

        set_identity_fields(data, "name", &queue.name, &queue.vhost);
        data.set(SETTINGS, ConfigValue::block(settings));

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let kind = self.kind();
        parse_identity(kind, data)?;
        ensure_unchanged(kind, data, &["name", "vhost"])?;
        ensure_block_unchanged(kind, data, SETTINGS, normalize::queue::to_payload)?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        remove(client, &object, ApiPath::queue(identity.vhost(), identity.name())).await
    }
}
