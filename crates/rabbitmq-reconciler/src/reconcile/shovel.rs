use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::{RuntimeParameter, SHOVEL_COMPONENT, ShovelDefinition},
    client::{ApiPath, Client},
    identity::Identity,
    kind::{ObjectKind, ObjectRef},
    normalize,
    reconcile::{
        InvalidConfigurationSnafu, Reconciler, Result, block_changed, config_block, config_str,
        declare, ensure_unchanged, fetch, parse_identity, remove, set_identity_fields,
    },
    state::StateStore,
    value::ConfigValue,
};

const INFO: &str = "info";

/// Dynamic shovels, stored as runtime parameters of the `shovel` component.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShovelReconciler;

impl ShovelReconciler {
    async fn put(client: &Client, name: &str, vhost: &str, data: &dyn StateStore) -> Result<()> {
        let kind = ObjectKind::Shovel;
        let definition = normalize::shovel::to_payload(config_block(kind, data, INFO)?)
            .context(InvalidConfigurationSnafu { kind })?;

        let parameter = RuntimeParameter {
            name: name.to_owned(),
            vhost: vhost.to_owned(),
            component: SHOVEL_COMPONENT.to_owned(),
            value: definition,
        };
        let object = ObjectRef::new(kind, name, vhost);
        declare(
            client,
            &object,
            ApiPath::parameter(SHOVEL_COMPONENT, vhost, name),
            &parameter,
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Reconciler for ShovelReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Shovel
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = config_str(self.kind(), data, "name")?.to_owned();
        let vhost = config_str(self.kind(), data, "vhost")?.to_owned();

        Self::put(client, &name, &vhost, data).await?;
        data.set_id(Some(Identity::encode(&name, &vhost)));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        let path = ApiPath::parameter(SHOVEL_COMPONENT, identity.vhost(), identity.name());
        let Some(shovel) = fetch::<RuntimeParameter<ShovelDefinition>>(client, &object, path).await?
        else {
            data.set_id(None);
            return Ok(());
        };

        let prior = normalize::single_block(data.get(INFO), INFO).ok().cloned();
        let info = normalize::shovel::from_payload(&shovel.value, prior.as_ref());

        set_identity_fields(data, "name", &shovel.name, &shovel.vhost);
        data.set(INFO, ConfigValue::block(info));

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        ensure_unchanged(self.kind(), data, &["name", "vhost"])?;

        if block_changed(self.kind(), data, INFO, normalize::shovel::to_payload)? {
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
            ApiPath::parameter(SHOVEL_COMPONENT, identity.vhost(), identity.name()),
        )
        .await
    }
}
