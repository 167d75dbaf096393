use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::ExchangeInfo,
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

/// Exchanges cannot be redeclared with different settings, every field is
/// immutable.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExchangeReconciler;

#[async_trait]
impl Reconciler for ExchangeReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Exchange
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let kind = self.kind();
        let name = config_str(kind, data, "name")?.to_owned();
        let vhost = config_str(kind, data, "vhost")?.to_owned();
        let settings = normalize::exchange::to_payload(config_block(kind, data, SETTINGS)?)
            .context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::new(kind, &name, &vhost);
        declare(client, &object, ApiPath::exchange(&vhost, &name), &settings).await?;
        data.set_id(Some(Identity::encode(&name, &vhost)));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        let path = ApiPath::exchange(identity.vhost(), identity.name());
        let Some(exchange) = fetch::<ExchangeInfo>(client, &object, path).await? else {
            data.set_id(None);
            return Ok(());
        };

        set_identity_fields(data, "name", &exchange.name, &exchange.vhost);
        data.set(
            SETTINGS,
            ConfigValue::block(normalize::exchange::from_payload(&exchange.settings)),
        );

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let kind = self.kind();
        parse_identity(kind, data)?;
        ensure_unchanged(kind, data, &["name", "vhost"])?;
        ensure_block_unchanged(kind, data, SETTINGS, normalize::exchange::to_payload)?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        remove(client, &object, ApiPath::exchange(identity.vhost(), identity.name())).await
    }
}
