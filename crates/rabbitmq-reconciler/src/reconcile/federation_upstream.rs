use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::{FEDERATION_UPSTREAM_COMPONENT, FederationDefinition, RuntimeParameter},
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

const DEFINITION: &str = "definition";

#[derive(Clone, Copy, Debug, Default)]
pub struct FederationUpstreamReconciler;

impl FederationUpstreamReconciler {
    fn path(vhost: &str, name: &str) -> ApiPath {
        ApiPath::parameter(FEDERATION_UPSTREAM_COMPONENT, vhost, name)
    }

    async fn put(client: &Client, name: &str, vhost: &str, data: &dyn StateStore) -> Result<()> {
        let kind = ObjectKind::FederationUpstream;
        let definition =
            normalize::federation_upstream::to_payload(config_block(kind, data, DEFINITION)?)
                .context(InvalidConfigurationSnafu { kind })?;

        let parameter = RuntimeParameter {
            name: name.to_owned(),
            vhost: vhost.to_owned(),
            component: FEDERATION_UPSTREAM_COMPONENT.to_owned(),
            value: definition,
        };
        let object = ObjectRef::new(kind, name, vhost);
        declare(client, &object, Self::path(vhost, name), &parameter).await?;

        Ok(())
    }
}

#[async_trait]
impl Reconciler for FederationUpstreamReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::FederationUpstream
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

        let path = Self::path(identity.vhost(), identity.name());
        let Some(upstream) =
            fetch::<RuntimeParameter<FederationDefinition>>(client, &object, path).await?
        else {
            data.set_id(None);
            return Ok(());
        };

        set_identity_fields(data, "name", &upstream.name, &upstream.vhost);
        data.set("component", ConfigValue::from(upstream.component));
        data.set(
            DEFINITION,
            ConfigValue::block(normalize::federation_upstream::from_payload(
                &upstream.value,
            )),
        );

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        ensure_unchanged(self.kind(), data, &["name", "vhost"])?;

        let changed = block_changed(
            self.kind(),
            data,
            DEFINITION,
            normalize::federation_upstream::to_payload,
        )?;
        if changed {
            Self::put(client, identity.name(), identity.vhost(), data).await?;
        }

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        remove(client, &object, Self::path(identity.vhost(), identity.name())).await
    }
}
