use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::Policy,
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

const POLICY: &str = "policy";

/// Policies are set by users, operator policies by operators. Both share
/// one shape and differ only in their API path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyScope {
    User,
    Operator,
}

#[derive(Clone, Copy, Debug)]
pub struct PolicyReconciler {
    scope: PolicyScope,
}

impl PolicyReconciler {
    pub fn new(scope: PolicyScope) -> Self {
        Self { scope }
    }

    fn path(&self, vhost: &str, name: &str) -> ApiPath {
        match self.scope {
            PolicyScope::User => ApiPath::policy(vhost, name),
            PolicyScope::Operator => ApiPath::operator_policy(vhost, name),
        }
    }

    async fn put(&self, client: &Client, name: &str, vhost: &str, data: &dyn StateStore) -> Result<()> {
        let kind = self.kind();
        let block = config_block(kind, data, POLICY)?;
        let policy = normalize::policy::to_payload(block).context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::new(kind, name, vhost);
        declare(client, &object, self.path(vhost, name), &policy).await?;
        Ok(())
    }
}

#[async_trait]
impl Reconciler for PolicyReconciler {
    fn kind(&self) -> ObjectKind {
        match self.scope {
            PolicyScope::User => ObjectKind::Policy,
            PolicyScope::Operator => ObjectKind::OperatorPolicy,
        }
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = config_str(self.kind(), data, "name")?.to_owned();
        let vhost = config_str(self.kind(), data, "vhost")?.to_owned();

        self.put(client, &name, &vhost, data).await?;
        data.set_id(Some(Identity::encode(&name, &vhost)));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        let path = self.path(identity.vhost(), identity.name());
        let Some(policy) = fetch::<Policy>(client, &object, path).await? else {
            data.set_id(None);
            return Ok(());
        };

        let prior = normalize::single_block(data.get(POLICY), POLICY).ok();
        let block = normalize::policy::from_payload(&policy, prior);

        set_identity_fields(
            data,
            "name",
            policy.name.as_deref().unwrap_or(identity.name()),
            policy.vhost.as_deref().unwrap_or(identity.vhost()),
        );
        data.set(POLICY, ConfigValue::block(block));

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        ensure_unchanged(self.kind(), data, &["name", "vhost"])?;

        if block_changed(self.kind(), data, POLICY, normalize::policy::to_payload)? {
            self.put(client, identity.name(), identity.vhost(), data).await?;
        }

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let identity = parse_identity(self.kind(), data)?;
        let object = ObjectRef::new(self.kind(), identity.name(), identity.vhost());

        // Policies vanish together with their vhost, absence is fine
        remove(client, &object, self.path(identity.vhost(), identity.name())).await
    }
}
