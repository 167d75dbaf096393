use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::VhostInfo,
    client::{ApiPath, Client},
    kind::{ObjectKind, ObjectRef},
    normalize,
    reconcile::{
        InvalidConfigurationSnafu, Reconciler, Result, collect_fields, config_str, declare,
        ensure_unchanged, fetch, fields_changed, remove, require_id,
    },
    state::StateStore,
};

/// Fields that are submitted on declare. The name is part of the path.
const SETTINGS: &[&str] = &["description", "default_queue_type", "tracing"];

/// Virtual hosts are global, their identity is the bare name.
#[derive(Clone, Copy, Debug, Default)]
pub struct VhostReconciler;

impl VhostReconciler {
    async fn put(client: &Client, name: &str, data: &dyn StateStore) -> Result<()> {
        let kind = ObjectKind::Vhost;
        let settings = normalize::vhost::to_payload(&collect_fields(data, SETTINGS))
            .context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::global(kind, name);
        declare(client, &object, ApiPath::vhost(name), &settings).await?;

        Ok(())
    }
}

#[async_trait]
impl Reconciler for VhostReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Vhost
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = config_str(self.kind(), data, "name")?.to_owned();

        Self::put(client, &name, data).await?;
        data.set_id(Some(name));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = require_id(self.kind(), data)?;
        let object = ObjectRef::global(self.kind(), &name);

        let Some(vhost) = fetch::<VhostInfo>(client, &object, ApiPath::vhost(&name)).await? else {
            data.set_id(None);
            return Ok(());
        };

        for (field, value) in normalize::vhost::from_payload(&vhost) {
            data.set(&field, value);
        }

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = require_id(self.kind(), data)?;
        ensure_unchanged(self.kind(), data, &["name"])?;

        if fields_changed(self.kind(), data, SETTINGS, normalize::vhost::to_payload)? {
            Self::put(client, &name, data).await?;
        }

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = require_id(self.kind(), data)?;
        let object = ObjectRef::global(self.kind(), &name);

        remove(client, &object, ApiPath::vhost(&name)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;

    use super::*;
    use crate::{
        reconcile::{Error, reconciler_for},
        state::ResourceData,
        testing::FakeBroker,
        value::ConfigMap,
    };

    fn config(yaml: &str) -> ConfigMap {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn vhost_lifecycle() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let desired = config("{name: team-a, description: Team A, tracing: false}");
        let mut data = ResourceData::new(desired.clone());
        VhostReconciler.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), Some("team-a"));
        assert_eq!(data.state(), &desired);

        let (id, state) = data.into_parts();
        let mut data = ResourceData::from_state(id.unwrap(), state).with_config(config(
            "{name: team-a, description: Team A, default_queue_type: quorum, tracing: false}",
        ));
        VhostReconciler.update(&client, &mut data).await.unwrap();

        let stored = broker.object(&ApiPath::vhost("team-a")).unwrap();
        assert_eq!(stored["default_queue_type"], "quorum");

        VhostReconciler.delete(&client, &mut data).await.unwrap();
        assert!(broker.object(&ApiPath::vhost("team-a")).is_none());
    }

    #[tokio::test]
    async fn unchanged_vhost_is_not_declared_again() {
        let broker = Arc::new(FakeBroker::new().with_vhost("team-a"));
        let client = Client::new(broker.clone());

        let state = config("{name: team-a, tracing: false}");
        let mut data = ResourceData::from_state("team-a", state)
            .with_config(config("{name: team-a}"));
        VhostReconciler.update(&client, &mut data).await.unwrap();

        let requests = broker.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
    }

    #[tokio::test]
    async fn renaming_vhost_is_rejected() {
        let broker = Arc::new(FakeBroker::new().with_vhost("team-a"));
        let client = Client::new(broker.clone());

        let mut data = ResourceData::from_state("team-a", config("{name: team-a}"))
            .with_config(config("{name: team-b}"));

        let err = VhostReconciler.update(&client, &mut data).await.unwrap_err();
        assert!(matches!(err, Error::ImmutableField { field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn deleting_vhost_removes_its_objects() {
        let broker = Arc::new(FakeBroker::new().with_vhost("team-a"));
        let client = Client::new(broker.clone());

        let mut exchange = ResourceData::new(config(
            "{name: events, vhost: team-a, settings: [{type: topic}]}",
        ));
        let exchanges = reconciler_for(ObjectKind::Exchange);
        exchanges.create(&client, &mut exchange).await.unwrap();

        let mut vhost = ResourceData::from_state("team-a", config("{name: team-a}"));
        VhostReconciler.delete(&client, &mut vhost).await.unwrap();

        // The exchange vanished along with its vhost
        exchanges.read(&client, &mut exchange).await.unwrap();
        assert_eq!(exchange.id(), None);
    }
}
