use async_trait::async_trait;
use snafu::ResultExt;

use crate::{
    api::UserInfo,
    client::{ApiPath, Client},
    kind::{ObjectKind, ObjectRef},
    normalize,
    reconcile::{
        InvalidConfigurationSnafu, Reconciler, Result, collect_fields, config_str, declare,
        ensure_unchanged, fetch, fields_changed, remove, require_id,
    },
    state::StateStore,
};

const SETTINGS: &[&str] = &["password", "tags"];

/// Users are global, their identity is the bare name.
///
/// The API never returns the password, so the read-back keeps whatever the
/// state holds. Password and tags are always submitted together.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserReconciler;

impl UserReconciler {
    async fn put(client: &Client, name: &str, data: &dyn StateStore) -> Result<()> {
        let kind = ObjectKind::User;
        let settings = normalize::user::to_payload(&collect_fields(data, SETTINGS))
            .context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::global(kind, name);
        declare(client, &object, ApiPath::user(name), &settings).await?;

        Ok(())
    }
}

#[async_trait]
impl Reconciler for UserReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::User
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

        let Some(user) = fetch::<UserInfo>(client, &object, ApiPath::user(&name)).await? else {
            data.set_id(None);
            return Ok(());
        };

        let password = data.get("password").cloned();
        for (field, value) in normalize::user::from_payload(&user, password.as_ref()) {
            data.set(&field, value);
        }

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = require_id(self.kind(), data)?;
        ensure_unchanged(self.kind(), data, &["name"])?;

        if fields_changed(self.kind(), data, SETTINGS, normalize::user::to_payload)? {
            Self::put(client, &name, data).await?;
        }

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let name = require_id(self.kind(), data)?;
        let object = ObjectRef::global(self.kind(), &name);

        remove(client, &object, ApiPath::user(&name)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;
    use serde_json::json;

    use super::*;
    use crate::{reconcile::Error, state::ResourceData, testing::FakeBroker, value::ConfigMap};

    fn config(yaml: &str) -> ConfigMap {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn password_survives_read_back() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let desired = config("{name: alice, password: secret, tags: [administrator, monitoring]}");
        let mut data = ResourceData::new(desired.clone());
        UserReconciler.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), Some("alice"));
        assert_eq!(data.state(), &desired);

        let stored = broker.object(&ApiPath::user("alice")).unwrap();
        assert_eq!(stored.get("password"), None);
        assert_eq!(stored["tags"], json!(["administrator", "monitoring"]));
    }

    #[tokio::test]
    async fn changed_tags_are_submitted_with_password() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let mut data = ResourceData::new(config("{name: alice, password: secret, tags: []}"));
        UserReconciler.create(&client, &mut data).await.unwrap();

        let (id, state) = data.into_parts();
        let mut data = ResourceData::from_state(id.unwrap(), state)
            .with_config(config("{name: alice, password: secret, tags: [management]}"));
        let requests_before = broker.requests().len();
        UserReconciler.update(&client, &mut data).await.unwrap();

        let requests = broker.requests().split_off(requests_before);
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(
            requests[0].body,
            Some(json!({"password": "secret", "tags": "management"}))
        );
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn omitted_tags_are_not_declared_again() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let desired = config("{name: alice, password: secret}");
        let mut data = ResourceData::new(desired.clone());
        UserReconciler.create(&client, &mut data).await.unwrap();

        let (id, state) = data.into_parts();
        let mut data = ResourceData::from_state(id.unwrap(), state).with_config(desired);
        let requests_before = broker.requests().len();
        UserReconciler.update(&client, &mut data).await.unwrap();

        let requests = broker.requests().split_off(requests_before);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
    }

    #[tokio::test]
    async fn missing_password_is_rejected() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let mut data = ResourceData::new(config("{name: alice}"));
        let err = UserReconciler.create(&client, &mut data).await.unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration { .. }));
        assert!(broker.requests().is_empty());
    }

    #[tokio::test]
    async fn user_deleted_out_of_band_clears_identity() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let mut data = ResourceData::from_state("bob", config("{name: bob, password: secret}"));
        UserReconciler.read(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), None);
    }
}
