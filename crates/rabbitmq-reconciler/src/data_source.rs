//! Read-only lookups of objects that are managed elsewhere.
//!
//! A lookup fills a [`StateStore`] the same way a read of a managed object
//! does. An object that does not exist leaves the store without identity
//! instead of failing.

use crate::{
    client::Client,
    identity::Identity,
    reconcile::{ExchangeReconciler, Reconciler, Result, UserReconciler, VhostReconciler},
    state::StateStore,
    value::ConfigValue,
};

/// The vhost an exchange is looked up in when none is given.
pub const DEFAULT_VHOST: &str = "/";

/// Looks up an exchange, in [`DEFAULT_VHOST`] unless `vhost` is given.
pub async fn read_exchange(
    client: &Client,
    name: &str,
    vhost: Option<&str>,
    data: &mut dyn StateStore,
) -> Result<()> {
    let vhost = vhost.unwrap_or(DEFAULT_VHOST);
    tracing::debug!(name, vhost, "looking up exchange");

    data.set("name", ConfigValue::from(name));
    data.set("vhost", ConfigValue::from(vhost));
    data.set_id(Some(Identity::encode(name, vhost)));

    ExchangeReconciler.read(client, data).await
}

pub async fn read_vhost(client: &Client, name: &str, data: &mut dyn StateStore) -> Result<()> {
    tracing::debug!(name, "looking up vhost");

    data.set("name", ConfigValue::from(name));
    data.set_id(Some(name.to_owned()));

    VhostReconciler.read(client, data).await
}

/// Looks up a user. The password is never part of the result.
pub async fn read_user(client: &Client, name: &str, data: &mut dyn StateStore) -> Result<()> {
    tracing::debug!(name, "looking up user");

    data.set("name", ConfigValue::from(name));
    data.set_id(Some(name.to_owned()));

    UserReconciler.read(client, data).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{client::ApiPath, state::ResourceData, testing::FakeBroker, value::ConfigMap};

    #[rstest]
    #[case(None, "amq.topic@/")]
    #[case(Some("team-a"), "amq.topic@team-a")]
    #[tokio::test]
    async fn exchange_lookup(#[case] vhost: Option<&str>, #[case] expected_id: &str) {
        let broker = Arc::new(FakeBroker::new().with_vhost("team-a"));
        let vhost_name = vhost.unwrap_or(DEFAULT_VHOST);
        broker.insert(
            ApiPath::exchange(vhost_name, "amq.topic"),
            json!({"name": "amq.topic", "vhost": vhost_name, "type": "topic", "durable": true, "auto_delete": false, "arguments": {}}),
        );
        let client = Client::new(broker.clone());

        let mut data = ResourceData::default();
        read_exchange(&client, "amq.topic", vhost, &mut data)
            .await
            .unwrap();

        assert_eq!(data.id(), Some(expected_id));
        let settings: ConfigValue =
            serde_yaml::from_str("[{type: topic, durable: true, auto_delete: false}]").unwrap();
        assert_eq!(data.get("settings"), Some(&settings));
    }

    #[tokio::test]
    async fn missing_vhost_clears_identity() {
        let broker = Arc::new(FakeBroker::new());
        let client = Client::new(broker.clone());

        let mut data = ResourceData::default();
        read_vhost(&client, "nowhere", &mut data).await.unwrap();

        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn user_lookup_reads_tags() {
        let broker = Arc::new(FakeBroker::new());
        broker.insert(
            ApiPath::user("guest"),
            json!({"name": "guest", "tags": "administrator"}),
        );
        let client = Client::new(broker.clone());

        let mut data = ResourceData::default();
        read_user(&client, "guest", &mut data).await.unwrap();

        let expected: ConfigMap = serde_yaml::from_str("{name: guest, tags: [administrator]}").unwrap();
        assert_eq!(data.id(), Some("guest"));
        assert_eq!(data.state(), &expected);
    }
}
