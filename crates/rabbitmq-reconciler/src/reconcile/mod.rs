//! Create, read, update and delete of managed objects.
//!
//! Every object kind has its own [`Reconciler`]. All of them follow the same
//! state machine:
//!
//! - **create** normalizes the desired configuration, declares the object,
//!   stores its identity and finishes with a read.
//! - **read** fetches the object by identity and writes the normalized
//!   remote state back into the [`StateStore`]. A vanished object clears the
//!   identity instead of failing.
//! - **update** re-declares the object if its definition changed (full
//!   replacement, never a patch) and finishes with a read.
//! - **delete** removes the object. An object that is already gone counts
//!   as deleted.
//!
//! Every call performs its remote requests strictly one after another.

use async_trait::async_trait;
use http::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{
    absence::{Classification, classify_error, classify_status},
    client::{self, ApiPath, ApiResponse, Client},
    identity::{Identity, IdentityError},
    kind::{ObjectKind, ObjectRef},
    normalize::{self, binding::BindingKeyError},
    state::StateStore,
    value::{ConfigMap, ConfigValue},
};

mod binding;
mod exchange;
mod federation_upstream;
mod permissions;
mod policy;
mod queue;
mod shovel;
mod topic_permissions;
mod user;
mod vhost;

pub use binding::BindingReconciler;
pub use exchange::ExchangeReconciler;
pub use federation_upstream::FederationUpstreamReconciler;
pub use permissions::PermissionsReconciler;
pub use policy::{PolicyReconciler, PolicyScope};
pub use queue::QueueReconciler;
pub use shovel::ShovelReconciler;
pub use topic_permissions::TopicPermissionsReconciler;
pub use user::UserReconciler;
pub use vhost::VhostReconciler;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{kind} has no identity, it has not been created yet"))]
    MissingIdentity { kind: ObjectKind },

    #[snafu(display("failed to parse the identity of a {kind}"))]
    MalformedIdentity {
        source: IdentityError,
        kind: ObjectKind,
    },

    #[snafu(display("failed to parse the binding key"))]
    MalformedBindingKey { source: BindingKeyError },

    #[snafu(display("invalid configuration for {kind}"))]
    InvalidConfiguration {
        source: normalize::Error,
        kind: ObjectKind,
    },

    #[snafu(display("failed to reach the management API for {object}"))]
    Transport {
        source: client::Error,
        object: ObjectRef,
    },

    #[snafu(display("failed to declare {object}: {status}"))]
    Declare { object: ObjectRef, status: StatusCode },

    #[snafu(display("failed to delete {object}: {status}"))]
    Delete { object: ObjectRef, status: StatusCode },

    #[snafu(display("failed to fetch {object}: {status}"))]
    Fetch { object: ObjectRef, status: StatusCode },

    #[snafu(display(
        "field {field:?} of {kind} cannot be changed, the object has to be deleted and created again"
    ))]
    ImmutableField { kind: ObjectKind, field: String },

    #[snafu(display("creating {object} did not return the location of the new object"))]
    MissingLocation { object: ObjectRef },
}

impl Error {
    /// The classification of the failure, as seen from the caller.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Self::Transport { .. } => Some(Classification::TransportError),
            Self::Declare { .. } | Self::Delete { .. } | Self::Fetch { .. } => {
                Some(Classification::SoftError)
            }
            _ => None,
        }
    }
}

/// Reconciles objects of one kind against the management API.
///
/// The client is passed to every call, reconcilers hold no connection state.
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> ObjectKind;

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()>;

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()>;

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()>;

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()>;
}

/// Returns the reconciler responsible for `kind`.
pub fn reconciler_for(kind: ObjectKind) -> Box<dyn Reconciler> {
    match kind {
        ObjectKind::Exchange => Box::new(ExchangeReconciler),
        ObjectKind::Queue => Box::new(QueueReconciler),
        ObjectKind::Binding => Box::new(BindingReconciler),
        ObjectKind::Policy => Box::new(PolicyReconciler::new(PolicyScope::User)),
        ObjectKind::OperatorPolicy => Box::new(PolicyReconciler::new(PolicyScope::Operator)),
        ObjectKind::Shovel => Box::new(ShovelReconciler),
        ObjectKind::Vhost => Box::new(VhostReconciler),
        ObjectKind::User => Box::new(UserReconciler),
        ObjectKind::Permissions => Box::new(PermissionsReconciler),
        ObjectKind::TopicPermissions => Box::new(TopicPermissionsReconciler),
        ObjectKind::FederationUpstream => Box::new(FederationUpstreamReconciler),
    }
}

/// Declares an object with `PUT`. Any non-2xx status fails.
pub(crate) async fn declare<B>(
    client: &Client,
    object: &ObjectRef,
    path: ApiPath,
    body: &B,
) -> Result<ApiResponse>
where
    B: Serialize + Sync + ?Sized,
{
    tracing::debug!(%object, %path, "attempting to declare object");
    let response = client
        .declare(path, body)
        .await
        .with_context(|_| TransportSnafu {
            object: object.clone(),
        })?;
    tracing::debug!(%object, status = %response.status, "declare response");

    ensure!(
        classify_status(response.status) == Classification::Success,
        DeclareSnafu {
            object: object.clone(),
            status: response.status
        }
    );

    Ok(response)
}

/// Fetches an object. Returns `None` if it does not exist remotely.
pub(crate) async fn fetch<T>(client: &Client, object: &ObjectRef, path: ApiPath) -> Result<Option<T>>
where
    T: DeserializeOwned + Send,
{
    let error = match client.get(path).await {
        Ok(value) => {
            tracing::debug!(%object, "object retrieved");
            return Ok(Some(value));
        }
        Err(error) => error,
    };

    match (classify_error(&error), error.status()) {
        (Classification::NotFound, _) => {
            tracing::info!(%object, "object no longer exists remotely");
            Ok(None)
        }
        (Classification::SoftError, Some(status)) => FetchSnafu {
            object: object.clone(),
            status,
        }
        .fail(),
        _ => Err(error).with_context(|_| TransportSnafu {
            object: object.clone(),
        }),
    }
}

/// Deletes an object. An object that is already absent counts as deleted.
pub(crate) async fn remove(client: &Client, object: &ObjectRef, path: ApiPath) -> Result<()> {
    tracing::debug!(%object, %path, "attempting to delete object");
    let response = client
        .delete(path)
        .await
        .with_context(|_| TransportSnafu {
            object: object.clone(),
        })?;
    tracing::debug!(%object, status = %response.status, "delete response");

    match classify_status(response.status) {
        Classification::Success => Ok(()),
        Classification::NotFound => {
            tracing::debug!(%object, "object was already absent");
            Ok(())
        }
        Classification::SoftError | Classification::TransportError => DeleteSnafu {
            object: object.clone(),
            status: response.status,
        }
        .fail(),
    }
}

/// Returns the stored identity string.
pub(crate) fn require_id(kind: ObjectKind, data: &dyn StateStore) -> Result<String> {
    data.id()
        .map(str::to_owned)
        .context(MissingIdentitySnafu { kind })
}

/// Decodes the stored `<name>@<vhost>` identity.
pub(crate) fn parse_identity(kind: ObjectKind, data: &dyn StateStore) -> Result<Identity> {
    require_id(kind, data)?
        .parse()
        .context(MalformedIdentitySnafu { kind })
}

pub(crate) fn config_str<'a>(
    kind: ObjectKind,
    data: &'a dyn StateStore,
    field: &str,
) -> Result<&'a str> {
    normalize::required_str(data.get(field), field).context(InvalidConfigurationSnafu { kind })
}

/// Returns the single block of `field`.
pub(crate) fn config_block<'a>(
    kind: ObjectKind,
    data: &'a dyn StateStore,
    field: &str,
) -> Result<&'a ConfigMap> {
    normalize::single_block(data.get(field), field).context(InvalidConfigurationSnafu { kind })
}

/// Collects top-level fields into one map, for kinds that keep their
/// definition at the top level.
pub(crate) fn collect_fields(data: &dyn StateStore, fields: &[&str]) -> ConfigMap {
    fields
        .iter()
        .filter_map(|field| {
            data.get(field)
                .map(|value| ((*field).to_owned(), value.clone()))
        })
        .collect()
}

/// Fails if any of the given fields changed since the last reconciliation.
pub(crate) fn ensure_unchanged(
    kind: ObjectKind,
    data: &dyn StateStore,
    fields: &[&str],
) -> Result<()> {
    for field in fields {
        ensure!(
            !data.has_change(field),
            ImmutableFieldSnafu { kind, field: *field }
        );
    }

    Ok(())
}

/// Returns true if the normalized payload of a block differs from the one of
/// the prior state.
///
/// Comparing payloads instead of raw values means that leaving out or
/// spelling out a default, or an integer as a string, is not mistaken for a
/// change.
pub(crate) fn block_changed<T, F>(
    kind: ObjectKind,
    data: &dyn StateStore,
    field: &str,
    to_payload: F,
) -> Result<bool>
where
    T: PartialEq,
    F: Fn(&ConfigMap) -> normalize::Result<T>,
{
    if !data.has_change(field) {
        return Ok(false);
    }

    let (prior, current) = data.get_change(field);
    let current = normalize::single_block(current, field)
        .and_then(&to_payload)
        .context(InvalidConfigurationSnafu { kind })?;
    let unchanged = prior.is_some_and(|prior| {
        normalize::single_block(Some(prior), field)
            .and_then(&to_payload)
            .is_ok_and(|prior| prior == current)
    });

    Ok(!unchanged)
}

/// Like [`block_changed`], for kinds that keep their definition in top-level
/// fields.
pub(crate) fn fields_changed<T, F>(
    kind: ObjectKind,
    data: &dyn StateStore,
    fields: &[&str],
    to_payload: F,
) -> Result<bool>
where
    T: PartialEq,
    F: Fn(&ConfigMap) -> normalize::Result<T>,
{
    if !fields.iter().any(|field| data.has_change(field)) {
        return Ok(false);
    }

    let current =
        to_payload(&collect_fields(data, fields)).context(InvalidConfigurationSnafu { kind })?;
    let prior: ConfigMap = fields
        .iter()
        .filter_map(|field| {
            data.prior(field)
                .map(|value| ((*field).to_owned(), value.clone()))
        })
        .collect();

    Ok(!to_payload(&prior).is_ok_and(|prior| prior == current))
}

/// Fails if the normalized payload of a block differs from the one of the
/// prior state.
pub(crate) fn ensure_block_unchanged<T, F>(
    kind: ObjectKind,
    data: &dyn StateStore,
    field: &str,
    to_payload: F,
) -> Result<()>
where
    T: PartialEq,
    F: Fn(&ConfigMap) -> normalize::Result<T>,
{
    if data.prior(field).is_none() {
        return Ok(());
    }

    ensure!(
        !block_changed(kind, data, field, to_payload)?,
        ImmutableFieldSnafu { kind, field }
    );
    Ok(())
}

/// Sets the `name` and `vhost` fields from a decoded identity.
pub(crate) fn set_identity_fields(
    data: &mut dyn StateStore,
    name_field: &str,
    name: &str,
    vhost: &str,
) {
    data.set(name_field, ConfigValue::from(name));
    data.set("vhost", ConfigValue::from(vhost));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;
    use crate::{state::ResourceData, testing::FakeBroker};

    fn client(broker: &Arc<FakeBroker>) -> Client {
        Client::new(broker.clone())
    }

    #[rstest]
    #[case(ObjectKind::Exchange)]
    #[case(ObjectKind::Policy)]
    #[case(ObjectKind::OperatorPolicy)]
    #[case(ObjectKind::TopicPermissions)]
    #[case(ObjectKind::Vhost)]
    fn registry_returns_matching_kind(#[case] kind: ObjectKind) {
        assert_eq!(reconciler_for(kind).kind(), kind);
    }

    #[rstest]
    #[case(ObjectKind::Policy, "no-separator")]
    #[case(ObjectKind::Shovel, "")]
    #[tokio::test]
    async fn malformed_identity_is_fatal(#[case] kind: ObjectKind, #[case] id: &str) {
        let broker = Arc::new(FakeBroker::new());
        let mut data = ResourceData::from_state(id, ConfigMap::new());

        let err = reconciler_for(kind)
            .read(&client(&broker), &mut data)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedIdentity { .. }));
        assert!(broker.requests().is_empty());
    }

    #[tokio::test]
    async fn read_without_identity_fails() {
        let broker = Arc::new(FakeBroker::new());
        let mut data = ResourceData::new(ConfigMap::new());

        let err = reconciler_for(ObjectKind::Exchange)
            .read(&client(&broker), &mut data)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingIdentity { .. }));
    }

    #[tokio::test]
    async fn fetch_failure_is_soft_error() {
        let broker = Arc::new(FakeBroker::new());
        broker.fail_next_with(StatusCode::INTERNAL_SERVER_ERROR);
        let mut data = ResourceData::from_state("amq.direct@/", ConfigMap::new());

        let err = reconciler_for(ObjectKind::Exchange)
            .read(&client(&broker), &mut data)
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            Error::Fetch { status, .. } if *status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert_eq!(err.classification(), Some(Classification::SoftError));
        assert_eq!(data.id(), Some("amq.direct@/"));
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced() {
        let broker = Arc::new(FakeBroker::new());
        broker.fail_next_with_transport_error();
        let mut data = ResourceData::from_state("amq.direct@/", ConfigMap::new());

        let err = reconciler_for(ObjectKind::Exchange)
            .delete(&client(&broker), &mut data)
            .await
            .unwrap_err();

        assert_eq!(err.classification(), Some(Classification::TransportError));
    }
}
