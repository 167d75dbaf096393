use async_trait::async_trait;
use snafu::{OptionExt, ResultExt, ensure};

use crate::{
    absence::{Classification, classify_status},
    api::{BindingInfo, BindingSettings},
    client::{ApiPath, Client},
    identity::Identity,
    kind::{ObjectKind, ObjectRef},
    normalize::{
        self,
        binding::{BindingKey, BindingTarget, destination_code},
    },
    reconcile::{
        DeclareSnafu, ImmutableFieldSnafu, InvalidConfigurationSnafu, MalformedBindingKeySnafu,
        MissingLocationSnafu, Reconciler, Result, TransportSnafu, collect_fields, fetch,
        parse_identity, remove,
    },
    state::StateStore,
    value::ConfigMap,
};

const FIELDS: &[&str] = &[
    "source",
    "vhost",
    "destination",
    "destination_type",
    "routing_key",
    "arguments",
];

/// Bindings have no name. Their identity is the binding key plus the vhost,
/// and the properties key part is only known after creation. Every field is
/// immutable.
#[derive(Clone, Copy, Debug, Default)]
pub struct BindingReconciler;

impl BindingReconciler {
    fn path(vhost: &str, key: &BindingKey) -> ApiPath {
        ApiPath::bindings(
            vhost,
            &key.source,
            key.destination_code(),
            &key.destination,
        )
        .join(key.properties_key.as_str())
    }

    fn parse_identity(data: &dyn StateStore) -> Result<(BindingKey, String, ObjectRef)> {
        let identity = parse_identity(ObjectKind::Binding, data)?;
        let key: BindingKey = identity.name().parse().context(MalformedBindingKeySnafu)?;
        let object = ObjectRef::new(ObjectKind::Binding, identity.name(), identity.vhost());

        let (_, vhost) = identity.into_parts();
        Ok((key, vhost, object))
    }
}

#[async_trait]
impl Reconciler for BindingReconciler {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Binding
    }

    async fn create(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let kind = self.kind();
        let (target, settings) = normalize::binding::to_payload(&collect_fields(data, FIELDS))
            .context(InvalidConfigurationSnafu { kind })?;

        let object = ObjectRef::new(
            kind,
            format!("{} -> {}", target.source, target.destination),
            &target.vhost,
        );
        let path = ApiPath::bindings(
            &target.vhost,
            &target.source,
            destination_code(&target.destination_type),
            &target.destination,
        );

        tracing::debug!(%object, %path, "attempting to create binding");
        let response = client
            .create(path, &settings)
            .await
            .with_context(|_| TransportSnafu {
                object: object.clone(),
            })?;
        tracing::debug!(%object, status = %response.status, location = ?response.location, "binding creation response");

        ensure!(
            classify_status(response.status) == Classification::Success,
            DeclareSnafu {
                object: object.clone(),
                status: response.status
            }
        );

        // The location ends with the properties key the API assigned
        let properties_key = response
            .location
            .as_deref()
            .and_then(|location| location.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .context(MissingLocationSnafu {
                object: object.clone(),
            })?;
        let properties_key = urlencoding::decode(properties_key)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| properties_key.to_owned());

        let key = BindingKey {
            source: target.source,
            destination: target.destination,
            destination_type: target.destination_type,
            properties_key,
        };
        data.set_id(Some(Identity::encode(&key.to_string(), &target.vhost)));

        self.read(client, data).await
    }

    async fn read(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let (key, vhost, object) = Self::parse_identity(data)?;

        let path = Self::path(&vhost, &key);
        let Some(binding) = fetch::<BindingInfo>(client, &object, path).await? else {
            data.set_id(None);
            return Ok(());
        };

        for (field, value) in normalize::binding::from_payload(&binding) {
            data.set(&field, value);
        }

        Ok(())
    }

    async fn update(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let kind = self.kind();
        Self::parse_identity(data)?;

        let current = normalize::binding::to_payload(&collect_fields(data, FIELDS))
            .context(InvalidConfigurationSnafu { kind })?;
        let prior: ConfigMap = FIELDS
            .iter()
            .filter_map(|field| {
                data.prior(field)
                    .map(|value| ((*field).to_owned(), value.clone()))
            })
            .collect();

        let changed = match normalize::binding::to_payload(&prior) {
            Ok(prior) => changed_field(&prior, &current),
            Err(_) => FIELDS.iter().find(|field| data.has_change(field)).copied(),
        };
        if let Some(field) = changed {
            return ImmutableFieldSnafu { kind, field }.fail();
        }

        self.read(client, data).await
    }

    async fn delete(&self, client: &Client, data: &mut dyn StateStore) -> Result<()> {
        let (key, vhost, object) = Self::parse_identity(data)?;

        remove(client, &object, Self::path(&vhost, &key)).await
    }
}

/// Returns the first field whose normalized value differs.
fn changed_field(
    (prior_target, prior_settings): &(BindingTarget, BindingSettings),
    (target, settings): &(BindingTarget, BindingSettings),
) -> Option<&'static str> {
    [
        ("source", prior_target.source == target.source),
        ("vhost", prior_target.vhost == target.vhost),
        ("destination", prior_target.destination == target.destination),
        (
            "destination_type",
            prior_target.destination_type == target.destination_type,
        ),
        ("routing_key", prior_settings.routing_key == settings.routing_key),
        ("arguments", prior_settings.arguments == settings.arguments),
    ]
    .into_iter()
    .find_map(|(field, unchanged)| (!unchanged).then_some(field))
}
