//! The seam to the store that supplies desired state and persists results.
//!
//! The store hands out the desired configuration as [`ConfigValue`] trees,
//! keyed by top-level field, and accepts the normalized read-back under the
//! same keys. It also carries the identity string of the managed object.

use crate::value::{ConfigMap, ConfigValue};

/// Key/value access to the state of a single managed object.
pub trait StateStore: Send + Sync {
    /// The identity of the object, `None` if it does not (or no longer)
    /// exist.
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: Option<String>);

    /// Returns the current value of a top-level field.
    fn get(&self, key: &str) -> Option<&ConfigValue>;

    /// Replaces a top-level field with the value read back from the API.
    fn set(&mut self, key: &str, value: ConfigValue);

    /// Returns the value of a field as of the last reconciliation.
    fn prior(&self, key: &str) -> Option<&ConfigValue>;

    /// Returns true if the field differs from the last reconciliation.
    fn has_change(&self, key: &str) -> bool {
        self.prior(key) != self.get(key)
    }

    /// Returns the `(prior, current)` pair of a field.
    fn get_change(&self, key: &str) -> (Option<&ConfigValue>, Option<&ConfigValue>) {
        (self.prior(key), self.get(key))
    }
}

/// In-memory [`StateStore`].
///
/// Use [`ResourceData::new`] before a create, [`ResourceData::from_state`]
/// before a read or delete, and [`ResourceData::with_config`] to turn the
/// persisted state into the input of an update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceData {
    id: Option<String>,
    prior: ConfigMap,
    current: ConfigMap,
}

impl ResourceData {
    /// State of an object that is about to be created from `config`.
    pub fn new(config: ConfigMap) -> Self {
        Self {
            id: None,
            prior: ConfigMap::new(),
            current: config,
        }
    }

    /// State of an existing object, as persisted after the last
    /// reconciliation.
    pub fn from_state(id: impl Into<String>, state: ConfigMap) -> Self {
        Self {
            id: Some(id.into()),
            prior: state.clone(),
            current: state,
        }
    }

    /// Replaces the desired configuration, keeping id and prior state.
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.current = config;
        self
    }

    pub fn state(&self) -> &ConfigMap {
        &self.current
    }

    pub fn into_parts(self) -> (Option<String>, ConfigMap) {
        (self.id, self.current)
    }
}

impl StateStore for ResourceData {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.current.get(key)
    }

    fn set(&mut self, key: &str, value: ConfigValue) {
        self.current.insert(key.to_owned(), value);
    }

    fn prior(&self, key: &str) -> Option<&ConfigValue> {
        self.prior.get(key)
    }
}
