use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

/// The kinds of management-plane objects that can be reconciled.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    EnumIter,
    EnumString,
    strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ObjectKind {
    Exchange,
    Queue,
    Binding,
    Policy,
    OperatorPolicy,
    Shovel,
    Vhost,
    User,
    Permissions,
    TopicPermissions,
    FederationUpstream,
}

impl ObjectKind {
    /// Returns true if objects of this kind live inside a vhost.
    pub fn is_vhost_scoped(self) -> bool {
        !matches!(self, Self::Vhost | Self::User)
    }
}

/// A reference to a single object, used to give errors and log lines
/// enough context to find the object again.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
    pub vhost: Option<String>,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, name: impl Into<String>, vhost: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            vhost: Some(vhost.into()),
        }
    }

    /// A reference to an object that is not scoped to a vhost.
    pub fn global(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            vhost: None,
        }
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.kind, self.name)?;
        if let Some(vhost) = &self.vhost {
            write!(f, " in vhost {vhost:?}")?;
        }
        Ok(())
    }
}
