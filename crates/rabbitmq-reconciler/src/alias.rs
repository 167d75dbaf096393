//! Resolution of deprecated field names and mutually exclusive fields.
//!
//! Some kinds accept a legacy and a current name for the same property. Only
//! one of them may be set. Validation rejects configurations that set both
//! before any normalization happens, so the normalizers only ever see one
//! populated field of each pair and never apply a silent precedence.

use snafu::{Snafu, ensure};

use crate::value::{ConfigMap, ConfigValue};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum AliasError {
    #[snafu(display("fields {first:?} and {second:?} cannot be set at the same time"))]
    Conflict {
        first: &'static str,
        second: &'static str,
    },
}

/// A deprecated field name and the name that replaces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldAlias {
    pub legacy: &'static str,
    pub current: &'static str,
}

impl FieldAlias {
    pub const fn new(legacy: &'static str, current: &'static str) -> Self {
        Self { legacy, current }
    }

    /// Returns the populated field of this pair and its value.
    ///
    /// Callers must run [`validate`] first. If both were populated anyway,
    /// the current name is returned.
    pub fn resolve<'a>(&self, map: &'a ConfigMap) -> Option<(&'static str, &'a ConfigValue)> {
        if let Some(value) = map.get(self.current) {
            return Some((self.current, value));
        }

        map.get(self.legacy).map(|value| {
            tracing::warn!(
                field = self.legacy,
                replacement = self.current,
                "field is deprecated, use the replacement instead"
            );
            (self.legacy, value)
        })
    }

    /// Picks the name a value read back from the API is projected under.
    ///
    /// The legacy name is kept if the prior local state used it, so that a
    /// configuration still relying on the deprecated name does not drift.
    pub fn projected_name(&self, prior: Option<&ConfigMap>) -> &'static str {
        match prior {
            Some(prior) if prior.contains_key(self.legacy) && !prior.contains_key(self.current) => {
                self.legacy
            }
            _ => self.current,
        }
    }
}

/// Checks that at most one field of each given pair is populated.
///
/// Both alias pairs and plain mutually exclusive fields (like a source
/// exchange and a source queue) are expressed as `(first, second)` pairs.
pub fn validate(map: &ConfigMap, exclusive: &[(&'static str, &'static str)]) -> Result<(), AliasError> {
    for (first, second) in exclusive {
        ensure!(
            !(map.contains_key(*first) && map.contains_key(*second)),
            ConflictSnafu {
                first: *first,
                second: *second
            }
        );
    }

    Ok(())
}

/// Returns the alias pairs as `(legacy, current)` tuples for [`validate`].
pub fn exclusive_pairs(aliases: &[FieldAlias]) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
    aliases.iter().map(|alias| (alias.legacy, alias.current))
}
