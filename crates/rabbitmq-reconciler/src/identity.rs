use std::{fmt::Display, str::FromStr};

use snafu::{OptionExt, Snafu};

/// Separates the name and the vhost part of an identity string.
pub const IDENTITY_SEPARATOR: char = '@';

/// The error type for identity parsing operations.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum IdentityError {
    /// Indicates that the identity string does not contain the `@` separator
    /// and therefore cannot be split into name and vhost.
    #[snafu(display("identity {input:?} is malformed, expected the format <name>@<vhost>"))]
    MissingSeparator { input: String },
}

/// The composite identity of a vhost-scoped object.
///
/// The string form is `<name>@<vhost>`. For permission kinds the name part
/// holds the user. Neither part should contain an `@`, otherwise encoding is
/// ambiguous: [`Identity::from_str`] always splits on the *first* separator,
/// so an `@` inside the name ends up in the vhost on decode.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    name: String,
    vhost: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, vhost: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vhost: vhost.into(),
        }
    }

    /// Encodes `name` and `vhost` into the identity string without
    /// constructing an [`Identity`] first.
    ///
    /// ```
    /// use rabbitmq_reconciler::identity::Identity;
    ///
    /// assert_eq!(Identity::encode("test", "/"), "test@/");
    /// ```
    pub fn encode(name: &str, vhost: &str) -> String {
        format!("{name}{IDENTITY_SEPARATOR}{vhost}")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vhost(&self) -> &str {
        &self.vhost
    }

    pub fn into_parts(self) -> (String, String) {
        (self.name, self.vhost)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (name, vhost) =
            input
                .split_once(IDENTITY_SEPARATOR)
                .context(MissingSeparatorSnafu {
                    input: input.to_owned(),
                })?;

        Ok(Self::new(name, vhost))
    }
}

impl TryFrom<&str> for Identity {
    type Error = IdentityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{IDENTITY_SEPARATOR}{}", self.name, self.vhost)
    }
}

impl From<&Identity> for String {
    fn from(value: &Identity) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("test", "test")]
    #[case("test", "/")]
    #[case("my-policy", "team/a")]
    #[case("", "")]
    #[case("queue.with.dots", "%2F")]
    fn decode_is_left_inverse_of_encode(#[case] name: &str, #[case] vhost: &str) {
        let encoded = Identity::encode(name, vhost);
        let identity = Identity::from_str(&encoded).unwrap();

        assert_eq!(identity.name(), name);
        assert_eq!(identity.vhost(), vhost);
        assert_eq!(identity.to_string(), encoded);
    }

    #[test]
    fn decode_splits_on_first_separator() {
        let identity = Identity::from_str("name@vhost@with-at").unwrap();

        assert_eq!(identity.name(), "name");
        assert_eq!(identity.vhost(), "vhost@with-at");
    }

    #[rstest]
    #[case("no-separator")]
    #[case("")]
    fn malformed_identity(#[case] input: &str) {
        let err = Identity::from_str(input).unwrap_err();
        assert_eq!(
            err,
            IdentityError::MissingSeparator {
                input: input.to_owned()
            }
        );
    }
}
