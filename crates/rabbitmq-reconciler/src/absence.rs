//! Classification of remote call outcomes.
//!
//! Reconcilers never inspect status codes themselves. They ask this module
//! whether a result means "done", "gone", or "failed", and act on that.

use http::StatusCode;

use crate::client;

/// The outcome of a remote call, as far as reconciliation is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Classification {
    /// The call reached the API and succeeded (2xx).
    Success,

    /// The remote object does not exist (404). On read this clears local
    /// state, on delete it counts as success.
    NotFound,

    /// The API answered with any other non-2xx status.
    SoftError,

    /// The call did not produce a usable response at all: connection
    /// failures, timeouts, undecodable bodies.
    TransportError,
}

impl Classification {
    pub fn is_not_found(self) -> bool {
        self == Self::NotFound
    }
}

/// Classifies a status code returned by the management API.
pub fn classify_status(status: StatusCode) -> Classification {
    if status.is_success() {
        Classification::Success
    } else if status == StatusCode::NOT_FOUND {
        Classification::NotFound
    } else {
        Classification::SoftError
    }
}

/// Classifies a failed client call.
pub fn classify_error(error: &client::Error) -> Classification {
    match error {
        client::Error::UnexpectedStatus { status, .. } => classify_status(*status),
        client::Error::Transport { .. }
        | client::Error::SerializeBody { .. }
        | client::Error::DeserializeBody { .. } => Classification::TransportError,
    }
}

/// Returns true if the passed result failed because the remote object is
/// absent.
pub fn is_not_found<T>(result: &Result<T, client::Error>) -> bool {
    matches!(result, Err(error) if classify_error(error).is_not_found())
}

#[cfg(test)]
mod tests {
    use http::Method;
    use rstest::rstest;

    use super::*;
    use crate::client::{ApiPath, TransportError};

    #[rstest]
    #[case(StatusCode::OK, Classification::Success)]
    #[case(StatusCode::CREATED, Classification::Success)]
    #[case(StatusCode::NO_CONTENT, Classification::Success)]
    #[case(StatusCode::NOT_FOUND, Classification::NotFound)]
    #[case(StatusCode::BAD_REQUEST, Classification::SoftError)]
    #[case(StatusCode::UNAUTHORIZED, Classification::SoftError)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, Classification::SoftError)]
    fn status_classification(#[case] status: StatusCode, #[case] expected: Classification) {
        assert_eq!(classify_status(status), expected);
    }

    #[test]
    fn transport_failures_are_never_absence() {
        let error = client::Error::Transport {
            source: TransportError::new("connection refused"),
            method: Method::GET,
            path: ApiPath::vhost("/"),
        };

        assert_eq!(classify_error(&error), Classification::TransportError);
        assert!(!is_not_found::<()>(&Err(error)));
    }

    #[test]
    fn missing_object_is_absence() {
        let result: Result<(), _> = Err(client::Error::UnexpectedStatus {
            method: Method::GET,
            path: ApiPath::vhost("gone"),
            status: StatusCode::NOT_FOUND,
        });

        assert!(is_not_found(&result));
    }
}
