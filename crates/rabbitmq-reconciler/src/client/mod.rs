//! Access to the RabbitMQ management API.
//!
//! The reconcilers never talk HTTP directly. They are handed a [`Client`],
//! which wraps a [`Transport`] and provides typed get/declare/create/delete
//! operations. [`HttpTransport`] is the production transport, tests plug in
//! an in-memory broker.

use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu};

mod http_transport;

pub use http_transport::{Error as HttpTransportError, HttpTransport};

pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to send {method} request to {path}"))]
    Transport {
        source: TransportError,
        method: Method,
        path: ApiPath,
    },

    #[snafu(display("management API answered {method} {path} with {status}"))]
    UnexpectedStatus {
        method: Method,
        path: ApiPath,
        status: StatusCode,
    },

    #[snafu(display("failed to serialize request body for {path}"))]
    SerializeBody {
        source: serde_json::Error,
        path: ApiPath,
    },

    #[snafu(display("failed to deserialize response body of {path}"))]
    DeserializeBody {
        source: serde_json::Error,
        path: ApiPath,
    },
}

impl Error {
    /// Returns the remote status if the call reached the API.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A failure of the transport itself: connection refused, timeout, TLS, ...
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("{message}"))]
    Failed { message: String },

    #[snafu(display("{message}"))]
    Caused { message: String, source: BoxedError },
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        Self::Caused {
            message: message.into(),
            source: source.into(),
        }
    }
}

/// Path of a management API resource below `/api`, as individual segments.
///
/// Segments are percent-encoded by the transport, so a vhost named `/` is
/// addressed as `%2F`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiPath(Vec<String>);

impl ApiPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn exchange(vhost: &str, name: &str) -> Self {
        Self::new(["exchanges", vhost, name])
    }

    pub fn queue(vhost: &str, name: &str) -> Self {
        Self::new(["queues", vhost, name])
    }

    pub fn policy(vhost: &str, name: &str) -> Self {
        Self::new(["policies", vhost, name])
    }

    pub fn operator_policy(vhost: &str, name: &str) -> Self {
        Self::new(["operator-policies", vhost, name])
    }

    /// Runtime parameters, used by shovels and federation upstreams.
    pub fn parameter(component: &str, vhost: &str, name: &str) -> Self {
        Self::new(["parameters", component, vhost, name])
    }

    pub fn vhost(name: &str) -> Self {
        Self::new(["vhosts", name])
    }

    pub fn user(name: &str) -> Self {
        Self::new(["users", name])
    }

    pub fn permissions(vhost: &str, user: &str) -> Self {
        Self::new(["permissions", vhost, user])
    }

    pub fn topic_permissions(vhost: &str, user: &str) -> Self {
        Self::new(["topic-permissions", vhost, user])
    }

    /// The collection of bindings between a source exchange and a destination.
    ///
    /// `destination_type` is the single-letter form used by the API, `q` or `e`.
    pub fn bindings(vhost: &str, source: &str, destination_type: &str, destination: &str) -> Self {
        Self::new(["bindings", vhost, "e", source, destination_type, destination])
    }
}

impl Display for ApiPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/api/{}", self.0.join("/"))
    }
}

/// A request handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: ApiPath,
    pub body: Option<serde_json::Value>,
}

/// The response of a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,

    /// The `Location` header, returned when a binding is created.
    pub location: Option<String>,
}

impl ApiResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: serde_json::Value::Null,
            location: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Executes single request-response exchanges against the management API.
///
/// Implementations must not retry. A failed exchange is reported as
/// [`TransportError`], any status (including 4xx and 5xx) as a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// This `Client` can be used to access the management API.
/// It wraps a [`Transport`] and provides typed operations on top of it.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Retrieves a single object. Any non-2xx status is an
    /// [`Error::UnexpectedStatus`].
    pub async fn get<T>(&self, path: ApiPath) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(Method::GET, path.clone(), None).await?;
        ensure_success(&Method::GET, &path, &response)?;

        serde_json::from_value(response.body).context(DeserializeBodySnafu { path })
    }

    /// Creates or replaces an object with `PUT`.
    ///
    /// The response is returned regardless of its status, interpreting it is
    /// up to the caller.
    pub async fn declare<B>(&self, path: ApiPath, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).context(SerializeBodySnafu { path: path.clone() })?;
        self.execute(Method::PUT, path, Some(body)).await
    }

    /// Creates an object below a collection with `POST`.
    pub async fn create<B>(&self, path: ApiPath, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).context(SerializeBodySnafu { path: path.clone() })?;
        self.execute(Method::POST, path, Some(body)).await
    }

    /// Deletes an object. The response is returned regardless of its status.
    pub async fn delete(&self, path: ApiPath) -> Result<ApiResponse> {
        self.execute(Method::DELETE, path, None).await
    }

    async fn execute(
        &self,
        method: Method,
        path: ApiPath,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        let request = ApiRequest {
            method: method.clone(),
            path: path.clone(),
            body,
        };

        self.transport
            .execute(request)
            .await
            .context(TransportSnafu { method, path })
    }
}

fn ensure_success(method: &Method, path: &ApiPath, response: &ApiResponse) -> Result<()> {
    if response.status.is_success() {
        return Ok(());
    }

    UnexpectedStatusSnafu {
        method: method.clone(),
        path: path.clone(),
        status: response.status,
    }
    .fail()
}
