use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::LOCATION;
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::{
    client::{ApiPath, ApiRequest, ApiResponse, Transport, TransportError},
    config::{self, ConnectionOptions},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid connection options"))]
    InvalidOptions { source: config::Error },

    #[snafu(display("failed to read {path:?}"))]
    ReadPem {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to load CA certificate from {path:?}"))]
    LoadCaCertificate {
        source: reqwest::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to load client identity from {cert:?} and {key:?}"))]
    LoadClientIdentity {
        source: reqwest::Error,
        cert: PathBuf,
        key: PathBuf,
    },

    #[snafu(display("failed to configure proxy {proxy}"))]
    ConfigureProxy { source: reqwest::Error, proxy: Url },

    #[snafu(display("failed to build HTTP client"))]
    BuildClient { source: reqwest::Error },
}

/// [`Transport`] that talks to a real management API over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(options: &ConnectionOptions) -> Result<Self, Error> {
        options.validate().context(InvalidOptionsSnafu)?;

        let mut base_url = options.endpoint_url().context(InvalidOptionsSnafu)?;
        // Joined segments are appended after `api`, a trailing slash of the
        // endpoint must not produce an empty segment
        if let Ok(mut segments) = base_url.path_segments_mut() {
            segments.pop_if_empty().push("api");
        }

        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout())
            .danger_accept_invalid_certs(options.insecure);

        if let Some(path) = &options.cacert_file {
            let pem = read_pem(path)?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .context(LoadCaCertificateSnafu { path })?;
            builder = builder.add_root_certificate(certificate);
        }

        if let (Some(cert), Some(key)) = (&options.clientcert_file, &options.clientkey_file) {
            let mut pem = read_pem(cert)?;
            pem.extend(read_pem(key)?);
            let identity = reqwest::Identity::from_pem(&pem)
                .context(LoadClientIdentitySnafu { cert, key })?;
            builder = builder.identity(identity);
        }

        if let Some(proxy) = options.proxy_url().context(InvalidOptionsSnafu)? {
            let configured =
                reqwest::Proxy::all(proxy.clone()).context(ConfigureProxySnafu { proxy })?;
            builder = builder.proxy(configured);
        }

        Ok(Self {
            http: builder.build().context(BuildClientSnafu)?,
            base_url,
            username: options.username.clone(),
            password: options.password.clone(),
        })
    }

    /// Builds the request URL, percent-encoding every path segment on its own.
    fn url(&self, path: &ApiPath) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(path.segments());
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        tracing::trace!(method = %request.method, %url, "sending request");

        let mut builder = self
            .http
            .request(request.method, url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|source| {
            TransportError::with_source("request to the management API failed", source)
        })?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await.map_err(|source| {
            TransportError::with_source("failed to read response body", source)
        })?;

        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            // Error pages of proxies are not JSON, keep them readable
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        tracing::trace!(%status, ?location, "received response");

        Ok(ApiResponse {
            status,
            body,
            location,
        })
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).context(ReadPemSnafu { path })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("http://localhost:15672", "http://localhost:15672/api/exchanges/%2F/amq.direct")]
    #[case("http://localhost:15672/", "http://localhost:15672/api/exchanges/%2F/amq.direct")]
    #[case(
        "https://broker.example.com/rabbitmq/",
        "https://broker.example.com/rabbitmq/api/exchanges/%2F/amq.direct"
    )]
    fn url_encodes_segments(#[case] endpoint: &str, #[case] expected: &str) {
        let transport =
            HttpTransport::new(&ConnectionOptions::new(endpoint, "guest", "guest")).unwrap();

        let url = transport.url(&ApiPath::exchange("/", "amq.direct"));
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn missing_ca_file_is_reported() {
        let options = ConnectionOptions {
            cacert_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..ConnectionOptions::new("https://localhost:15671", "guest", "guest")
        };

        assert!(matches!(
            HttpTransport::new(&options),
            Err(Error::ReadPem { .. })
        ));
    }
}
