//! Connection options for the management API.
//!
//! Every option can be passed as a CLI flag or as an environment variable,
//! so that the same settings work for the binary and for embedders that
//! build a [`ConnectionOptions`] by hand.

use std::{path::PathBuf, time::Duration};

use snafu::{ResultExt, Snafu, ensure};
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("the option {option:?} must not be empty"))]
    EmptyOption { option: &'static str },

    #[snafu(display("failed to parse management endpoint {endpoint:?}"))]
    ParseEndpoint {
        source: url::ParseError,
        endpoint: String,
    },

    #[snafu(display("failed to parse proxy URL {proxy:?}"))]
    ParseProxy {
        source: url::ParseError,
        proxy: String,
    },

    #[snafu(display("a client certificate requires a client key and vice versa"))]
    IncompleteClientIdentity,
}

/// Options to reach and authenticate against the management API.
#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
#[command(next_help_heading = "Connection Options")]
pub struct ConnectionOptions {
    /// Base URL of the management API, for example `http://localhost:15672`.
    #[arg(long, env = "RABBITMQ_ENDPOINT")]
    pub endpoint: String,

    /// Username used for HTTP basic authentication.
    #[arg(long, env = "RABBITMQ_USERNAME")]
    pub username: String,

    /// Password used for HTTP basic authentication.
    #[arg(long, env = "RABBITMQ_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Skip verification of the server certificate.
    #[arg(long, env = "RABBITMQ_INSECURE")]
    pub insecure: bool,

    /// PEM file with an additional CA certificate to trust.
    #[arg(long, value_name = "FILE", env = "RABBITMQ_CACERT")]
    pub cacert_file: Option<PathBuf>,

    /// PEM file with the client certificate for mutual TLS.
    #[arg(long, value_name = "FILE", env = "RABBITMQ_CLIENTCERT")]
    pub clientcert_file: Option<PathBuf>,

    /// PEM file with the private key belonging to the client certificate.
    #[arg(long, value_name = "FILE", env = "RABBITMQ_CLIENTKEY")]
    pub clientkey_file: Option<PathBuf>,

    /// Proxy used for all requests. Without it, the proxy environment
    /// variables (`HTTPS_PROXY`, ...) are honoured.
    #[arg(long, env = "RABBITMQ_PROXY")]
    pub proxy: Option<String>,

    /// Timeout of a single request in seconds.
    #[arg(long, env = "RABBITMQ_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u64,
}

impl ConnectionOptions {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            insecure: false,
            cacert_file: None,
            clientcert_file: None,
            clientkey_file: None,
            proxy: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Checks the options for consistency without touching the filesystem
    /// or the network.
    pub fn validate(&self) -> Result<(), Error> {
        for (option, value) in [
            ("endpoint", &self.endpoint),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            ensure!(!value.is_empty(), EmptyOptionSnafu { option });
        }

        self.endpoint_url()?;
        self.proxy_url()?;

        ensure!(
            self.clientcert_file.is_some() == self.clientkey_file.is_some(),
            IncompleteClientIdentitySnafu
        );

        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, Error> {
        Url::parse(&self.endpoint).context(ParseEndpointSnafu {
            endpoint: &self.endpoint,
        })
    }

    pub fn proxy_url(&self) -> Result<Option<Url>, Error> {
        self.proxy
            .as_deref()
            .map(|proxy| Url::parse(proxy).context(ParseProxySnafu { proxy }))
            .transpose()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        connection: ConnectionOptions,
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
    }

    #[test]
    fn parse_flags() {
        let cli = Cli::parse_from([
            "rabbitmq-reconcile",
            "--endpoint",
            "http://localhost:15672",
            "--username",
            "guest",
            "--password",
            "guest",
            "--insecure",
            "--timeout-seconds",
            "5",
        ]);

        assert!(cli.connection.insecure);
        assert_eq!(cli.connection.timeout(), Duration::from_secs(5));
        assert!(cli.connection.validate().is_ok());
    }

    #[rstest]
    #[case("", "guest", "guest")]
    #[case("http://localhost:15672", "", "guest")]
    #[case("http://localhost:15672", "guest", "")]
    fn empty_options_are_rejected(
        #[case] endpoint: &str,
        #[case] username: &str,
        #[case] password: &str,
    ) {
        let options = ConnectionOptions::new(endpoint, username, password);
        let err = options.validate().unwrap_err();

        assert!(matches!(err, Error::EmptyOption { .. }));
    }

    #[test]
    fn client_certificate_requires_key() {
        let options = ConnectionOptions {
            clientcert_file: Some(PathBuf::from("/tmp/client.pem")),
            ..ConnectionOptions::new("https://localhost:15671", "guest", "guest")
        };

        assert!(matches!(
            options.validate(),
            Err(Error::IncompleteClientIdentity)
        ));
    }

    #[test]
    fn invalid_proxy_is_rejected() {
        let options = ConnectionOptions {
            proxy: Some("not a url".to_owned()),
            ..ConnectionOptions::new("http://localhost:15672", "guest", "guest")
        };

        assert!(matches!(options.validate(), Err(Error::ParseProxy { .. })));
    }
}
