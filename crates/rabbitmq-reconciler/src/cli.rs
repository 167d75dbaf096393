//! Command line surface of the `rabbitmq-reconcile` binary.
//!
//! Every invocation runs a single operation against a single object. The
//! state of the object is exchanged as YAML: a previous run's output is the
//! `--state` input of the next one.
//!
//! ```text
//! rabbitmq-reconcile create --kind vhost --config vhost.yaml > state.yaml
//! rabbitmq-reconcile update --kind vhost --config vhost.yaml --state state.yaml
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    client::{Client, HttpTransport, HttpTransportError},
    config::ConnectionOptions,
    kind::ObjectKind,
    reconcile::{self, reconciler_for},
    state::ResourceData,
    value::ConfigMap,
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse {path:?} as YAML"))]
    ParseFile {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("the {operation} command requires --config"))]
    MissingConfig { operation: &'static str },

    #[snafu(display("the {operation} command requires --state"))]
    MissingState { operation: &'static str },

    #[snafu(display("the state in {path:?} has no id, the object does not exist"))]
    MissingStateId { path: PathBuf },

    #[snafu(display("failed to set up the management API client"))]
    BuildTransport { source: HttpTransportError },

    #[snafu(display("failed to {operation} {kind}"))]
    Reconcile {
        source: reconcile::Error,
        operation: &'static str,
        kind: ObjectKind,
    },

    #[snafu(display("failed to serialize the resulting state"))]
    SerializeState { source: serde_yaml::Error },
}

#[derive(Debug, Parser)]
#[command(
    name = "rabbitmq-reconcile",
    author,
    version,
    about = "Reconciles RabbitMQ management objects against a declared configuration"
)]
pub struct Opts {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Declare a new object and print its state.
    Create(ObjectArguments),

    /// Refresh the state of an existing object.
    Read(ObjectArguments),

    /// Apply a changed configuration to an existing object.
    Update(ObjectArguments),

    /// Delete an object. Succeeds if it is already gone.
    Delete(ObjectArguments),
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct ObjectArguments {
    /// Kind of the managed object.
    #[arg(long, short = 'k')]
    pub kind: ObjectKind,

    /// YAML file with the desired configuration, used by create and update.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// YAML file with the state printed by a previous run, used by read,
    /// update and delete.
    #[arg(long, short = 's', value_name = "FILE")]
    pub state: Option<PathBuf>,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub connection: ConnectionOptions,
}

/// The persisted state of one object, printed after every operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    /// `None` once the object does not exist anymore.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub state: ConfigMap,
}

impl ObjectState {
    pub fn to_yaml(&self) -> Result<String, Error> {
        serde_yaml::to_string(self).context(SerializeStateSnafu)
    }
}

impl Command {
    fn operation(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Read(_) => "read",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    fn arguments(&self) -> &ObjectArguments {
        match self {
            Self::Create(arguments)
            | Self::Read(arguments)
            | Self::Update(arguments)
            | Self::Delete(arguments) => arguments,
        }
    }

    /// Runs the command against the API described by its connection
    /// options.
    pub async fn run(&self) -> Result<ObjectState, Error> {
        let transport =
            HttpTransport::new(&self.arguments().connection).context(BuildTransportSnafu)?;
        self.run_with(&Client::new(Arc::new(transport))).await
    }

    /// Runs the command with an existing client.
    pub async fn run_with(&self, client: &Client) -> Result<ObjectState, Error> {
        let operation = self.operation();
        let arguments = self.arguments();
        let kind = arguments.kind;
        let reconciler = reconciler_for(kind);

        tracing::info!(%kind, operation, "running operation");
        let mut data = match self {
            Self::Create(_) => ResourceData::new(arguments.desired_config(operation).await?),
            Self::Read(_) | Self::Delete(_) => arguments.persisted_state(operation).await?,
            Self::Update(_) => arguments
                .persisted_state(operation)
                .await?
                .with_config(arguments.desired_config(operation).await?),
        };

        let result = match self {
            Self::Create(_) => reconciler.create(client, &mut data).await,
            Self::Read(_) => reconciler.read(client, &mut data).await,
            Self::Update(_) => reconciler.update(client, &mut data).await,
            Self::Delete(_) => reconciler.delete(client, &mut data).await,
        };
        result.context(ReconcileSnafu { operation, kind })?;

        if matches!(self, Self::Delete(_)) {
            return Ok(ObjectState::default());
        }

        let (id, state) = data.into_parts();
        Ok(ObjectState { id, state })
    }
}

impl ObjectArguments {
    async fn desired_config(&self, operation: &'static str) -> Result<ConfigMap, Error> {
        let path = self.config.as_deref().context(MissingConfigSnafu { operation })?;
        read_yaml(path).await
    }

    async fn persisted_state(&self, operation: &'static str) -> Result<ResourceData, Error> {
        let path = self.state.as_deref().context(MissingStateSnafu { operation })?;
        let ObjectState { id, state } = read_yaml(path).await?;
        let id = id.context(MissingStateIdSnafu { path })?;

        Ok(ResourceData::from_state(id, state))
    }
}

async fn read_yaml<T>(path: &Path) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned,
{
    let contents = tokio::fs::read_to_string(path)
        .await
        .context(ReadFileSnafu { path })?;
    serde_yaml::from_str(&contents).context(ParseFileSnafu { path })
}
