use std::io::Write as _;

use clap::Parser;
use rabbitmq_reconciler::{
    cli::{self, Opts},
    logging,
};
use snafu::{ResultExt, Snafu};

const APP_NAME: &str = "rabbitmq-reconcile";
const LOG_ENV: &str = "RABBITMQ_RECONCILE_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to run command"))]
    Run { source: cli::Error },

    #[snafu(display("failed to write the resulting state to stdout"))]
    WriteOutput { source: std::io::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();
    logging::initialize_logging(LOG_ENV, APP_NAME).context(InitializeLoggingSnafu)?;

    let output = opts.command.run().await.context(RunSnafu)?;
    let yaml = output.to_yaml().context(RunSnafu)?;

    std::io::stdout()
        .lock()
        .write_all(yaml.as_bytes())
        .context(WriteOutputSnafu)
}
