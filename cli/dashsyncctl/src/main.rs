//! dashsync - reconcile Splunk dashboards from manifests.
//!
//! Exit codes: 0 converged with ACL applied, 1 failed, 2 written but not
//! confirmed visible or ACL not applied.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;
mod manifest;
mod output;

use commands::Cli;
use error::ExitStatus;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let status = match cli.run().await {
        Ok(status) => status,
        Err(e) => {
            error::print_error(&e);
            ExitStatus::Failed
        }
    };

    std::process::exit(status.code());
}

/// Log to stderr so stdout stays parseable in json mode.
fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}
