//! CLI commands.

mod apply;
mod auth;
mod config;
mod probe;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dashsync_splunk::{Auth, ViewsClient, ViewsClientConfig};

use crate::config::{Config, Credentials};
use crate::error::{CliError, ExitStatus};
use crate::output::OutputFormat;

/// dashsync - Create or update Splunk dashboards idempotently.
#[derive(Debug, Parser)]
#[command(name = "dashsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Views collection URL.
    #[arg(long, global = true, env = "DASHSYNC_API_URL")]
    api_url: Option<String>,

    /// Bearer token.
    #[arg(long, global = true, env = "DASHSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Username for basic authentication (password from DASHSYNC_PASSWORD).
    #[arg(long, global = true, conflicts_with = "token")]
    username: Option<String>,

    #[arg(long, global = true, env = "DASHSYNC_PASSWORD", hide = true, hide_env_values = true)]
    password: Option<String>,

    /// Accept invalid TLS certificates.
    #[arg(long, global = true)]
    insecure: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, env = "DASHSYNC_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile a dashboard manifest against the server.
    Apply(apply::ApplyCommand),

    /// Check whether a dashboard exists.
    Probe(probe::ProbeCommand),

    /// Manage stored credentials.
    Auth(auth::AuthCommand),

    /// Show or change CLI configuration.
    Config(config::ConfigCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<ExitStatus> {
        let format = OutputFormat::parse(&self.format);

        let config = Config::load()?;
        let credentials = Credentials::load()?;

        let ctx = CommandContext {
            config,
            credentials,
            format,
            api_url: self.api_url,
            token: self.token,
            username: self.username,
            password: self.password,
            insecure: self.insecure,
        };

        match self.command {
            Commands::Apply(cmd) => cmd.run(ctx).await,
            Commands::Probe(cmd) => cmd.run(ctx).await,
            Commands::Auth(cmd) => cmd.run(ctx).map(|_| ExitStatus::Success),
            Commands::Config(cmd) => cmd.run(ctx).map(|_| ExitStatus::Success),
            Commands::Version => {
                println!("dashsync {}", env!("CARGO_PKG_VERSION"));
                Ok(ExitStatus::Success)
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub credentials: Option<Credentials>,
    pub format: OutputFormat,
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
}

impl CommandContext {
    /// Views URL, preferring flag or environment over config.
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(&self.config.api_url)
    }

    /// Resolve credentials: flag/env token, then basic auth, then stored token.
    pub fn auth(&self) -> Result<Auth, CliError> {
        if let Some(token) = &self.token {
            return Ok(Auth::Bearer(token.clone()));
        }
        if let Some(username) = &self.username {
            return Ok(Auth::Basic {
                username: username.clone(),
                password: self.password.clone().unwrap_or_default(),
            });
        }
        self.credentials
            .as_ref()
            .map(|c| Auth::Bearer(c.token.clone()))
            .ok_or(CliError::NotAuthenticated)
    }

    /// Get an authenticated views client.
    pub fn client(&self) -> Result<ViewsClient> {
        let config = ViewsClientConfig::new(self.api_url())
            .with_auth(self.auth()?)
            .with_insecure(self.insecure || self.config.insecure)
            .with_timeout(self.config.timeout());
        Ok(ViewsClient::new(config)?)
    }
}
