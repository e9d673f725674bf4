//! Configuration commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::output::{print_single, print_success, DetailRow};

use super::CommandContext;

/// Configuration commands.
#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    /// Print the effective configuration.
    Show,

    /// Set one configuration key (e.g. `retry.max_attempts 3`).
    Set {
        key: String,
        value: String,
    },

    /// Print the configuration directory.
    Path,
}

impl ConfigCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ConfigSubcommand::Show => {
                let c = &ctx.config;
                let rows = vec![
                    DetailRow::new("api_url", &c.api_url),
                    DetailRow::new("insecure", c.insecure),
                    DetailRow::new("timeout_secs", c.timeout_secs),
                    DetailRow::new("retry.max_attempts", c.retry.max_attempts),
                    DetailRow::new("retry.backoff_secs", c.retry.backoff_secs),
                    DetailRow::new("retry.confirmation_max_polls", c.retry.confirmation_max_polls),
                    DetailRow::new("retry.confirmation_poll_secs", c.retry.confirmation_poll_secs),
                    DetailRow::new(
                        "retry.confirmation_initial_delay_secs",
                        c.retry.confirmation_initial_delay_secs,
                    ),
                ];
                print_single(c, rows, ctx.format);
                Ok(())
            }
            ConfigSubcommand::Set { key, value } => {
                let mut config = ctx.config;
                config.set(&key, &value)?;
                let path = config.save()?;
                print_success(&format!("Set {key} = {value} in {}", path.display()));
                Ok(())
            }
            ConfigSubcommand::Path => {
                println!("{}", crate::config::config_dir()?.display());
                Ok(())
            }
        }
    }
}
