//! Probe command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dashsync_reconcile::{probe, Existence};
use serde::Serialize;

use crate::error::ExitStatus;
use crate::output::{print_single, DetailRow, OutputFormat};

use super::CommandContext;

/// Check whether a dashboard exists.
#[derive(Debug, Args)]
pub struct ProbeCommand {
    /// Dashboard (view) name.
    pub name: String,
}

#[derive(Debug, Serialize)]
struct ProbeResult {
    name: String,
    existence: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProbeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<ExitStatus> {
        let client = ctx.client()?;
        let existence = probe(&client, &self.name).await;

        let (label, error) = match &existence {
            Existence::Present => ("present", None),
            Existence::Absent => ("absent", None),
            Existence::Unknown(e) => ("unknown", Some(e.to_string())),
        };
        let result = ProbeResult {
            name: self.name,
            existence: label,
            error,
        };

        match ctx.format {
            OutputFormat::Json => print_single(&result, Vec::new(), ctx.format),
            OutputFormat::Table => {
                let colored = match existence {
                    Existence::Present => label.green(),
                    Existence::Absent => label.yellow(),
                    Existence::Unknown(_) => label.red(),
                };
                println!("{}: {}", result.name, colored.bold());
                if let Some(e) = &result.error {
                    print_single(&result, vec![DetailRow::new("Error", e)], ctx.format);
                }
            }
        }

        Ok(match existence {
            Existence::Unknown(_) => ExitStatus::Failed,
            _ => ExitStatus::Success,
        })
    }
}
