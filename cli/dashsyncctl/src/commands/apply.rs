//! Apply command.
//!
//! `dashsync apply` loads a dashboard manifest, reconciles it against the
//! views endpoint, and exits 0 only when the dashboard converged and its ACL
//! was applied.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dashsync_reconcile::{cancel, reconcile, RetryBudget};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ExitStatus;
use crate::manifest::{load_manifest, LoadedManifest};
use crate::output::{print_outcome, print_single, DetailRow, OutcomeView};

use super::CommandContext;

/// Reconcile a dashboard manifest.
#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Manifest file path (TOML).
    #[arg(long, short = 'f', value_name = "PATH")]
    pub manifest: PathBuf,

    /// Print the plan without making any API calls.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct ApplyPlan {
    dry_run: bool,
    manifest_path: String,
    api_url: String,
    name: String,
    kind: &'static str,
    definition_digest: String,
    definition_bytes: usize,
    owner: String,
    sharing: String,
    read: Vec<String>,
    write: Vec<String>,
    max_attempts: u32,
    backoff_secs: u64,
    confirmation_max_polls: u32,
    confirmation_poll_secs: u64,
    confirmation_initial_delay_secs: u64,
}

impl ApplyPlan {
    fn new(ctx: &CommandContext, loaded: &LoadedManifest, budget: &RetryBudget) -> Self {
        let descriptor = &loaded.descriptor;
        Self {
            dry_run: true,
            manifest_path: loaded.path.display().to_string(),
            api_url: ctx.api_url().to_string(),
            name: descriptor.name.clone(),
            kind: loaded.kind,
            definition_digest: descriptor.digest().to_string(),
            definition_bytes: descriptor.definition.len(),
            owner: descriptor.policy.owner.clone(),
            sharing: descriptor.policy.sharing.to_string(),
            read: descriptor.policy.read.clone(),
            write: descriptor.policy.write.clone(),
            max_attempts: budget.max_attempts,
            backoff_secs: budget.backoff_interval.as_secs(),
            confirmation_max_polls: budget.confirmation_max_polls,
            confirmation_poll_secs: budget.confirmation_poll_interval.as_secs(),
            confirmation_initial_delay_secs: budget.confirmation_initial_delay.as_secs(),
        }
    }

    fn rows(&self) -> Vec<DetailRow> {
        vec![
            DetailRow::new("Manifest", &self.manifest_path),
            DetailRow::new("Endpoint", &self.api_url),
            DetailRow::new("Dashboard", &self.name),
            DetailRow::new("Kind", self.kind),
            DetailRow::new("Digest", &self.definition_digest),
            DetailRow::new("Size", format!("{} bytes", self.definition_bytes)),
            DetailRow::new("Owner", &self.owner),
            DetailRow::new("Sharing", &self.sharing),
            DetailRow::new("Read", self.read.join(",")),
            DetailRow::new("Write", self.write.join(",")),
            DetailRow::new(
                "Retries",
                format!("{} x {}s", self.max_attempts, self.backoff_secs),
            ),
            DetailRow::new(
                "Confirmation",
                format!(
                    "{} x {}s after {}s",
                    self.confirmation_max_polls,
                    self.confirmation_poll_secs,
                    self.confirmation_initial_delay_secs
                ),
            ),
        ]
    }
}

impl ApplyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<ExitStatus> {
        let loaded = load_manifest(&self.manifest)?;
        let budget = ctx.config.retry.to_budget();

        if self.dry_run {
            let plan = ApplyPlan::new(&ctx, &loaded, &budget);
            print_single(&plan, plan.rows(), ctx.format);
            return Ok(ExitStatus::Success);
        }

        let client = ctx.client()?;
        let descriptor = loaded.descriptor;

        let (handle, signal) = cancel::channel();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling reconciliation");
                handle.cancel();
            }
        });

        info!(
            manifest = %self.manifest.display(),
            resource = %descriptor.name,
            url = %client.base_url(),
            "Applying dashboard"
        );
        let outcome = reconcile(&client, &descriptor, &budget, signal).await;
        interrupt.abort();

        print_outcome(&OutcomeView::new(&descriptor.name, &outcome), ctx.format);
        Ok(ExitStatus::from_outcome(&outcome))
    }
}
