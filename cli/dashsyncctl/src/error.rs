//! Error handling, hints and exit codes.

use colored::Colorize;
use dashsync_reconcile::{FinalState, ReconciliationOutcome};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Not authenticated. Pass --token, set DASHSYNC_TOKEN, or run `dashsync auth login`.")]
    NotAuthenticated,

    #[error("Unknown config key '{0}'")]
    UnknownConfigKey(String),

    #[error("Invalid value '{value}' for config key '{key}'")]
    InvalidConfigValue { key: String, value: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Converged with the policy applied.
    Success,
    /// Reconciliation failed, or the command errored.
    Failed,
    /// Written but not confirmed visible, or the policy was not applied.
    Incomplete,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failed => 1,
            ExitStatus::Incomplete => 2,
        }
    }

    pub fn from_outcome(outcome: &ReconciliationOutcome) -> Self {
        match outcome.final_state {
            FinalState::Failed => ExitStatus::Failed,
            _ if outcome.is_complete() => ExitStatus::Success,
            _ => ExitStatus::Incomplete,
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::NotAuthenticated => {
                eprintln!(
                    "\n{}",
                    "Hint: Create a token under Settings > Tokens in Splunk Web.".yellow()
                );
            }
            CliError::UnknownConfigKey(_) => {
                eprintln!(
                    "\n{} {}",
                    "Hint: Valid keys are".yellow(),
                    crate::config::CONFIG_KEYS.join(", ")
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use dashsync_reconcile::{DefinitionDigest, PolicyStatus, ReconcileError, RemoteError, WritePath};

    use super::*;

    fn outcome(final_state: FinalState, policy: PolicyStatus) -> ReconciliationOutcome {
        ReconciliationOutcome {
            final_state,
            attempts_used: 1,
            last_error: None,
            path: Some(WritePath::Created),
            probes: 2,
            policy,
            definition_digest: DefinitionDigest::of("<form/>"),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ExitStatus::from_outcome(&outcome(FinalState::Converged, PolicyStatus::Applied)).code(),
            0
        );
        assert_eq!(
            ExitStatus::from_outcome(&outcome(
                FinalState::Converged,
                PolicyStatus::Failed(RemoteError::permanent(Some(403), "forbidden"))
            ))
            .code(),
            2
        );
        assert_eq!(
            ExitStatus::from_outcome(&outcome(
                FinalState::CreatedButUnconfirmed,
                PolicyStatus::Applied
            ))
            .code(),
            2
        );

        let mut failed = outcome(FinalState::Failed, PolicyStatus::Skipped);
        failed.last_error = Some(ReconcileError::Cancelled);
        assert_eq!(ExitStatus::from_outcome(&failed).code(), 1);
    }
}
