//! Error types for remote calls and reconciliation outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by a [`RemoteResource`](crate::RemoteResource) capability.
///
/// The split drives retry decisions: transient errors are retried within the
/// attempt budget, permanent errors end the operation immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network failure, timeout, throttling or a server-side error.
    #[error("transient: {0}")]
    Transient(String),

    /// The remote rejected the request and repeating it will not help.
    #[error("permanent{}: {message}", status_suffix(.status))]
    Permanent {
        status: Option<u16>,
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl RemoteError {
    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create a permanent error with an optional status code.
    pub fn permanent(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the call may succeed when repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns true if the remote reported that the resource already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Permanent { status: Some(409), .. })
    }
}

/// Remote operation issued by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Probe,
    Create,
    Update,
    SetPolicy,
    Refresh,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Probe => "probe",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::SetPolicy => "set_policy",
            Operation::Refresh => "refresh",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a reconciliation did not fully converge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// Every probe attempt was inconclusive; nothing was written.
    #[error("existence indeterminate after {attempts} probe attempt(s): {cause}")]
    ExistenceIndeterminate { attempts: u32, cause: RemoteError },

    /// The remote permanently rejected a write.
    #[error("{operation} rejected: {cause}")]
    Rejected {
        operation: Operation,
        cause: RemoteError,
    },

    /// A write kept failing until the attempt budget ran out.
    #[error("{operation} failed after {attempts} attempt(s): {cause}")]
    BudgetExhausted {
        operation: Operation,
        attempts: u32,
        cause: RemoteError,
    },

    /// The create succeeded but reads never observed the resource.
    #[error("resource not visible after {polls} confirmation poll(s)")]
    VisibilityUnconfirmed { polls: u32 },

    /// The caller cancelled the reconciliation.
    #[error("reconciliation cancelled")]
    Cancelled,

    /// The retry budget failed validation; no call was issued.
    #[error("invalid retry budget: {0}")]
    InvalidBudget(String),
}

impl ReconcileError {
    /// Short, stable reason string for reports and assertions.
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::ExistenceIndeterminate { .. } => "existence indeterminate",
            ReconcileError::Rejected { .. } => "rejected",
            ReconcileError::BudgetExhausted { .. } => "budget exhausted",
            ReconcileError::VisibilityUnconfirmed { .. } => "visibility unconfirmed",
            ReconcileError::Cancelled => "cancelled",
            ReconcileError::InvalidBudget(_) => "invalid budget",
        }
    }

    /// Returns true if this error came from a caller-requested abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcileError::Cancelled)
    }
}
