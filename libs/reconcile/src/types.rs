//! Descriptor, budget and outcome types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Operation, ReconcileError, RemoteError};

/// Target artifact for one reconciliation.
///
/// Owned by the caller and borrowed for the duration of a single
/// [`reconcile`](crate::reconcile) call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Unique key in the remote namespace.
    pub name: String,

    /// Opaque payload written on create and on every update.
    pub definition: String,

    /// Desired access-control policy.
    pub policy: AccessPolicy,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, definition: impl Into<String>, policy: AccessPolicy) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            policy,
        }
    }

    /// Digest of the definition payload.
    pub fn digest(&self) -> DefinitionDigest {
        DefinitionDigest::of(&self.definition)
    }
}

/// Sharing scope of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sharing {
    /// Private to the owner.
    User,
    /// Visible within the owning app.
    #[default]
    App,
    /// Visible everywhere.
    Global,
}

impl Sharing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sharing::User => "user",
            Sharing::App => "app",
            Sharing::Global => "global",
        }
    }
}

impl fmt::Display for Sharing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired access-control policy: owner plus read/write principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub owner: String,

    #[serde(default)]
    pub read: Vec<String>,

    #[serde(default)]
    pub write: Vec<String>,

    #[serde(default)]
    pub sharing: Sharing,
}

impl AccessPolicy {
    /// Policy owned by `owner` with no extra principals and app sharing.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            read: Vec::new(),
            write: Vec::new(),
            sharing: Sharing::default(),
        }
    }

    pub fn with_read<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read = principals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_write<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write = principals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sharing(mut self, sharing: Sharing) -> Self {
        self.sharing = sharing;
        self
    }
}

/// Digest of a definition payload, used to correlate log lines and reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefinitionDigest(String);

impl DefinitionDigest {
    /// Compute the digest of a definition.
    pub fn of(definition: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(definition.as_bytes());
        let result = hasher.finalize();
        Self(format!("sha256:{}", hex::encode(&result[..16]))) // First 16 bytes (128 bits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefinitionDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Retry and confirmation limits for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudget {
    /// Maximum calls per operation (probe, create or update). At least 1.
    pub max_attempts: u32,

    /// Fixed delay between attempts of the same operation.
    pub backoff_interval: Duration,

    /// Maximum existence checks after a successful create.
    pub confirmation_max_polls: u32,

    /// Delay between confirmation polls.
    pub confirmation_poll_interval: Duration,

    /// One-off delay between a successful create and the first poll.
    #[serde(default)]
    pub confirmation_initial_delay: Duration,
}

impl RetryBudget {
    pub fn new(
        max_attempts: u32,
        backoff_interval: Duration,
        confirmation_max_polls: u32,
        confirmation_poll_interval: Duration,
    ) -> Self {
        Self {
            max_attempts,
            backoff_interval,
            confirmation_max_polls,
            confirmation_poll_interval,
            confirmation_initial_delay: Duration::ZERO,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.confirmation_initial_delay = delay;
        self
    }

    /// Check the budget before any call is issued.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.max_attempts == 0 {
            return Err(ReconcileError::InvalidBudget(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_interval.is_zero() {
            return Err(ReconcileError::InvalidBudget(
                "backoff_interval must be greater than zero".to_string(),
            ));
        }
        if self.confirmation_poll_interval.is_zero() {
            return Err(ReconcileError::InvalidBudget(
                "confirmation_poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Terminal state of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    /// The resource was written and is visible to reads.
    Converged,
    /// The create succeeded but visibility could not be confirmed.
    CreatedButUnconfirmed,
    /// Nothing usable was written, or the caller cancelled.
    Failed,
}

impl FinalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalState::Converged => "converged",
            FinalState::CreatedButUnconfirmed => "created_but_unconfirmed",
            FinalState::Failed => "failed",
        }
    }
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which write the driver chose after probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePath {
    Created,
    Updated,
}

impl WritePath {
    pub fn operation(&self) -> Operation {
        match self {
            WritePath::Created => Operation::Create,
            WritePath::Updated => Operation::Update,
        }
    }
}

/// Result of the single permission-set attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyStatus {
    Applied,
    Failed(RemoteError),
    /// Not attempted because convergence failed.
    Skipped,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Applied => "applied",
            PolicyStatus::Failed(_) => "failed",
            PolicyStatus::Skipped => "skipped",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, PolicyStatus::Applied)
    }
}

/// Report returned by [`reconcile`](crate::reconcile). Never mutated after
/// it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub final_state: FinalState,

    /// Create or update calls issued, across all retries.
    pub attempts_used: u32,

    /// Diagnostic for anything short of `Converged`.
    pub last_error: Option<ReconcileError>,

    /// Write path taken; `None` if probing never concluded.
    pub path: Option<WritePath>,

    /// Read calls issued, initial probes plus confirmation polls.
    pub probes: u32,

    pub policy: PolicyStatus,

    pub definition_digest: DefinitionDigest,
}

impl ReconciliationOutcome {
    /// Reason string of `last_error`, if any.
    pub fn reason(&self) -> Option<&'static str> {
        self.last_error.as_ref().map(ReconcileError::reason)
    }

    /// Converged with the policy applied: nothing left for the caller to check.
    pub fn is_complete(&self) -> bool {
        self.final_state == FinalState::Converged && self.policy.is_applied()
    }
}
