//! Idempotent reconciliation of one named remote resource.
//!
//! Drives a resource on a remote management API to a desired definition and
//! access policy when the API only offers `read`/`create`/`update` calls and
//! newly created resources become readable after a delay.
//!
//! One call to [`reconcile`] runs three phases in order:
//!
//! - **Probe**: classify the resource as present, absent or unknown.
//! - **Converge**: update a present resource, or create an absent one and
//!   poll until it is visible. Bounded retries with a fixed backoff.
//! - **Apply policy**: one permission-set call after any non-failed
//!   convergence.
//!
//! # Invariants
//!
//! - No more than `max_attempts` calls per operation, and no more than
//!   `confirmation_max_polls` reads while waiting for visibility
//! - An inconclusive probe never leads to a create
//! - Updates are not re-probed; creates always are
//! - Reconciliations of the same name must be serialized by the caller

use tracing::info;

pub mod cancel;
mod driver;
mod error;
mod policy;
mod probe;
mod remote;
mod types;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::{Operation, ReconcileError, RemoteError};
pub use policy::apply_policy;
pub use probe::{probe, Existence};
pub use remote::{ReadStatus, RemoteResource};
pub use types::*;

use driver::{drive, Tally, Verdict};

/// Reconcile `descriptor` against `remote`.
///
/// Always returns an outcome; remote errors are folded into retry decisions
/// and only surface through [`ReconciliationOutcome::last_error`].
pub async fn reconcile<R>(
    remote: &R,
    descriptor: &ResourceDescriptor,
    budget: &RetryBudget,
    mut cancel: CancelSignal,
) -> ReconciliationOutcome
where
    R: RemoteResource + ?Sized,
{
    let definition_digest = descriptor.digest();
    let mut tally = Tally::default();

    if let Err(e) = budget.validate() {
        return ReconciliationOutcome {
            final_state: FinalState::Failed,
            attempts_used: 0,
            last_error: Some(e),
            path: None,
            probes: 0,
            policy: PolicyStatus::Skipped,
            definition_digest,
        };
    }

    info!(
        resource = %descriptor.name,
        digest = %definition_digest,
        max_attempts = budget.max_attempts,
        confirmation_max_polls = budget.confirmation_max_polls,
        "Starting reconciliation"
    );

    let verdict = drive(remote, descriptor, budget, &mut cancel, &mut tally).await;

    let (final_state, last_error) = match verdict {
        Verdict::Converged => (FinalState::Converged, None),
        Verdict::Unconfirmed { polls } => (
            FinalState::CreatedButUnconfirmed,
            Some(ReconcileError::VisibilityUnconfirmed { polls }),
        ),
        Verdict::Failed(e) => (FinalState::Failed, Some(e)),
    };

    // The write may have landed even when visibility was not confirmed.
    let policy = match final_state {
        FinalState::Failed => PolicyStatus::Skipped,
        _ => apply_policy(remote, &descriptor.name, &descriptor.policy).await,
    };

    info!(
        resource = %descriptor.name,
        final_state = %final_state,
        attempts_used = tally.attempts_used,
        probes = tally.probes,
        policy = policy.as_str(),
        "Reconciliation finished"
    );

    ReconciliationOutcome {
        final_state,
        attempts_used: tally.attempts_used,
        last_error,
        path: tally.path,
        probes: tally.probes,
        policy,
        definition_digest,
    }
}
