//! Convergence driver.
//!
//! The state machine is a tagged [`Phase`] advanced by pure `after_*`
//! functions. [`drive`] only performs the remote call for the current phase,
//! waits when a transition asks for it, and checks for cancellation.
//!
//! ```text
//! Probing ──Present──▶ Updating ──ok──▶ Done(Converged)
//!    │
//!    └──Absent──▶ Creating ──ok──▶ Refreshing ──▶ ConfirmingVisibility ──Present──▶ Done(Converged)
//!                                                          └──polls exhausted──▶ Done(Unconfirmed)
//! ```
//!
//! A 409 on a retried create means an earlier attempt landed even though its
//! response was lost, so the driver moves on to `Refreshing` instead of
//! failing.
//!
//! Every retry loop is bounded by the budget and ends in `Done(Failed(..))`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{ReconcileError, RemoteError};
use crate::probe::{probe, Existence};
use crate::remote::RemoteResource;
use crate::types::{ResourceDescriptor, RetryBudget, WritePath};

/// Driver state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Probing { attempt: u32 },
    Creating { attempt: u32 },
    Updating { attempt: u32 },
    Refreshing,
    ConfirmingVisibility { poll: u32 },
    Done(Verdict),
}

impl Phase {
    fn writing(path: WritePath, attempt: u32) -> Self {
        match path {
            WritePath::Created => Phase::Creating { attempt },
            WritePath::Updated => Phase::Updating { attempt },
        }
    }
}

/// Convergence verdict, before the policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Converged,
    Unconfirmed { polls: u32 },
    Failed(ReconcileError),
}

/// Next phase plus the wait to observe before entering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transition {
    pub next: Phase,
    pub wait: Duration,
}

impl Transition {
    fn now(next: Phase) -> Self {
        Self {
            next,
            wait: Duration::ZERO,
        }
    }

    fn after(wait: Duration, next: Phase) -> Self {
        Self { next, wait }
    }

    fn done(verdict: Verdict) -> Self {
        Self::now(Phase::Done(verdict))
    }
}

pub(crate) fn after_probe(attempt: u32, existence: Existence, budget: &RetryBudget) -> Transition {
    match existence {
        Existence::Present => Transition::now(Phase::Updating { attempt: 1 }),
        Existence::Absent => Transition::now(Phase::Creating { attempt: 1 }),
        Existence::Unknown(_) if attempt < budget.max_attempts => Transition::after(
            budget.backoff_interval,
            Phase::Probing {
                attempt: attempt + 1,
            },
        ),
        Existence::Unknown(cause) => Transition::done(Verdict::Failed(
            ReconcileError::ExistenceIndeterminate {
                attempts: attempt,
                cause,
            },
        )),
    }
}

pub(crate) fn after_write(
    path: WritePath,
    attempt: u32,
    result: Result<(), RemoteError>,
    budget: &RetryBudget,
) -> Transition {
    let operation = path.operation();
    match result {
        Ok(()) => match path {
            WritePath::Created => Transition::now(Phase::Refreshing),
            // Updates are taken as visible immediately; only creates re-probe.
            WritePath::Updated => Transition::done(Verdict::Converged),
        },
        Err(cause) if path == WritePath::Created && attempt > 1 && cause.is_conflict() => {
            Transition::now(Phase::Refreshing)
        }
        Err(cause) if !cause.is_transient() => {
            Transition::done(Verdict::Failed(ReconcileError::Rejected { operation, cause }))
        }
        Err(_) if attempt < budget.max_attempts => {
            Transition::after(budget.backoff_interval, Phase::writing(path, attempt + 1))
        }
        Err(cause) => Transition::done(Verdict::Failed(ReconcileError::BudgetExhausted {
            operation,
            attempts: attempt,
            cause,
        })),
    }
}

pub(crate) fn after_refresh(budget: &RetryBudget) -> Transition {
    if budget.confirmation_max_polls == 0 {
        return Transition::done(Verdict::Unconfirmed { polls: 0 });
    }
    Transition::after(
        budget.confirmation_initial_delay,
        Phase::ConfirmingVisibility { poll: 1 },
    )
}

pub(crate) fn after_poll(poll: u32, existence: Existence, budget: &RetryBudget) -> Transition {
    if existence.is_present() {
        return Transition::done(Verdict::Converged);
    }
    if poll < budget.confirmation_max_polls {
        return Transition::after(
            budget.confirmation_poll_interval,
            Phase::ConfirmingVisibility { poll: poll + 1 },
        );
    }
    Transition::done(Verdict::Unconfirmed { polls: poll })
}

/// Counters accumulated while driving.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub attempts_used: u32,
    pub probes: u32,
    pub path: Option<WritePath>,
}

/// Run the state machine until it reaches `Done`.
pub(crate) async fn drive<R>(
    remote: &R,
    descriptor: &ResourceDescriptor,
    budget: &RetryBudget,
    cancel: &mut CancelSignal,
    tally: &mut Tally,
) -> Verdict
where
    R: RemoteResource + ?Sized,
{
    let name = descriptor.name.as_str();
    let mut phase = Phase::Probing { attempt: 1 };

    loop {
        if cancel.is_cancelled() {
            info!(resource = %name, "Reconciliation cancelled");
            return Verdict::Failed(ReconcileError::Cancelled);
        }

        let transition = match phase {
            Phase::Done(verdict) => return verdict,
            Phase::Probing { attempt } => {
                tally.probes += 1;
                let existence = probe(remote, name).await;
                if let Existence::Unknown(e) = &existence {
                    warn!(
                        resource = %name,
                        attempt,
                        max_attempts = budget.max_attempts,
                        error = %e,
                        "Existence probe inconclusive"
                    );
                }
                after_probe(attempt, existence, budget)
            }
            Phase::Creating { attempt } => {
                write(remote, descriptor, WritePath::Created, attempt, budget, tally).await
            }
            Phase::Updating { attempt } => {
                write(remote, descriptor, WritePath::Updated, attempt, budget, tally).await
            }
            Phase::Refreshing => {
                if let Err(e) = remote.refresh().await {
                    warn!(resource = %name, error = %e, "Cache refresh failed, continuing");
                }
                after_refresh(budget)
            }
            Phase::ConfirmingVisibility { poll } => {
                tally.probes += 1;
                let existence = probe(remote, name).await;
                debug!(
                    resource = %name,
                    poll,
                    max_polls = budget.confirmation_max_polls,
                    visible = existence.is_present(),
                    "Confirmation poll"
                );
                after_poll(poll, existence, budget)
            }
        };

        if !transition.wait.is_zero() && !matches!(transition.next, Phase::Done(_)) {
            debug!(
                resource = %name,
                wait_ms = transition.wait.as_millis() as u64,
                "Waiting before next step"
            );
            if pause(transition.wait, cancel).await.is_err() {
                info!(resource = %name, "Reconciliation cancelled during wait");
                return Verdict::Failed(ReconcileError::Cancelled);
            }
        }

        phase = transition.next;
    }
}

async fn write<R>(
    remote: &R,
    descriptor: &ResourceDescriptor,
    path: WritePath,
    attempt: u32,
    budget: &RetryBudget,
    tally: &mut Tally,
) -> Transition
where
    R: RemoteResource + ?Sized,
{
    let name = descriptor.name.as_str();
    let operation = path.operation();

    tally.attempts_used += 1;
    tally.path = Some(path);

    let result = match path {
        WritePath::Created => remote.create(name, &descriptor.definition).await,
        WritePath::Updated => remote.update(name, &descriptor.definition).await,
    };

    match &result {
        Ok(()) => info!(resource = %name, %operation, attempt, "Write succeeded"),
        Err(e) if path == WritePath::Created && attempt > 1 && e.is_conflict() => info!(
            resource = %name,
            attempt,
            "Create conflicts with an earlier attempt, treating it as written"
        ),
        Err(e) => warn!(
            resource = %name,
            %operation,
            attempt,
            max_attempts = budget.max_attempts,
            retryable = e.is_transient(),
            error = %e,
            "Write attempt failed"
        ),
    }

    after_write(path, attempt, result, budget)
}

/// Sleep for `delay` unless cancellation arrives first.
async fn pause(delay: Duration, cancel: &mut CancelSignal) -> Result<(), ReconcileError> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
