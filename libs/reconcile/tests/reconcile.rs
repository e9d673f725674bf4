//! Integration tests for the reconciliation flow.
//!
//! Drives `reconcile` against `ScriptedRemote` on a paused tokio clock, so
//! backoff and confirmation waits complete instantly but stay measurable.

use std::sync::Arc;
use std::time::Duration;

use dashsync_reconcile::{
    cancel, reconcile, AccessPolicy, CancelSignal, FinalState, Operation, PolicyStatus,
    ReadStatus, ReconcileError, RemoteError, ResourceDescriptor, RetryBudget, Sharing, WritePath,
};
use dashsync_testing::{Call, ScriptedRemote};
use tokio::time::Instant;

const NAME: &str = "automated_dashboard_1";

fn descriptor() -> ResourceDescriptor {
    let policy = AccessPolicy::new("admin")
        .with_read(["user", "admin"])
        .with_write(["admin"])
        .with_sharing(Sharing::App);
    ResourceDescriptor::new(NAME, "<form version=\"1.1\"><label>Ops</label></form>", policy)
}

fn budget(max_attempts: u32, max_polls: u32) -> RetryBudget {
    RetryBudget::new(
        max_attempts,
        Duration::from_secs(5),
        max_polls,
        Duration::from_secs(5),
    )
}

fn transient() -> RemoteError {
    RemoteError::transient("connection reset by peer")
}

fn found() -> Result<ReadStatus, RemoteError> {
    Ok(ReadStatus::Found { body: None })
}

fn not_found() -> Result<ReadStatus, RemoteError> {
    Ok(ReadStatus::NotFound)
}

#[tokio::test(start_paused = true)]
async fn test_absent_resource_is_created_never_updated() {
    let remote = ScriptedRemote::new();

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(outcome.path, Some(WritePath::Created));
    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(outcome.last_error, None);
    assert_eq!(remote.count(Operation::Create), 1);
    assert_eq!(remote.count(Operation::Update), 0);
    assert!(outcome.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_present_resource_is_updated_without_confirmation() {
    let remote = ScriptedRemote::new().with_resource(NAME, "<old/>");

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(outcome.path, Some(WritePath::Updated));
    assert_eq!(remote.count(Operation::Create), 0);
    assert_eq!(remote.count(Operation::Update), 1);
    // Only the initial probe: the update path never polls or refreshes.
    assert_eq!(outcome.probes, 1);
    assert_eq!(remote.count(Operation::Probe), 1);
    assert_eq!(remote.count(Operation::Refresh), 0);
    assert_eq!(remote.definition(NAME), Some(descriptor().definition));
}

#[tokio::test(start_paused = true)]
async fn test_second_reconcile_takes_update_path() {
    let remote = ScriptedRemote::new();
    let desc = descriptor();

    let first = reconcile(&remote, &desc, &budget(3, 2), CancelSignal::never()).await;
    assert_eq!(first.final_state, FinalState::Converged);
    assert_eq!(first.path, Some(WritePath::Created));

    let second = reconcile(&remote, &desc, &budget(3, 2), CancelSignal::never()).await;
    assert_eq!(second.final_state, FinalState::Converged);
    assert_eq!(second.path, Some(WritePath::Updated));

    assert_eq!(remote.count(Operation::Create), 1);
    assert_eq!(remote.count(Operation::Update), 1);
    assert_eq!(first.definition_digest, second.definition_digest);
}

#[tokio::test(start_paused = true)]
async fn test_create_retries_until_success() {
    let remote = ScriptedRemote::new().script_creates([Err(transient()), Err(transient()), Ok(())]);
    let start = Instant::now();

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(remote.count(Operation::Create), 3);
    // Two backoffs between three attempts, none before or after.
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_update_retries_until_success() {
    let remote = ScriptedRemote::new()
        .with_resource(NAME, "<old/>")
        .script_updates([Err(transient()), Err(transient()), Ok(())]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(outcome.path, Some(WritePath::Updated));
}

#[tokio::test(start_paused = true)]
async fn test_create_retry_exhaustion() {
    let remote = ScriptedRemote::new().always_fail(Operation::Create, transient());
    let start = Instant::now();

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Failed);
    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(outcome.reason(), Some("budget exhausted"));
    assert_eq!(
        outcome.last_error,
        Some(ReconcileError::BudgetExhausted {
            operation: Operation::Create,
            attempts: 3,
            cause: transient(),
        })
    );
    assert_eq!(remote.count(Operation::Create), 3);
    // Nothing after the last failed attempt: no refresh, no polls, no policy.
    assert_eq!(
        remote.calls().last(),
        Some(&Call::Create {
            name: NAME.to_string(),
            definition: descriptor().definition,
        })
    );
    assert_eq!(outcome.policy, PolicyStatus::Skipped);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_create_that_landed_despite_timeout_converges() {
    // The first create commits but its response is lost; the retry gets 409.
    let remote = ScriptedRemote::new().lose_create_acks(1);
    let start = Instant::now();

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(outcome.path, Some(WritePath::Created));
    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(outcome.last_error, None);
    assert_eq!(outcome.policy, PolicyStatus::Applied);
    assert_eq!(remote.count(Operation::Create), 2);
    assert_eq!(remote.count(Operation::Update), 0);
    assert_eq!(remote.count(Operation::Refresh), 1);
    assert_eq!(remote.definition(NAME), Some(descriptor().definition));
    assert_eq!(remote.policy(NAME), Some(descriptor().policy));
    // One backoff before the retry, then the first poll sees the resource.
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_update_retry_exhaustion() {
    let remote = ScriptedRemote::new()
        .with_resource(NAME, "<old/>")
        .always_fail(Operation::Update, transient());

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Failed);
    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(remote.count(Operation::Update), 3);
    assert_eq!(remote.count(Operation::SetPolicy), 0);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_confirmed_after_second_poll() {
    // Initial probe and first poll miss the new resource; the second poll sees it.
    let remote = ScriptedRemote::new().script_reads([not_found(), not_found(), found()]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(remote.count(Operation::Probe), 3);
    assert_eq!(outcome.probes, 3);
    assert_eq!(outcome.policy, PolicyStatus::Applied);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_timeout_still_applies_policy() {
    let remote = ScriptedRemote::new().script_reads([not_found(), not_found(), not_found()]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::CreatedButUnconfirmed);
    assert_eq!(outcome.reason(), Some("visibility unconfirmed"));
    assert_eq!(outcome.probes, 3);
    assert_eq!(remote.count(Operation::SetPolicy), 1);
    assert_eq!(outcome.policy, PolicyStatus::Applied);
    assert!(!outcome.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_zero_polls_skips_confirmation() {
    let remote = ScriptedRemote::new();

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 0), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::CreatedButUnconfirmed);
    assert_eq!(outcome.probes, 1);
    assert_eq!(remote.count(Operation::SetPolicy), 1);
}

#[tokio::test(start_paused = true)]
async fn test_indeterminate_existence_never_writes() {
    let remote = ScriptedRemote::new().always_fail(Operation::Probe, transient());

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Failed);
    assert_eq!(outcome.reason(), Some("existence indeterminate"));
    assert_eq!(outcome.attempts_used, 0);
    assert_eq!(outcome.path, None);
    assert_eq!(remote.count(Operation::Probe), 3);
    assert_eq!(remote.count(Operation::Create), 0);
    assert_eq!(remote.count(Operation::Update), 0);
    assert_eq!(remote.count(Operation::SetPolicy), 0);
}

#[tokio::test(start_paused = true)]
async fn test_probe_recovers_within_budget() {
    let remote = ScriptedRemote::new()
        .with_resource(NAME, "<old/>")
        .script_reads([Err(transient()), found()]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(outcome.path, Some(WritePath::Updated));
    assert_eq!(outcome.probes, 2);
    assert_eq!(outcome.attempts_used, 1);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_rejection_is_not_retried() {
    let rejected = RemoteError::permanent(Some(400), "malformed eai:data");
    let remote = ScriptedRemote::new().script_creates([Err(rejected.clone())]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Failed);
    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(
        outcome.last_error,
        Some(ReconcileError::Rejected {
            operation: Operation::Create,
            cause: rejected,
        })
    );
    assert_eq!(remote.count(Operation::Create), 1);
}

#[tokio::test(start_paused = true)]
async fn test_policy_failure_keeps_convergence_verdict() {
    let denied = RemoteError::permanent(Some(403), "insufficient permissions");
    let remote = ScriptedRemote::new()
        .with_resource(NAME, "<old/>")
        .script_policies([Err(denied.clone())]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(outcome.last_error, None);
    assert_eq!(outcome.policy, PolicyStatus::Failed(denied));
    // Single attempt, and the update stays in place.
    assert_eq!(remote.count(Operation::SetPolicy), 1);
    assert_eq!(remote.definition(NAME), Some(descriptor().definition));
}

#[tokio::test(start_paused = true)]
async fn test_transient_policy_failure_is_not_retried() {
    let remote = ScriptedRemote::new().script_policies([Err(transient())]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(outcome.policy, PolicyStatus::Failed(transient()));
    assert_eq!(remote.count(Operation::SetPolicy), 1);
}

#[tokio::test(start_paused = true)]
async fn test_policy_is_last_call() {
    let remote = ScriptedRemote::new();
    let desc = descriptor();

    reconcile(&remote, &desc, &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(
        remote.calls(),
        vec![
            Call::Read(NAME.to_string()),
            Call::Create {
                name: NAME.to_string(),
                definition: desc.definition.clone(),
            },
            Call::Refresh,
            Call::Read(NAME.to_string()),
            Call::SetPolicy {
                name: NAME.to_string(),
                policy: desc.policy.clone(),
            },
        ]
    );
    assert_eq!(remote.policy(NAME), Some(desc.policy));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_does_not_change_outcome() {
    let remote = ScriptedRemote::new().script_refreshes([Err(transient())]);

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(remote.count(Operation::Refresh), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initial_delay_precedes_first_poll() {
    let remote = ScriptedRemote::new();
    let budget = budget(3, 2).with_initial_delay(Duration::from_secs(10));
    let start = Instant::now();

    let outcome = reconcile(&remote, &descriptor(), &budget, CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_budget_issues_no_calls() {
    let remote = ScriptedRemote::new();

    let outcome = reconcile(&remote, &descriptor(), &budget(0, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Failed);
    assert_eq!(outcome.reason(), Some("invalid budget"));
    assert!(remote.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let remote = Arc::new(ScriptedRemote::new().always_fail(Operation::Create, transient()));
    let (handle, signal) = cancel::channel();
    let start = Instant::now();

    let task = tokio::spawn({
        let remote = Arc::clone(&remote);
        async move { reconcile(&*remote, &descriptor(), &budget(3, 2), signal).await }
    });

    // First create fails at t=0; cancel halfway through the 5s backoff.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    handle.cancel();

    let outcome = task.await.unwrap();

    assert_eq!(outcome.final_state, FinalState::Failed);
    assert_eq!(outcome.reason(), Some("cancelled"));
    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(remote.count(Operation::Create), 1);
    assert_eq!(remote.count(Operation::SetPolicy), 0);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_confirmation_poll() {
    let remote = Arc::new(ScriptedRemote::new().script_reads([not_found(), not_found(), not_found()]));
    let (handle, signal) = cancel::channel();

    let task = tokio::spawn({
        let remote = Arc::clone(&remote);
        async move { reconcile(&*remote, &descriptor(), &budget(3, 3), signal).await }
    });

    // Poll 1 runs at t=0; poll 2 would run at t=5.
    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.cancel();

    let outcome = task.await.unwrap();

    assert_eq!(outcome.final_state, FinalState::Failed);
    assert_eq!(outcome.reason(), Some("cancelled"));
    assert_eq!(outcome.path, Some(WritePath::Created));
    assert_eq!(remote.count(Operation::Probe), 2);
    assert_eq!(remote.count(Operation::SetPolicy), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start_issues_no_calls() {
    let remote = ScriptedRemote::new();
    let (handle, signal) = cancel::channel();
    handle.cancel();

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), signal).await;

    assert_eq!(outcome.reason(), Some("cancelled"));
    assert!(remote.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconciles_through_shared_handle() {
    let remote: Arc<ScriptedRemote> = Arc::new(ScriptedRemote::new());

    let outcome = reconcile(&remote, &descriptor(), &budget(3, 2), CancelSignal::never()).await;

    assert_eq!(outcome.final_state, FinalState::Converged);
    assert_eq!(remote.count(Operation::Create), 1);
}
