//! Policy applier.

use tracing::{info, warn};

use crate::remote::RemoteResource;
use crate::types::{AccessPolicy, PolicyStatus};

/// Apply `policy` to `name` with a single attempt.
///
/// A failure is reported in the returned status and never undoes a write that
/// already happened.
pub async fn apply_policy<R>(remote: &R, name: &str, policy: &AccessPolicy) -> PolicyStatus
where
    R: RemoteResource + ?Sized,
{
    match remote.set_policy(name, policy).await {
        Ok(()) => {
            info!(
                resource = %name,
                owner = %policy.owner,
                sharing = %policy.sharing,
                read = ?policy.read,
                write = ?policy.write,
                "Access policy applied"
            );
            PolicyStatus::Applied
        }
        Err(e) => {
            warn!(resource = %name, error = %e, "Failed to apply access policy");
            PolicyStatus::Failed(e)
        }
    }
}
