//! Existence prober.

use tracing::debug;

use crate::error::RemoteError;
use crate::remote::{ReadStatus, RemoteResource};

/// Classification of one read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Present,
    Absent,
    /// The read was inconclusive. Never grounds for a create.
    Unknown(RemoteError),
}

impl Existence {
    pub fn is_present(&self) -> bool {
        matches!(self, Existence::Present)
    }
}

/// Issue one read for `name` and classify the answer.
pub async fn probe<R>(remote: &R, name: &str) -> Existence
where
    R: RemoteResource + ?Sized,
{
    match remote.read(name).await {
        Ok(ReadStatus::Found { .. }) => {
            debug!(resource = %name, "Probe: present");
            Existence::Present
        }
        Ok(ReadStatus::NotFound) => {
            debug!(resource = %name, "Probe: absent");
            Existence::Absent
        }
        Err(e) => {
            debug!(resource = %name, error = %e, "Probe: inconclusive");
            Existence::Unknown(e)
        }
    }
}
