//! Test doubles for dashsync.
//!
//! [`ScriptedRemote`] is an in-memory [`RemoteResource`] with two layers of
//! behaviour per operation:
//!
//! 1. Scripted responses, consumed in order.
//! 2. Once a script is empty: a sticky failure if one was configured,
//!    otherwise a consistent key/value store (reads see creates immediately,
//!    a second create of the same name is rejected with 409).
//!
//! Every call is recorded so tests can assert on exact call sequences.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use dashsync_reconcile::{AccessPolicy, Operation, ReadStatus, RemoteError, RemoteResource};
use tracing::debug;

/// A call observed by [`ScriptedRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Read(String),
    Create { name: String, definition: String },
    Update { name: String, definition: String },
    SetPolicy { name: String, policy: AccessPolicy },
    Refresh,
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Read(_) => Operation::Probe,
            Call::Create { .. } => Operation::Create,
            Call::Update { .. } => Operation::Update,
            Call::SetPolicy { .. } => Operation::SetPolicy,
            Call::Refresh => Operation::Refresh,
        }
    }
}

#[derive(Default)]
struct State {
    reads: VecDeque<Result<ReadStatus, RemoteError>>,
    creates: VecDeque<Result<(), RemoteError>>,
    updates: VecDeque<Result<(), RemoteError>>,
    policies: VecDeque<Result<(), RemoteError>>,
    refreshes: VecDeque<Result<(), RemoteError>>,
    sticky: HashMap<Operation, RemoteError>,
    lost_create_acks: u32,
    store: BTreeMap<String, String>,
    applied: BTreeMap<String, AccessPolicy>,
    calls: Vec<Call>,
}

impl State {
    fn sticky(&self, operation: Operation) -> Option<RemoteError> {
        self.sticky.get(&operation).cloned()
    }
}

/// Scriptable in-memory remote.
#[derive(Default)]
pub struct ScriptedRemote {
    state: Mutex<State>,
}

impl ScriptedRemote {
    /// An empty remote with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing resource.
    pub fn with_resource(self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.state().store.insert(name.into(), definition.into());
        self
    }

    pub fn script_reads<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = Result<ReadStatus, RemoteError>>,
    {
        self.state().reads.extend(responses);
        self
    }

    pub fn script_creates<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = Result<(), RemoteError>>,
    {
        self.state().creates.extend(responses);
        self
    }

    pub fn script_updates<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = Result<(), RemoteError>>,
    {
        self.state().updates.extend(responses);
        self
    }

    pub fn script_policies<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = Result<(), RemoteError>>,
    {
        self.state().policies.extend(responses);
        self
    }

    pub fn script_refreshes<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = Result<(), RemoteError>>,
    {
        self.state().refreshes.extend(responses);
        self
    }

    /// The next `count` unscripted creates commit to the store but reply
    /// with a timeout, as when the response is lost after the server acted.
    pub fn lose_create_acks(self, count: u32) -> Self {
        self.state().lost_create_acks = count;
        self
    }

    /// Fail every unscripted call of `operation` with `error`.
    pub fn always_fail(self, operation: Operation, error: RemoteError) -> Self {
        self.state().sticky.insert(operation, error);
        self
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of calls observed for `operation`.
    pub fn count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Stored definition for `name`.
    pub fn definition(&self, name: &str) -> Option<String> {
        self.state().store.get(name).cloned()
    }

    /// Last policy successfully applied to `name`.
    pub fn policy(&self, name: &str) -> Option<AccessPolicy> {
        self.state().applied.get(name).cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(name: &str) -> RemoteError {
    RemoteError::permanent(Some(404), format!("{name} not found"))
}

#[async_trait]
impl RemoteResource for ScriptedRemote {
    async fn read(&self, name: &str) -> Result<ReadStatus, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Read(name.to_string()));

        let result = match state.reads.pop_front() {
            Some(scripted) => scripted,
            None => match state.sticky(Operation::Probe) {
                Some(e) => Err(e),
                None => Ok(match state.store.get(name) {
                    Some(definition) => ReadStatus::Found {
                        body: Some(definition.clone()),
                    },
                    None => ReadStatus::NotFound,
                }),
            },
        };

        debug!(resource = %name, ?result, "[SCRIPTED] read");
        result
    }

    async fn create(&self, name: &str, definition: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Create {
            name: name.to_string(),
            definition: definition.to_string(),
        });

        let result = match state.creates.pop_front() {
            Some(scripted) => scripted,
            None => match state.sticky(Operation::Create) {
                Some(e) => Err(e),
                None if state.store.contains_key(name) => Err(RemoteError::permanent(
                    Some(409),
                    format!("{name} already exists"),
                )),
                None if state.lost_create_acks > 0 => {
                    state.lost_create_acks -= 1;
                    state.store.insert(name.to_string(), definition.to_string());
                    Err(RemoteError::transient("operation timed out"))
                }
                None => Ok(()),
            },
        };

        if result.is_ok() {
            state.store.insert(name.to_string(), definition.to_string());
        }

        debug!(resource = %name, ?result, "[SCRIPTED] create");
        result
    }

    async fn update(&self, name: &str, definition: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Update {
            name: name.to_string(),
            definition: definition.to_string(),
        });

        let result = match state.updates.pop_front() {
            Some(scripted) => scripted,
            None => match state.sticky(Operation::Update) {
                Some(e) => Err(e),
                None if state.store.contains_key(name) => Ok(()),
                None => Err(not_found(name)),
            },
        };

        if result.is_ok() {
            state.store.insert(name.to_string(), definition.to_string());
        }

        debug!(resource = %name, ?result, "[SCRIPTED] update");
        result
    }

    async fn set_policy(&self, name: &str, policy: &AccessPolicy) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::SetPolicy {
            name: name.to_string(),
            policy: policy.clone(),
        });

        let result = match state.policies.pop_front() {
            Some(scripted) => scripted,
            None => match state.sticky(Operation::SetPolicy) {
                Some(e) => Err(e),
                None if state.store.contains_key(name) => Ok(()),
                None => Err(not_found(name)),
            },
        };

        if result.is_ok() {
            state.applied.insert(name.to_string(), policy.clone());
        }

        debug!(resource = %name, ?result, "[SCRIPTED] set_policy");
        result
    }

    async fn refresh(&self) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Refresh);

        let result = match state.refreshes.pop_front() {
            Some(scripted) => scripted,
            None => match state.sticky(Operation::Refresh) {
                Some(e) => Err(e),
                None => Ok(()),
            },
        };

        debug!(?result, "[SCRIPTED] refresh");
        result
    }
}
