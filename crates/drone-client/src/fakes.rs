//! In-memory fake for the CI client (testing only)
//!
//! `ScriptedClient` answers from queued responses and records every call so
//! tests can assert exactly which triggers and cancels were issued.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::build::{Build, BuildStatus};
use crate::client::{BuildParams, CiClient, ClientResult};
use crate::error::ClientError;

/// A call observed by [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LastBuild {
        repo: String,
        branch: String,
    },
    Build {
        repo: String,
        number: u64,
    },
    ListBuilds {
        repo: String,
    },
    Restart {
        repo: String,
        number: u64,
        params: BuildParams,
    },
    Promote {
        repo: String,
        number: u64,
        environment: String,
        params: BuildParams,
    },
    Cancel {
        repo: String,
        number: u64,
    },
}

impl Call {
    /// Restart or promote.
    pub fn is_trigger(&self) -> bool {
        matches!(self, Call::Restart { .. } | Call::Promote { .. })
    }
}

/// Queue of responses. The last one repeats once the others are used up.
#[derive(Debug)]
struct Script<T> {
    queue: VecDeque<ClientResult<T>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Script {
            queue: VecDeque::new(),
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, response: ClientResult<T>) {
        self.queue.push_back(response);
    }

    fn next(&mut self, what: &str) -> ClientResult<T> {
        if self.queue.len() > 1 {
            self.queue
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::NotFound(what.to_string())))
        } else {
            self.queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ClientError::NotFound(what.to_string())))
        }
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    last_builds: Script<Build>,
    builds: HashMap<u64, Script<Build>>,
    list: Script<Vec<Build>>,
    triggers: Script<Build>,
    cancel: Option<ClientError>,
    next_number: u64,
    calls: Vec<Call>,
}

/// Scripted [`CiClient`] backed by response queues.
///
/// Unscripted lookups answer `NotFound`. Unscripted triggers succeed and
/// return a pending build numbered from 100 upwards.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    state: Mutex<ScriptState>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `last_build`.
    pub fn push_last_build(&self, response: ClientResult<Build>) -> &Self {
        self.state.lock().unwrap().last_builds.push(response);
        self
    }

    /// Queue a response for `build(number)`.
    pub fn push_build(&self, number: u64, response: ClientResult<Build>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .builds
            .entry(number)
            .or_default()
            .push(response);
        self
    }

    /// Queue a response for `list_builds`.
    pub fn push_list(&self, response: ClientResult<Vec<Build>>) -> &Self {
        self.state.lock().unwrap().list.push(response);
        self
    }

    /// Queue a response for the next restart or promote.
    pub fn push_trigger(&self, response: ClientResult<Build>) -> &Self {
        self.state.lock().unwrap().triggers.push(response);
        self
    }

    /// Make `cancel_build` fail.
    pub fn fail_cancel(&self, err: ClientError) -> &Self {
        self.state.lock().unwrap().cancel = Some(err);
        self
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Restart and promote calls only.
    pub fn triggers(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_trigger).collect()
    }

    /// Numbers of cancelled builds.
    pub fn cancels(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Cancel { number, .. } => Some(number),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn trigger(&self, what: &str) -> ClientResult<Build> {
        let mut state = self.state.lock().unwrap();
        if !state.triggers.queue.is_empty() {
            return state.triggers.next(what);
        }
        state.next_number = state.next_number.max(99) + 1;
        Ok(Build::new(state.next_number, "", BuildStatus::Pending))
    }
}

fn repo(owner: &str, name: &str) -> String {
    format!("{owner}/{name}")
}

#[async_trait]
impl CiClient for ScriptedClient {
    async fn last_build(&self, owner: &str, name: &str, branch: &str) -> ClientResult<Build> {
        self.record(Call::LastBuild {
            repo: repo(owner, name),
            branch: branch.to_string(),
        });
        self.state
            .lock()
            .unwrap()
            .last_builds
            .next(&repo(owner, name))
    }

    async fn build(&self, owner: &str, name: &str, number: u64) -> ClientResult<Build> {
        self.record(Call::Build {
            repo: repo(owner, name),
            number,
        });
        let what = format!("build {number}");
        let mut state = self.state.lock().unwrap();
        match state.builds.get_mut(&number) {
            Some(script) => script.next(&what),
            None => Err(ClientError::NotFound(what)),
        }
    }

    async fn list_builds(&self, owner: &str, name: &str) -> ClientResult<Vec<Build>> {
        self.record(Call::ListBuilds {
            repo: repo(owner, name),
        });
        let mut state = self.state.lock().unwrap();
        if state.list.queue.is_empty() {
            return Ok(Vec::new());
        }
        state.list.next(&repo(owner, name))
    }

    async fn restart_build(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        params: &BuildParams,
    ) -> ClientResult<Build> {
        self.record(Call::Restart {
            repo: repo(owner, name),
            number,
            params: params.clone(),
        });
        self.trigger(&format!("build {number}"))
    }

    async fn promote_build(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        environment: &str,
        params: &BuildParams,
    ) -> ClientResult<Build> {
        self.record(Call::Promote {
            repo: repo(owner, name),
            number,
            environment: environment.to_string(),
            params: params.clone(),
        });
        self.trigger(&format!("build {number}"))
    }

    async fn cancel_build(&self, owner: &str, name: &str, number: u64) -> ClientResult<()> {
        self.record(Call::Cancel {
            repo: repo(owner, name),
            number,
        });
        match &self.state.lock().unwrap().cancel {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_response_repeats() {
        let client = ScriptedClient::new();
        client
            .push_last_build(Ok(Build::new(1, "main", BuildStatus::Running)))
            .push_last_build(Ok(Build::new(1, "main", BuildStatus::Passing)));

        let first = client.last_build("o", "n", "main").await.unwrap();
        let second = client.last_build("o", "n", "main").await.unwrap();
        let third = client.last_build("o", "n", "main").await.unwrap();

        assert_eq!(first.status, BuildStatus::Running);
        assert_eq!(second.status, BuildStatus::Passing);
        assert_eq!(third.status, BuildStatus::Passing);
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_trigger_numbers_increase() {
        let client = ScriptedClient::new();
        let params = BuildParams::new();

        let a = client.restart_build("o", "n", 7, &params).await.unwrap();
        let b = client
            .promote_build("o", "n", 7, "prod", &params)
            .await
            .unwrap();

        assert_eq!(a.number, 100);
        assert_eq!(b.number, 101);
        assert_eq!(client.triggers().len(), 2);
    }

    #[tokio::test]
    async fn test_unscripted_build_is_not_found() {
        let client = ScriptedClient::new();
        let err = client.build("o", "n", 5).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
