//! Shared test doubles: a scripted device link and a scripted oracle.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use ludo_engine::coordinator::context::ExecutionContext;
use ludo_engine::coordinator::CancelFlag;
use ludo_engine::correlation::CorrelationTable;
use ludo_engine::device::DeviceLink;
use ludo_engine::errors::RunError;
use ludo_engine::oracle::{Classification, Oracle, OracleError, Selection};
use protocol::{Candidate, ReplyPayload, RequestId};

/// What the fake device does with one keyword.
#[derive(Clone)]
pub enum Script {
    /// Deliver these candidates after the delay
    ReplyAfter(Duration, Vec<Candidate>),
    /// Never reply
    Silent,
    /// Ignore the first dispatch, answer redispatches after the delay
    /// (models a primary miss followed by a fallback hit)
    SilentThenReply(Duration, Vec<Candidate>),
}

/// Scripted in-process device link. Replies are delivered straight into
/// the shared CorrelationTable from a spawned task, mimicking the
/// transport's out-of-band inbound channel.
#[derive(Clone)]
pub struct FakeDeviceLink {
    table: CorrelationTable,
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    seen: Arc<Mutex<HashMap<String, usize>>>,
    pub dispatched: Arc<Mutex<Vec<(RequestId, String, Option<String>)>>>,
    pub launched: Arc<Mutex<Vec<(String, String)>>>,
    /// Cancelled as a side effect of dispatching this keyword, if set
    cancel_on_dispatch: Arc<Mutex<Option<(String, CancelFlag)>>>,
}

impl FakeDeviceLink {
    pub fn new(table: CorrelationTable) -> Self {
        Self {
            table,
            scripts: Arc::new(Mutex::new(HashMap::new())),
            seen: Arc::new(Mutex::new(HashMap::new())),
            dispatched: Arc::new(Mutex::new(Vec::new())),
            launched: Arc::new(Mutex::new(Vec::new())),
            cancel_on_dispatch: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn script(&self, keyword: &str, script: Script) {
        self.scripts
            .lock()
            .await
            .insert(keyword.to_lowercase(), script);
    }

    pub async fn cancel_when_dispatched(&self, keyword: &str, flag: CancelFlag) {
        *self.cancel_on_dispatch.lock().await = Some((keyword.to_lowercase(), flag));
    }

    pub async fn dispatch_count(&self) -> usize {
        self.dispatched.lock().await.len()
    }

    pub async fn launch_count(&self) -> usize {
        self.launched.lock().await.len()
    }
}

#[async_trait]
impl DeviceLink for FakeDeviceLink {
    async fn dispatch_search(
        &self,
        id: &RequestId,
        keyword: &str,
        system: Option<&str>,
    ) -> Result<(), RunError> {
        self.dispatched.lock().await.push((
            id.clone(),
            keyword.to_string(),
            system.map(str::to_string),
        ));

        if let Some((trigger, flag)) = self.cancel_on_dispatch.lock().await.as_ref() {
            if trigger == &keyword.to_lowercase() {
                flag.cancel();
            }
        }

        let key = keyword.to_lowercase();
        let times_seen = {
            let mut seen = self.seen.lock().await;
            let entry = seen.entry(key.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let script = self.scripts.lock().await.get(&key).cloned();
        let reply = match script {
            Some(Script::ReplyAfter(delay, candidates)) => Some((delay, candidates)),
            Some(Script::SilentThenReply(delay, candidates)) if times_seen > 1 => {
                Some((delay, candidates))
            }
            _ => None,
        };

        if let Some((delay, candidates)) = reply {
            let table = self.table.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                table.deliver(&id, ReplyPayload::new(candidates)).await;
            });
        }
        Ok(())
    }

    async fn launch(&self, name: &str, location: &str) -> Result<(), RunError> {
        self.launched
            .lock()
            .await
            .push((name.to_string(), location.to_string()));
        Ok(())
    }
}

/// Scripted oracle. Optionally flips a cancel flag while answering, to
/// exercise the coordinator's checkpoints. The flags are set after
/// construction (they come from the coordinator built around this
/// oracle), hence the interior mutability.
pub struct MockOracle {
    pub classification: Result<Classification, OracleError>,
    pub selection: Result<Selection, OracleError>,
    pub cancel_during_classify: std::sync::Mutex<Option<CancelFlag>>,
    pub cancel_during_select: std::sync::Mutex<Option<CancelFlag>>,
}

impl MockOracle {
    pub fn new(classification: Classification, selection: Selection) -> Self {
        Self {
            classification: Ok(classification),
            selection: Ok(selection),
            cancel_during_classify: std::sync::Mutex::new(None),
            cancel_during_select: std::sync::Mutex::new(None),
        }
    }

    pub fn failing_classify(error: OracleError) -> Self {
        Self {
            classification: Err(error),
            selection: Ok(Selection::NoneSuitable {
                reason: "unused".to_string(),
            }),
            cancel_during_classify: std::sync::Mutex::new(None),
            cancel_during_select: std::sync::Mutex::new(None),
        }
    }
}

fn clone_oracle_result<T: Clone>(result: &Result<T, OracleError>) -> Result<T, OracleError> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(e) => Err(OracleError::Unavailable(e.to_string())),
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn classify(
        &self,
        _utterance: &str,
        _ctx: &ExecutionContext,
    ) -> Result<Classification, OracleError> {
        if let Some(flag) = self.cancel_during_classify.lock().unwrap().as_ref() {
            flag.cancel();
        }
        clone_oracle_result(&self.classification)
    }

    async fn select_best(
        &self,
        _candidates: &[Candidate],
        _target: &str,
        _ctx: &ExecutionContext,
    ) -> Result<Selection, OracleError> {
        if let Some(flag) = self.cancel_during_select.lock().unwrap().as_ref() {
            flag.cancel();
        }
        clone_oracle_result(&self.selection)
    }
}
