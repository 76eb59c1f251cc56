use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{error::FetchError, protocol::Resource};
use tokio::sync::oneshot;

use crate::{enrich::enrich, types::Deployment, Fetcher};

pub type Reply = Result<Vec<Value>, FetchError>;

/// Fetcher whose calls stay pending until the test releases them. A call whose
/// sender is dropped never completes.
#[derive(Default)]
pub struct ScriptedFetcher {
    pending: Mutex<HashMap<Resource, VecDeque<oneshot::Receiver<Reply>>>>,
    calls: Mutex<Vec<Resource>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers the next call for `resource`; the returned sender releases it.
    pub fn expect(&self, resource: Resource) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending lock")
            .entry(resource)
            .or_default()
            .push_back(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Resource> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, resource: &Resource) -> Result<Vec<Value>, FetchError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(resource.clone());
        let rx = {
            let mut pending = self.pending.lock().expect("pending lock");
            pending.get_mut(resource).and_then(VecDeque::pop_front)
        };
        match rx {
            Some(rx) => match rx.await {
                Ok(reply) => reply,
                Err(_) => std::future::pending().await,
            },
            None => Err(FetchError::transport(format!(
                "unexpected fetch of {resource:?}"
            ))),
        }
    }
}

/// Fetcher with fixed replies; each call first waits for the next queued delay.
#[derive(Default)]
pub struct StaticFetcher {
    replies: HashMap<Resource, Vec<Value>>,
    delays: Mutex<VecDeque<Duration>>,
}

impl StaticFetcher {
    pub fn with_reply(mut self, resource: Resource, items: Vec<Value>) -> Self {
        self.replies.insert(resource, items);
        self
    }

    pub fn with_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.delays.lock().expect("delays lock").extend(delays);
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, resource: &Resource) -> Result<Vec<Value>, FetchError> {
        let delay = self
            .delays
            .lock()
            .expect("delays lock")
            .pop_front()
            .unwrap_or_default();
        tokio::time::sleep(delay).await;
        self.replies
            .get(resource)
            .cloned()
            .ok_or_else(|| FetchError::server(format!("no reply for {resource:?}")))
    }
}

pub fn deployment(service: &str, time: &str) -> Value {
    json!({
        "ServiceName": service,
        "Time": time,
        "Status": "success",
        "TaskDefinitionArn": format!("arn:aws:ecs:eu-west-1:123456789012:task-definition/{service}:7"),
    })
}

pub fn service(name: &str) -> Value {
    json!({ "C": "production", "S": name, "ML": 512, "L": [] })
}

pub fn enriched(service: &str, time: &str) -> Deployment {
    enrich(deployment(service, time)).expect("valid deployment")
}

pub fn assert_newest_first(items: &[Deployment]) {
    for pair in items.windows(2) {
        assert!(
            pair[0].time() >= pair[1].time(),
            "items out of order: {} before {}",
            pair[0].time(),
            pair[1].time()
        );
    }
}

/// Lets every ready task run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub fn rollout(status: &str, updated_at: &str, revision: u32) -> Value {
    json!({
        "status": status,
        "runningCount": 2,
        "pendingCount": 0,
        "desiredCount": 2,
        "createdAt": updated_at,
        "updatedAt": updated_at,
        "taskDefinition": format!("arn:aws:ecs:eu-west-1:123456789012:task-definition/web:{revision}"),
    })
}

pub fn description(name: &str, rollouts: Vec<Value>) -> Value {
    json!({
        "serviceName": name,
        "clusterName": "production",
        "runningCount": 2,
        "pendingCount": 0,
        "desiredCount": 2,
        "status": "ACTIVE",
        "events": [],
        "deployments": rollouts,
        "tasks": [],
    })
}
