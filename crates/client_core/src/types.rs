use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{ClusterName, Generation, ServiceName},
    error::FetchError,
    protocol::ServiceEntry,
};

/// A deployment record with its display fields attached. Built only by the
/// enricher and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    pub(crate) service_name: ServiceName,
    pub(crate) time: DateTime<Utc>,
    pub(crate) display_date: String,
    pub(crate) task_definition_version: Option<String>,
    pub(crate) raw: Value,
}

impl Deployment {
    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn display_date(&self) -> &str {
        &self.display_date
    }

    pub fn task_definition_version(&self) -> Option<&str> {
        self.task_definition_version.as_deref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn key(&self) -> DeploymentKey {
        DeploymentKey {
            service_name: self.service_name.clone(),
            time: self.time,
        }
    }
}

/// Identity of a deployment: the owning service plus its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentKey {
    pub service_name: ServiceName,
    pub time: DateTime<Utc>,
}

/// The combined list handed to consumers for one plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub generation: Generation,
    pub items: Vec<Deployment>,
    pub services: Vec<ServiceEntry>,
    /// Active service filter the items were computed for; empty when unfiltered.
    pub filter: Vec<ServiceName>,
}

#[derive(Debug, Clone)]
pub enum ListEvent {
    Updated(AggregateResult),
    FetchFailed {
        generation: Generation,
        error: FetchError,
    },
}

impl ListEvent {
    pub fn generation(&self) -> Generation {
        match self {
            Self::Updated(result) => result.generation,
            Self::FetchFailed { generation, .. } => *generation,
        }
    }
}

impl Generational for ListEvent {
    fn generation(&self) -> Generation {
        ListEvent::generation(self)
    }
}

/// Events carrying the plan generation they belong to.
pub trait Generational {
    fn generation(&self) -> Generation;
}

/// A change requested by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDelta {
    /// Re-run the plan for the current filter set.
    Reload,
    Toggle { key: ServiceName, on: bool },
}

/// A service row of the overview, with its rollouts grouped by status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub name: ServiceName,
    pub cluster: Option<ClusterName>,
    pub status: String,
    pub running_count: i64,
    pub pending_count: i64,
    pub desired_count: i64,
    /// One rollout per status; a later entry with the same status wins.
    pub rollouts: BTreeMap<String, Rollout>,
}

impl ServiceSummary {
    /// The rollout currently serving traffic, if the service reports one.
    pub fn primary(&self) -> Option<&Rollout> {
        self.rollouts.get("PRIMARY")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollout {
    pub status: String,
    pub running_count: i64,
    pub pending_count: i64,
    pub desired_count: i64,
    pub updated_at: Option<DateTime<Utc>>,
    /// Age of `updated_at` when the overview was built, e.g. "3 hours ago".
    pub last_deploy: Option<String>,
    pub task_definition_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceOverview {
    pub generation: Generation,
    pub services: Vec<ServiceSummary>,
}

#[derive(Debug, Clone)]
pub enum OverviewEvent {
    Updated(ServiceOverview),
    FetchFailed {
        generation: Generation,
        error: FetchError,
    },
}

impl Generational for OverviewEvent {
    fn generation(&self) -> Generation {
        match self {
            Self::Updated(overview) => overview.generation,
            Self::FetchFailed { generation, .. } => *generation,
        }
    }
}
