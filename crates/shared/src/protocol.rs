use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{ClusterName, ServiceName},
    error::FetchError,
};

/// A remote collection the dashboard reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "service", rename_all = "snake_case")]
pub enum Resource {
    /// All deployments, or those of a single service.
    Deployments(Option<ServiceName>),
    Services,
    /// Running state of every service, with its in-progress rollouts.
    ServiceDescriptions,
}

impl Resource {
    pub fn deployments() -> Self {
        Self::Deployments(None)
    }

    pub fn deployments_for(service: ServiceName) -> Self {
        Self::Deployments(Some(service))
    }

    /// Path segments relative to the API base url.
    pub fn path_segments(&self) -> Vec<&str> {
        match self {
            Self::Deployments(None) => vec!["deploy", "list"],
            Self::Deployments(Some(service)) => vec!["deploy", "list", service.as_str()],
            Self::Services => vec!["service", "list"],
            Self::ServiceDescriptions => vec!["service", "describe"],
        }
    }
}

/// Body of every list endpoint. Failures are reported with a 200 status and an
/// `error` field instead of the collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ListEnvelope {
    pub fn into_items(self, resource: &Resource) -> Result<Vec<Value>, FetchError> {
        if let Some(message) = self.error {
            return Err(FetchError::server(message));
        }
        let items = match resource {
            Resource::Deployments(_) => self.deployments,
            Resource::Services | Resource::ServiceDescriptions => self.services,
        };
        Ok(items.unwrap_or_default())
    }
}

/// The fields of a deployment record the aggregation core reads. Everything
/// else in the record is carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentFields {
    #[serde(default)]
    pub service_name: Option<ServiceName>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub task_definition_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    #[serde(rename = "S")]
    pub name: ServiceName,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterName>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the service description collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningService {
    pub service_name: ServiceName,
    #[serde(default)]
    pub cluster_name: Option<ClusterName>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub running_count: i64,
    #[serde(default)]
    pub pending_count: i64,
    #[serde(default)]
    pub desired_count: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deployments: Vec<RunningDeployment>,
}

/// A rollout of a service, keyed by its `status` (`PRIMARY`, `ACTIVE`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningDeployment {
    pub status: String,
    #[serde(default)]
    pub running_count: i64,
    #[serde(default)]
    pub pending_count: i64,
    #[serde(default)]
    pub desired_count: i64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub task_definition: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
