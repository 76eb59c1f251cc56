//! Derives display fields for raw deployment records and applies the
//! canonical ordering (newest first). Also builds the service overview rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use shared::protocol::{DeploymentFields, RunningDeployment, RunningService, ServiceEntry};
use thiserror::Error;
use tracing::warn;

use crate::types::{Deployment, Rollout, ServiceSummary};

const DISPLAY_DATE_FORMAT: &str = "%-m/%-d/%Y, %I:%M:%S %p UTC";
const VERSION_SEPARATOR: char = '/';

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("deployment record has an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("deployment record is missing `{0}`")]
    MissingField(&'static str),
    #[error("malformed timestamp {value:?}: {source}")]
    MalformedTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

pub fn enrich(raw: Value) -> Result<Deployment, EnrichError> {
    let fields = DeploymentFields::deserialize(&raw)?;
    let service_name = fields
        .service_name
        .ok_or(EnrichError::MissingField("ServiceName"))?;
    let time = parse_timestamp(
        fields
            .time
            .as_deref()
            .ok_or(EnrichError::MissingField("Time"))?,
    )?;
    let task_definition_version = fields
        .task_definition_arn
        .as_deref()
        .and_then(version_token)
        .map(str::to_string);

    Ok(Deployment {
        service_name,
        time,
        display_date: time.format(DISPLAY_DATE_FORMAT).to_string(),
        task_definition_version,
        raw,
    })
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, EnrichError> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|source| EnrichError::MalformedTimestamp {
            value: value.to_string(),
            source,
        })
}

/// Segment after the last separator of a composite identifier such as
/// `arn:aws:ecs:eu-west-1:123:task-definition/web:42`.
pub fn version_token(identifier: &str) -> Option<&str> {
    identifier
        .rsplit_once(VERSION_SEPARATOR)
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

/// Enriches every record, dropping the ones that cannot be enriched, and
/// returns them in canonical order.
pub fn enrich_batch(raws: Vec<Value>) -> Vec<Deployment> {
    let mut items: Vec<Deployment> = raws
        .into_iter()
        .filter_map(|raw| match enrich(raw) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(error = %err, "enrich: dropping deployment record");
                None
            }
        })
        .collect();
    sort_canonical(&mut items);
    items
}

/// Timestamp descending; equal timestamps keep their input order.
pub fn sort_canonical(items: &mut [Deployment]) {
    items.sort_by(|a, b| b.time.cmp(&a.time));
}

pub fn parse_services(raws: Vec<Value>) -> Vec<ServiceEntry> {
    raws.into_iter()
        .filter_map(|raw| match serde_json::from_value::<ServiceEntry>(raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "enrich: dropping service entry");
                None
            }
        })
        .collect()
}

/// Builds an overview row from a service description. Relative ages are taken
/// against `now`.
pub fn summarize_service(raw: Value, now: DateTime<Utc>) -> Result<ServiceSummary, EnrichError> {
    let service = RunningService::deserialize(&raw)?;
    let mut rollouts = BTreeMap::new();
    for deployment in service.deployments {
        let rollout = summarize_rollout(deployment, now);
        rollouts.insert(rollout.status.clone(), rollout);
    }

    Ok(ServiceSummary {
        name: service.service_name,
        cluster: service.cluster_name,
        status: service.status,
        running_count: service.running_count,
        pending_count: service.pending_count,
        desired_count: service.desired_count,
        rollouts,
    })
}

fn summarize_rollout(deployment: RunningDeployment, now: DateTime<Utc>) -> Rollout {
    let updated_at = deployment
        .updated_at
        .as_deref()
        .and_then(|value| match parse_timestamp(value) {
            Ok(time) => Some(time),
            Err(err) => {
                warn!(status = %deployment.status, error = %err, "enrich: rollout without usable updatedAt");
                None
            }
        });

    Rollout {
        last_deploy: updated_at.map(|time| relative_time(time, now)),
        task_definition_version: deployment
            .task_definition
            .as_deref()
            .and_then(version_token)
            .map(str::to_string),
        status: deployment.status,
        running_count: deployment.running_count,
        pending_count: deployment.pending_count,
        desired_count: deployment.desired_count,
        updated_at,
    }
}

/// Summarizes every description, dropping the ones that cannot be read and
/// keeping the backend's order.
pub fn summarize_services(raws: Vec<Value>, now: DateTime<Utc>) -> Vec<ServiceSummary> {
    raws.into_iter()
        .filter_map(|raw| match summarize_service(raw, now) {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(error = %err, "enrich: dropping service description");
                None
            }
        })
        .collect()
}

/// Human age of `then` seen from `now`: "a few seconds ago", "5 minutes ago",
/// "a day ago", "in 3 hours".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let phrase = age_phrase(elapsed.num_seconds().unsigned_abs());
    if elapsed.num_seconds() < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn age_phrase(seconds: u64) -> String {
    let seconds = seconds as f64;
    let minutes = (seconds / 60.0).round() as u64;
    let hours = (seconds / 3_600.0).round() as u64;
    let days = (seconds / 86_400.0).round() as u64;
    let months = (seconds / 86_400.0 / 30.436_875).round() as u64;
    let years = (seconds / 86_400.0 / 365.25).round() as u64;

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1 {
        "a minute".to_string()
    } else if minutes < 45 {
        format!("{minutes} minutes")
    } else if hours <= 1 {
        "an hour".to_string()
    } else if hours < 22 {
        format!("{hours} hours")
    } else if days <= 1 {
        "a day".to_string()
    } else if days < 26 {
        format!("{days} days")
    } else if months <= 1 {
        "a month".to_string()
    } else if months < 11 {
        format!("{months} months")
    } else if years <= 1 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}

#[cfg(test)]
#[path = "tests/enrich_tests.rs"]
mod tests;
