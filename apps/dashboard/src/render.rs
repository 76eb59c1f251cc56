use std::fmt::Write;

use client_core::{AggregateResult, ListEvent, OverviewEvent, ServiceOverview};
use shared::{domain::ServiceName, error::FetchError};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Toggle { key: ServiceName, on: bool },
    Reload,
    Services,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "q" | "quit" => return Some(Self::Quit),
            "r" | "refresh" => return Some(Self::Reload),
            "s" | "services" => return Some(Self::Services),
            _ => {}
        }
        let (on, name) = if let Some(name) = line.strip_prefix('+') {
            (true, name)
        } else if let Some(name) = line.strip_prefix('-') {
            (false, name)
        } else {
            return None;
        };
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::Toggle {
            key: ServiceName::from(name),
            on,
        })
    }
}

pub fn render_event(event: &ListEvent) -> String {
    match event {
        ListEvent::Updated(result) => render_table(result),
        ListEvent::FetchFailed { error, .. } => render_failure(error),
    }
}

pub fn render_overview_event(event: &OverviewEvent) -> String {
    match event {
        OverviewEvent::Updated(overview) => render_overview(overview),
        OverviewEvent::FetchFailed { error, .. } => render_failure(error),
    }
}

fn render_failure(error: &FetchError) -> String {
    let mut line = format!("! {}", error.user_message());
    if error.requires_reauth() {
        line.push_str(" (pass a fresh --token)");
    }
    line
}

/// One line per service, followed by one indented line per rollout status.
pub fn render_overview(overview: &ServiceOverview) -> String {
    let mut out = format!("# services ({})", overview.services.len());
    for service in &overview.services {
        let _ = write!(
            out,
            "\n{}  {}  {}/{} running",
            service.name, service.status, service.running_count, service.desired_count
        );
        for rollout in service.rollouts.values() {
            let _ = write!(
                out,
                "\n  {:<8} {:<12} {}/{} running, updated {}",
                rollout.status,
                rollout.task_definition_version.as_deref().unwrap_or("-"),
                rollout.running_count,
                rollout.desired_count,
                rollout.last_deploy.as_deref().unwrap_or("at an unknown time"),
            );
        }
    }
    out
}

pub fn render_table(result: &AggregateResult) -> String {
    let service_width = result
        .items
        .iter()
        .map(|d| d.service_name().as_str().len())
        .chain(std::iter::once("SERVICE".len()))
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    if result.filter.is_empty() {
        let _ = writeln!(out, "# all services ({} deployments)", result.items.len());
    } else {
        let filter: Vec<&str> = result.filter.iter().map(ServiceName::as_str).collect();
        let _ = writeln!(
            out,
            "# {} ({} deployments)",
            filter.join(", "),
            result.items.len()
        );
    }
    let _ = writeln!(out, "{:<26}  {:<service_width$}  VERSION", "DATE", "SERVICE");
    for deployment in &result.items {
        let _ = writeln!(
            out,
            "{:<26}  {:<service_width$}  {}",
            deployment.display_date(),
            deployment.service_name(),
            deployment.task_definition_version().unwrap_or("-"),
        );
    }
    out.truncate(out.trim_end().len());
    out
}
