use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::load_settings, DeploymentListAggregator, HttpFetcher, ListSubscription,
    OverviewSubscription, ServiceOverviewAggregator,
};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;

use render::{render_event, render_overview_event, Command};

#[derive(Parser, Debug)]
struct Args {
    /// Deployment API base url; overrides dashboard.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    /// Service to filter by; repeat for several.
    #[arg(long = "service")]
    services: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.server_url {
        settings.api_base_url = url;
    }
    if let Some(token) = args.token {
        settings.api_token = Some(token);
    }
    let fetcher = HttpFetcher::from_settings(&settings).context("invalid api settings")?;
    info!(api = %settings.api_base_url, "dashboard: starting");

    let fetcher = Arc::new(fetcher);
    let aggregator = DeploymentListAggregator::new(fetcher.clone());
    let overview = ServiceOverviewAggregator::new(fetcher);
    let renderer = tokio::spawn(print_events(aggregator.subscribe()));
    let overview_renderer = tokio::spawn(print_overview(overview.subscribe()));

    aggregator.load().await;
    for name in args.services {
        aggregator.toggle(name.as_str().into(), true).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match Command::parse(&line) {
            Some(Command::Quit) => break,
            Some(Command::Reload) => {
                aggregator.load().await;
            }
            Some(Command::Toggle { key, on }) => {
                aggregator.toggle(key, on).await;
            }
            Some(Command::Services) => {
                overview.refresh().await;
            }
            None => eprintln!(
                "commands: +<service>, -<service>, r (refresh), s (services), q (quit)"
            ),
        }
    }

    renderer.abort();
    overview_renderer.abort();
    Ok(())
}

async fn print_events(events: ListSubscription) {
    let mut stream = Box::pin(events.into_stream());
    while let Some(event) = stream.next().await {
        println!("{}", render_event(&event));
    }
}

async fn print_overview(events: OverviewSubscription) {
    let mut stream = Box::pin(events.into_stream());
    while let Some(event) = stream.next().await {
        println!("{}", render_overview_event(&event));
    }
}
