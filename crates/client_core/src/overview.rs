//! Backs the service overview: one description fetch per refresh, published
//! only while it is the latest refresh issued.

use std::sync::Arc;

use chrono::Utc;
use shared::{domain::Generation, protocol::Resource};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    barrier::{GenerationCounter, Outcome},
    channel::result_channel,
    enrich::summarize_services,
    subscription::{OverviewSubscription, Subscription},
    types::{OverviewEvent, ServiceOverview, ServiceSummary},
    Fetcher,
};

const EVENT_CAPACITY: usize = 16;

pub struct ServiceOverviewAggregator {
    fetcher: Arc<dyn Fetcher>,
    generations: GenerationCounter,
    state: Mutex<OverviewState>,
    events: broadcast::Sender<OverviewEvent>,
}

struct OverviewState {
    current: Option<ServiceOverview>,
    settled: Generation,
}

impl ServiceOverviewAggregator {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            fetcher,
            generations: GenerationCounter::new(),
            state: Mutex::new(OverviewState {
                current: None,
                settled: Generation::default(),
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> OverviewSubscription {
        Subscription::new(self.events.subscribe())
    }

    pub async fn snapshot(&self) -> Option<ServiceOverview> {
        self.state.lock().await.current.clone()
    }

    pub async fn is_settled(&self) -> bool {
        self.state.lock().await.settled == self.generations.current()
    }

    pub async fn refresh(self: &Arc<Self>) -> Generation {
        let state = self.state.lock().await;
        let generation = self.generations.issue();
        let (sender, receiver) = result_channel::<Outcome<Vec<ServiceSummary>>>();
        drop(state);
        info!(generation = generation.0, "overview: refresh issued");

        let fetcher = Arc::clone(&self.fetcher);
        let generations = self.generations.clone();
        tokio::spawn(async move {
            let outcome = fetcher
                .fetch(&Resource::ServiceDescriptions)
                .await
                .map(|raws| summarize_services(raws, Utc::now()));
            if generations.is_current(generation) {
                sender.send(outcome);
            } else {
                debug!(generation = generation.0, "overview: superseded refresh dropped");
                sender.close();
            }
        });

        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(outcome) = receiver.receive().await {
                aggregator.commit(generation, outcome).await;
            }
        });
        generation
    }

    async fn commit(&self, generation: Generation, outcome: Outcome<Vec<ServiceSummary>>) {
        let mut state = self.state.lock().await;
        if !self.generations.is_current(generation) {
            debug!(
                generation = generation.0,
                current = self.generations.current().0,
                "overview: stale result discarded"
            );
            return;
        }
        state.settled = generation;

        match outcome {
            Ok(services) => {
                info!(
                    generation = generation.0,
                    services = services.len(),
                    "overview: result delivered"
                );
                let overview = ServiceOverview {
                    generation,
                    services,
                };
                state.current = Some(overview.clone());
                let _ = self.events.send(OverviewEvent::Updated(overview));
            }
            Err(error) => {
                warn!(generation = generation.0, error = %error, "overview: fetch failed");
                let _ = self
                    .events
                    .send(OverviewEvent::FetchFailed { generation, error });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/overview_tests.rs"]
mod tests;
