use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use futures::future;
use shared::{
    domain::{Generation, ServiceName},
    protocol::{Resource, ServiceEntry},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    barrier::{GenerationCounter, JoinBarrier, Outcome},
    channel::result_channel,
    enrich::{enrich_batch, parse_services},
    filter::{FetchPlan, FilterSet, PlanData},
    subscription::{ListSubscription, Subscription},
    types::{AggregateResult, Deployment, FilterDelta, ListEvent},
    DeploymentListHandle, Fetcher,
};

const EVENT_CAPACITY: usize = 64;

/// Backs the deployment list view. Every filter change or reload becomes a
/// plan with a fresh generation; only the latest plan's outcome is ever
/// published.
pub struct DeploymentListAggregator {
    fetcher: Arc<dyn Fetcher>,
    barrier: JoinBarrier,
    state: Mutex<ListState>,
    events: broadcast::Sender<ListEvent>,
}

struct ListState {
    filter: FilterSet,
    current: Option<AggregateResult>,
    settled: Generation,
}

impl DeploymentListAggregator {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            fetcher,
            barrier: JoinBarrier::new(GenerationCounter::new()),
            state: Mutex::new(ListState {
                filter: FilterSet::new(),
                current: None,
                settled: Generation::default(),
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> ListSubscription {
        Subscription::new(self.events.subscribe())
    }

    pub async fn load(self: &Arc<Self>) -> Generation {
        self.issue_plan(FilterDelta::Reload).await
    }

    pub async fn toggle(self: &Arc<Self>, key: ServiceName, on: bool) -> Generation {
        self.issue_plan(FilterDelta::Toggle { key, on }).await
    }

    /// Last delivered result; a failed plan leaves it untouched.
    pub async fn snapshot(&self) -> Option<AggregateResult> {
        self.state.lock().await.current.clone()
    }

    /// Whether the latest issued plan has delivered or failed.
    pub async fn is_settled(&self) -> bool {
        let state = self.state.lock().await;
        state.settled == self.barrier.generations().current()
    }

    pub async fn issue_plan(self: &Arc<Self>, delta: FilterDelta) -> Generation {
        let mut state = self.state.lock().await;
        let plan = state.filter.apply(&delta);
        let (sender, receiver) = result_channel::<Outcome<PlanData>>();

        let generation = match &plan {
            FetchPlan::Full => self
                .barrier
                .start(
                    self.fetch_deployments(None),
                    self.fetch_services(),
                    |deployments, services, _| PlanData::Full {
                        deployments,
                        services,
                    },
                    sender,
                )
                .generation(),
            FetchPlan::Scoped { keys } => {
                let subsets =
                    future::try_join_all(keys.iter().cloned().map(|key| self.fetch_subset(key)));
                // The service list is not refetched for a scoped plan; its
                // side of the barrier is already complete.
                self.barrier
                    .start(
                        subsets,
                        future::ok::<(), _>(()),
                        |subsets, (), _| PlanData::Scoped { subsets },
                        sender,
                    )
                    .generation()
            }
            FetchPlan::Cached => {
                let generation = self.barrier.generations().issue();
                sender.send(Ok(PlanData::Cached));
                generation
            }
        };
        drop(state);

        info!(
            generation = generation.0,
            ?delta,
            fetches = plan.fetch_count(),
            "aggregator: plan issued"
        );

        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(outcome) = receiver.receive().await {
                aggregator.commit(generation, outcome).await;
            }
        });
        generation
    }

    /// Publishes a plan's outcome if, and only if, its generation is still the
    /// latest. The check and the write happen under the state lock that
    /// `issue_plan` also holds while issuing.
    async fn commit(&self, generation: Generation, outcome: Outcome<PlanData>) {
        let mut state = self.state.lock().await;
        if !self.barrier.generations().is_current(generation) {
            debug!(
                generation = generation.0,
                current = self.barrier.generations().current().0,
                "aggregator: stale result discarded"
            );
            return;
        }
        state.settled = generation;

        match outcome {
            Ok(data) => {
                state.filter.absorb(data);
                let result = AggregateResult {
                    generation,
                    items: state.filter.visible(),
                    services: state.filter.services().to_vec(),
                    filter: state.filter.active_keys(),
                };
                info!(
                    generation = generation.0,
                    items = result.items.len(),
                    services = result.services.len(),
                    "aggregator: result delivered"
                );
                state.current = Some(result.clone());
                let _ = self.events.send(ListEvent::Updated(result));
            }
            Err(error) => {
                warn!(generation = generation.0, error = %error, "aggregator: fetch failed");
                let _ = self
                    .events
                    .send(ListEvent::FetchFailed { generation, error });
            }
        }
    }

    fn fetch_deployments(
        &self,
        service: Option<ServiceName>,
    ) -> impl Future<Output = Outcome<Vec<Deployment>>> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        async move {
            let resource = Resource::Deployments(service);
            let raws = fetcher.fetch(&resource).await?;
            Ok(enrich_batch(raws))
        }
    }

    fn fetch_subset(
        &self,
        key: ServiceName,
    ) -> impl Future<Output = Outcome<(ServiceName, Vec<Deployment>)>> + Send + 'static {
        let deployments = self.fetch_deployments(Some(key.clone()));
        async move { Ok((key, deployments.await?)) }
    }

    fn fetch_services(&self) -> impl Future<Output = Outcome<Vec<ServiceEntry>>> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        async move {
            let raws = fetcher.fetch(&Resource::Services).await?;
            Ok(parse_services(raws))
        }
    }
}

#[async_trait]
impl DeploymentListHandle for Arc<DeploymentListAggregator> {
    fn subscribe(&self) -> ListSubscription {
        DeploymentListAggregator::subscribe(self)
    }

    async fn issue_plan(&self, delta: FilterDelta) -> Generation {
        DeploymentListAggregator::issue_plan(self, delta).await
    }

    async fn snapshot(&self) -> Option<AggregateResult> {
        DeploymentListAggregator::snapshot(self).await
    }
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
