use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::Generation,
    error::FetchError,
    protocol::Resource,
};

mod aggregator;
pub mod barrier;
pub mod channel;
pub mod config;
pub mod enrich;
pub mod filter;
mod overview;
pub mod subscription;
pub mod transport;
pub mod types;

pub use aggregator::DeploymentListAggregator;
pub use barrier::{BarrierHandle, GenerationCounter, JoinBarrier};
pub use channel::{result_channel, ResultReceiver, ResultSender};
pub use filter::{FetchPlan, FilterSet, PlanData};
pub use overview::ServiceOverviewAggregator;
pub use subscription::{ListSubscription, OverviewSubscription, Subscription};
pub use transport::HttpFetcher;
pub use types::{
    AggregateResult, Deployment, DeploymentKey, FilterDelta, Generational, ListEvent,
    OverviewEvent, Rollout, ServiceOverview, ServiceSummary,
};

/// Performs one request for a remote collection. Implementations own their
/// timeouts and never retry implicitly.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, resource: &Resource) -> Result<Vec<Value>, FetchError>;
}

/// What the UI layer drives: subscribe to deliveries and issue plans.
#[async_trait]
pub trait DeploymentListHandle: Send + Sync {
    fn subscribe(&self) -> ListSubscription;
    async fn issue_plan(&self, delta: FilterDelta) -> Generation;
    async fn snapshot(&self) -> Option<AggregateResult>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
