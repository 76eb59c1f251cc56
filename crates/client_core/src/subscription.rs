//! Consumer side of an aggregator's deliveries, in generation order.

use futures::{future, Stream, StreamExt};
use shared::domain::Generation;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::types::{Generational, ListEvent, OverviewEvent};

pub type ListSubscription = Subscription<ListEvent>;
pub type OverviewSubscription = Subscription<OverviewEvent>;

pub struct Subscription<E> {
    rx: broadcast::Receiver<E>,
}

impl<E: Clone> Subscription<E> {
    pub(crate) fn new(rx: broadcast::Receiver<E>) -> Self {
        Self { rx }
    }

    /// Next event; a slow consumer skips ahead to newer ones.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscription: lagged behind, skipping to newer results");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<E> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscription: lagged behind, skipping to newer results");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

impl<E: Clone + Generational> Subscription<E> {
    /// Waits for the outcome of `generation` or of any plan issued after it.
    pub async fn until(&mut self, generation: Generation) -> Option<E> {
        while let Some(event) = self.recv().await {
            if event.generation() >= generation {
                return Some(event);
            }
        }
        None
    }
}

impl<E: Clone + Send + 'static> Subscription<E> {
    pub fn into_stream(self) -> impl Stream<Item = E> {
        BroadcastStream::new(self.rx).filter_map(|event| future::ready(event.ok()))
    }
}
