//! Two-way join over concurrently running fetches, superseded by generation.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use shared::{domain::Generation, error::FetchError};
use tracing::debug;

use crate::channel::ResultSender;

pub type Outcome<T> = Result<T, FetchError>;

/// Shared source of plan generations. Issuing a generation makes every earlier
/// one stale.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    latest: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Generation {
        Generation(self.latest.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

#[derive(Debug, Clone)]
pub struct JoinBarrier {
    generations: GenerationCounter,
}

impl JoinBarrier {
    pub fn new(generations: GenerationCounter) -> Self {
        Self { generations }
    }

    pub fn generations(&self) -> &GenerationCounter {
        &self.generations
    }

    /// Issues a new generation and runs both fetches concurrently. Once both
    /// succeed and the generation is still current, `join` builds the value
    /// and it is sent exactly once. The first failure is sent immediately and
    /// the other side's completion is ignored.
    pub fn start<A, B, T, FA, FB, J>(
        &self,
        fetch_a: FA,
        fetch_b: FB,
        join: J,
        sender: ResultSender<Outcome<T>>,
    ) -> BarrierHandle
    where
        A: Send + 'static,
        B: Send + 'static,
        T: Send + 'static,
        FA: Future<Output = Outcome<A>> + Send + 'static,
        FB: Future<Output = Outcome<B>> + Send + 'static,
        J: FnOnce(A, B, Generation) -> T + Send + 'static,
    {
        let generation = self.generations.issue();
        let completed = Arc::new(AtomicBool::new(false));
        let joiner = Arc::new(Joiner {
            generation,
            generations: self.generations.clone(),
            sender,
            completed: Arc::clone(&completed),
            state: Mutex::new(JoinState {
                left: None,
                right: None,
                join: Some(join),
            }),
        });

        let left = Arc::clone(&joiner);
        tokio::spawn(async move {
            let outcome = fetch_a.await;
            left.fill(Slot::Left(outcome));
        });
        tokio::spawn(async move {
            let outcome = fetch_b.await;
            joiner.fill(Slot::Right(outcome));
        });

        debug!(generation = generation.0, "barrier: started");
        BarrierHandle {
            generation,
            generations: self.generations.clone(),
            completed,
        }
    }
}

/// Observes one started barrier. Dropping it does not stop the fetches; a
/// superseded barrier simply never delivers.
#[derive(Debug)]
pub struct BarrierHandle {
    generation: Generation,
    generations: GenerationCounter,
    completed: Arc<AtomicBool>,
}

impl BarrierHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_stale(&self) -> bool {
        !self.generations.is_current(self.generation)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

enum Slot<A, B> {
    Left(Outcome<A>),
    Right(Outcome<B>),
}

struct JoinState<A, B, J> {
    left: Option<A>,
    right: Option<B>,
    join: Option<J>,
}

struct Joiner<A, B, T, J> {
    generation: Generation,
    generations: GenerationCounter,
    sender: ResultSender<Outcome<T>>,
    completed: Arc<AtomicBool>,
    state: Mutex<JoinState<A, B, J>>,
}

impl<A, B, T, J> Joiner<A, B, T, J>
where
    J: FnOnce(A, B, Generation) -> T,
{
    fn fill(&self, slot: Slot<A, B>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.completed.load(Ordering::SeqCst) {
            debug!(
                generation = self.generation.0,
                "barrier: completion after join ignored"
            );
            return;
        }

        let failure = match slot {
            Slot::Left(Ok(value)) => {
                state.left = Some(value);
                None
            }
            Slot::Right(Ok(value)) => {
                state.right = Some(value);
                None
            }
            Slot::Left(Err(err)) | Slot::Right(Err(err)) => Some(err),
        };

        if let Some(err) = failure {
            self.completed.store(true, Ordering::SeqCst);
            state.left = None;
            state.right = None;
            state.join = None;
            drop(state);
            self.deliver(Err(err));
            return;
        }

        if state.left.is_none() || state.right.is_none() {
            return;
        }
        self.completed.store(true, Ordering::SeqCst);
        let (Some(left), Some(right), Some(join)) =
            (state.left.take(), state.right.take(), state.join.take())
        else {
            return;
        };
        drop(state);

        if self.is_stale() {
            self.discard();
            return;
        }
        self.deliver(Ok(join(left, right, self.generation)));
    }

    fn is_stale(&self) -> bool {
        !self.generations.is_current(self.generation)
    }

    fn deliver(&self, outcome: Outcome<T>) {
        if self.is_stale() {
            self.discard();
            return;
        }
        self.sender.send(outcome);
    }

    fn discard(&self) {
        debug!(
            generation = self.generation.0,
            current = self.generations.current().0,
            "barrier: stale generation discarded"
        );
        self.sender.close();
    }
}

#[cfg(test)]
#[path = "tests/barrier_tests.rs"]
mod tests;
