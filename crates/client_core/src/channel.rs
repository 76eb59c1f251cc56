//! Single-use hand-off of one plan's outcome to the consumer side.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

pub fn result_channel<T>() -> (ResultSender<T>, ResultReceiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot {
            value: None,
            closed: false,
        }),
        ready: Notify::new(),
    });
    (
        ResultSender {
            shared: Arc::clone(&shared),
        },
        ResultReceiver { shared },
    )
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Notify,
}

struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write side. Holds at most one pending value: a newer `send` replaces an
/// older one the receiver has not taken yet. After [`close`], or once the
/// value was received, every `send` is a no-op.
///
/// [`close`]: ResultSender::close
pub struct ResultSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ResultSender<T> {
    /// Returns whether the value was accepted.
    pub fn send(&self, value: T) -> bool {
        {
            let mut slot = self.shared.lock();
            if slot.closed {
                return false;
            }
            slot.value = Some(value);
        }
        self.shared.ready.notify_one();
        true
    }

    /// Seals the channel. A value already buffered is still delivered.
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl<T> Drop for ResultSender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct ResultReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ResultReceiver<T> {
    /// Waits for the pending value. Resolves to `None` when the channel was
    /// closed without one.
    pub async fn receive(self) -> Option<T> {
        loop {
            {
                let mut slot = self.shared.lock();
                if let Some(value) = slot.value.take() {
                    slot.closed = true;
                    return Some(value);
                }
                if slot.closed {
                    return None;
                }
            }
            // A notify_one issued before this await leaves a permit behind.
            self.shared.ready.notified().await;
        }
    }
}

impl<T> Drop for ResultReceiver<T> {
    fn drop(&mut self) {
        let mut slot = self.shared.lock();
        slot.closed = true;
        slot.value = None;
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
