//! Single-slot debounce timer.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Default)]
struct Slot {
    ticket: u64,
    pending: Option<JoinHandle<()>>,
}

/// Owns one timer. Re-arming replaces the pending action; firing clears the slot
/// before the action runs, so a later `arm`/`cancel` never interrupts a push in flight.
pub struct Debouncer {
    runtime: Handle,
    slot: Arc<Mutex<Slot>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Debouncer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Run `action` after `delay` unless re-armed or cancelled first.
    pub fn arm<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }
        slot.ticket += 1;
        let ticket = slot.ticket;
        let shared = self.slot.clone();
        let deadline = Instant::now() + delay;

        slot.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut slot = lock(&shared);
                if slot.ticket != ticket {
                    return;
                }
                slot.pending = None;
            }
            action.await;
        }));
    }

    /// Drop the pending action, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.ticket += 1;
        match slot.pending.take() {
            Some(pending) => {
                pending.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
