//! Scheduler implementations.
//!
//! [`TokioScheduler`] drives the real countdown. [`ManualScheduler`] only
//! fires when told to, for tests and for hosts that own their own clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant};

use crate::traits::{Scheduler, TickFn, TimerGuard};

/// Runs ticks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, task: TickFn) -> TimerGuard {
        let runtime = self.handle.clone();
        let ticker = self.handle.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                // Each tick gets its own task: aborting the loop must not
                // drop a submission started by the final tick.
                runtime.spawn(task());
            }
        });
        TimerGuard::new(move || ticker.abort())
    }
}

struct Slot {
    id: u64,
    task: TickFn,
}

/// A scheduler whose ticks are fired explicitly.
#[derive(Default, Clone)]
pub struct ManualScheduler {
    slots: Arc<Mutex<Vec<Slot>>>,
    next_id: Arc<AtomicU64>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers registered and not yet cancelled.
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of timers ever registered.
    pub fn registrations(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Run every active timer once. Returns how many ran.
    pub async fn fire(&self) -> usize {
        let tasks: Vec<TickFn> = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|slot| Arc::clone(&slot.task))
            .collect();
        for task in &tasks {
            task().await;
        }
        tasks.len()
    }

    /// Fire `times` rounds, stopping early once no timer is left.
    pub async fn fire_times(&self, times: u64) -> u64 {
        let mut fired = 0;
        for _ in 0..times {
            if self.fire().await == 0 {
                break;
            }
            fired += 1;
        }
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, _period: Duration, task: TickFn) -> TimerGuard {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Slot { id, task });

        let slots = Arc::clone(&self.slots);
        TimerGuard::new(move || {
            slots
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|slot| slot.id != id);
        })
    }
}
