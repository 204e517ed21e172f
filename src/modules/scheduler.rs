use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use tokio::task::JoinHandle;

/// Bookkeeping of the one-second countdown tasks, one per RUNNING race.
/// The scheduler only owns the task handles; what a tick does is decided
/// by the future handed to `schedule`.
#[derive(Clone, Default)]
pub struct CountdownScheduler {
    timers: Arc<Mutex<HashMap<i64, JoinHandle<()>>>>,
}

impl CountdownScheduler {
    pub fn new() -> CountdownScheduler {
        CountdownScheduler { timers: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// # start the timer task for a race
    /// spawns `tick_loop` and keeps its handle. An already scheduled
    /// timer for the same race is aborted first, so scheduling is safe
    /// to repeat.
    ///
    /// The map lock is held across spawn and insert: a loop that ends
    /// immediately can only deschedule itself after its handle is in
    /// the map.
    pub fn schedule<F>(&self, race_id: i64, tick_loop: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut timers = self.lock();

        if let Some(previous) = timers.remove(&race_id) {
            previous.abort();
        }

        timers.insert(race_id, tokio::spawn(tick_loop));
        debug!(target: "scheduler:schedule", "countdown active for race {}", race_id);
    }

    /// # stop the timer task for a race
    /// idempotent; calling it for a race without a timer does nothing.
    pub fn deschedule(&self, race_id: i64) {
        if let Some(handle) = self.lock().remove(&race_id) {
            handle.abort();
            debug!(target: "scheduler:deschedule", "countdown stopped for race {}", race_id);
        }
    }

    pub fn is_scheduled(&self, race_id: i64) -> bool {
        self.lock().contains_key(&race_id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, JoinHandle<()>>> {
        // a poisoned map still holds valid handles
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
