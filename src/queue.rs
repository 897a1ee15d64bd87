//! Unbounded multi-producer injection queue with a single draining consumer.
//!
//! One mutex guards both the pending records and the stop flag, so the
//! worker's wait predicate ("data or stop") is evaluated atomically with
//! respect to producers and shutdown; a wake-up can never be missed between
//! the check and the wait. The lock is never held across I/O.

use std::mem;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;

use crate::reconnect::Pause;
use crate::record::Record;

#[derive(Default)]
struct State {
    records: Vec<Record>,
    stopping: bool,
}

#[derive(Default)]
pub struct InjectionQueue {
    state: Mutex<State>,
    ready: Condvar,
}

impl InjectionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a queue pre-filled with records recovered from a checkpoint.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            state: Mutex::new(State {
                records,
                stopping: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Appends a record and wakes the worker. Never blocks beyond lock contention.
    pub fn enqueue(&self, record: Record) {
        let mut state = self.lock();
        state.records.push(record);
        let depth = state.records.len();
        drop(state);
        self.ready.notify_one();
        debug!("queued record, {depth} pending");
    }

    /// Takes every pending record, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<Record> {
        mem::take(&mut self.lock().records)
    }

    /// Puts records back ahead of anything queued since they were drained.
    pub fn requeue_front(&self, mut records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        let mut state = self.lock();
        records.append(&mut state.records);
        state.records = records;
    }

    /// Blocks until records are pending or a stop is requested.
    ///
    /// Returns `None` once stopped, even if records are still pending: those
    /// are left in place for the shutdown flush.
    pub fn wait_batch(&self) -> Option<Vec<Record>> {
        let state = self.lock();
        let mut state = self
            .ready
            .wait_while(state, |s| s.records.is_empty() && !s.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        if state.stopping {
            return None;
        }
        Some(mem::take(&mut state.records))
    }

    /// Requests the worker to stop. Idempotent.
    pub fn stop(&self) {
        self.lock().stopping = true;
        self.ready.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.lock().stopping
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    // Neither field can be left inconsistent by a panicking holder.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Pause for InjectionQueue {
    fn pause(&self, delay: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .ready
            .wait_timeout_while(state, delay, |s| !s.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        !state.stopping
    }
}
