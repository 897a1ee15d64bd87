//! Top-level handle tying queue, worker, transport and checkpoint together.
//!
//! # Lifecycle
//!
//! 1. [`Shipper::new`] loads (and removes) any checkpoint left by a previous
//!    run; its records are queued ahead of anything new.
//! 2. [`Shipper::start`] moves the transport into a dedicated worker thread.
//! 3. Producers call [`Shipper::enqueue`] from any number of threads.
//! 4. [`Shipper::shutdown`] (or drop) stops the worker, joins it, and only
//!    then writes whatever is still queued to the checkpoint.
//!
//! ```no_run
//! use state_shipper::{Shipper, ShipperConfig, TcpTransport, Transport, TransportConfig};
//!
//! let mut transport = TcpTransport::new(TransportConfig::new("collector.local", 80));
//! let _ = transport.connect();
//! let mut shipper = Shipper::new(transport, ShipperConfig::default())?;
//! shipper.start()?;
//! shipper.enqueue(r#"{"id":"sensor-1"}"#);
//! let report = shipper.shutdown()?;
//! println!("{} record(s) parked for the next run", report.checkpointed);
//! # Ok::<(), state_shipper::Error>(())
//! ```

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::ShipperConfig;
use crate::queue::InjectionQueue;
use crate::reconnect::ReconnectPolicy;
use crate::record::Record;
use crate::stats::{ShipperStats, StatsSnapshot};
use crate::transport::{TcpTransport, Transport};
use crate::worker::InjectionWorker;
use crate::{Error, Result};

const WORKER_THREAD_NAME: &str = "state-injection";

enum WorkerSlot<T> {
    Idle(T),
    Running(JoinHandle<T>),
    Stopped,
}

/// Outcome of a shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Records written to the checkpoint for the next run.
    pub checkpointed: usize,
    pub stats: StatsSnapshot,
}

pub struct Shipper<T: Transport + 'static = TcpTransport> {
    queue: Arc<InjectionQueue>,
    checkpoint: CheckpointStore,
    policy: ReconnectPolicy,
    stats: Arc<ShipperStats>,
    identity: String,
    worker: WorkerSlot<T>,
}

impl<T: Transport + 'static> Shipper<T> {
    /// Builds a shipper around `transport`, recovering any checkpoint first.
    ///
    /// The transport is not connected here; the worker reconnects on the
    /// first failed send.
    pub fn new(transport: T, config: ShipperConfig) -> Result<Self> {
        config.validate()?;
        let checkpoint = CheckpointStore::from_config(&config)?;
        let recovered = checkpoint.load()?;
        if !recovered.is_empty() {
            info!(
                "restored {} undelivered record(s) from {}",
                recovered.len(),
                checkpoint.path().display()
            );
        }
        Ok(Self {
            queue: Arc::new(InjectionQueue::with_records(recovered)),
            checkpoint,
            policy: ReconnectPolicy::from_config(&config.backoff),
            stats: Arc::new(ShipperStats::new()),
            identity: transport.identity().to_string(),
            worker: WorkerSlot::Idle(transport),
        })
    }

    /// Launches the injection worker. Calling it again while running is a no-op.
    pub fn start(&mut self) -> Result<()> {
        let transport = match mem::replace(&mut self.worker, WorkerSlot::Stopped) {
            WorkerSlot::Idle(transport) => transport,
            running @ WorkerSlot::Running(_) => {
                self.worker = running;
                return Ok(());
            }
            WorkerSlot::Stopped => return Err(Error::AlreadyStopped),
        };
        let worker = InjectionWorker::new(
            transport,
            Arc::clone(&self.queue),
            self.policy,
            Arc::clone(&self.stats),
        );
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(Error::Io)?;
        self.worker = WorkerSlot::Running(handle);
        info!("injection worker started for {}", self.identity);
        Ok(())
    }

    /// Queues a record for delivery. Never blocks on the network.
    pub fn enqueue(&self, record: impl Into<Record>) {
        self.queue.enqueue(record.into());
    }

    /// Records waiting in the queue (not counting a batch in flight).
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops the worker and checkpoints undelivered records.
    pub fn shutdown(mut self) -> Result<ShutdownReport> {
        self.finish()
    }

    fn finish(&mut self) -> Result<ShutdownReport> {
        self.queue.stop();
        let joined = match mem::replace(&mut self.worker, WorkerSlot::Stopped) {
            WorkerSlot::Running(handle) => handle.join().map(drop),
            WorkerSlot::Idle(_) | WorkerSlot::Stopped => Ok(()),
        };

        // The worker has exited, so nothing else touches the queue now.
        let residue = self.queue.drain_all();
        let checkpointed = residue.len();
        if !residue.is_empty() {
            if let Err(err) = self.checkpoint.save(&residue) {
                self.queue.requeue_front(residue);
                return Err(err);
            }
            self.stats.record_checkpointed(checkpointed);
        }

        if joined.is_err() {
            error!("injection worker panicked");
            return Err(Error::WorkerPanicked);
        }
        Ok(ShutdownReport {
            checkpointed,
            stats: self.stats.snapshot(),
        })
    }
}

impl<T: Transport + 'static> Drop for Shipper<T> {
    fn drop(&mut self) {
        match self.finish() {
            Ok(report) if report.checkpointed > 0 => {
                warn!(
                    "shipper dropped with {} undelivered record(s); saved to {}",
                    report.checkpointed,
                    self.checkpoint.path().display()
                );
            }
            Ok(_) => {}
            Err(Error::WorkerPanicked) => {}
            Err(err) => {
                error!(
                    "could not checkpoint {} record(s): {err}",
                    self.queue.len()
                );
            }
        }
    }
}
