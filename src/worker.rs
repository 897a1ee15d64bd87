//! Single consumer that drains the injection queue into the transport.
//!
//! The worker cycles between waiting on the queue and draining a batch:
//!
//! - **Waiting**: blocked in [`InjectionQueue::wait_batch`] until records
//!   arrive or a stop is requested. A stop ends the worker even if records
//!   are pending; shutdown checkpoints them.
//! - **Draining**: every record of the batch is framed and sent in order. A
//!   failed send triggers the reconnect policy and the *same* record is sent
//!   again (at-least-once). Stop requests do not cut a batch short, except
//!   while reconnecting: then the unsent tail is returned to the front of the
//!   queue and the worker ends.
//!
//! The worker owns the transport while it runs and hands it back from
//! [`InjectionWorker::run`].

use std::sync::Arc;

use log::{debug, info, warn};

use crate::frame::Frame;
use crate::queue::InjectionQueue;
use crate::reconnect::{Reconnect, ReconnectPolicy};
use crate::record::Record;
use crate::stats::ShipperStats;
use crate::transport::Transport;

pub struct InjectionWorker<T: Transport> {
    transport: T,
    queue: Arc<InjectionQueue>,
    policy: ReconnectPolicy,
    stats: Arc<ShipperStats>,
}

impl<T: Transport> InjectionWorker<T> {
    pub fn new(
        transport: T,
        queue: Arc<InjectionQueue>,
        policy: ReconnectPolicy,
        stats: Arc<ShipperStats>,
    ) -> Self {
        Self {
            transport,
            queue,
            policy,
            stats,
        }
    }

    /// Runs until stopped, then returns the transport.
    pub fn run(mut self) -> T {
        loop {
            debug!("injection worker awaits data");
            let Some(batch) = self.queue.wait_batch() else {
                break;
            };
            debug!("injection worker drained {} record(s)", batch.len());
            if let Err(unsent) = self.deliver(batch) {
                info!("returning {} unsent record(s) to the queue", unsent.len());
                self.queue.requeue_front(unsent);
                break;
            }
            debug!("injection worker sent batch to {}", self.transport.identity());
        }
        info!("injection worker terminated");
        self.transport
    }

    /// Sends a batch in order. On a stop during reconnect, returns the records
    /// that were not delivered, starting with the one being retried.
    fn deliver(&mut self, batch: Vec<Record>) -> Result<(), Vec<Record>> {
        let mut pending = batch.into_iter();
        while let Some(record) = pending.next() {
            let frame = Frame::post(self.transport.identity(), &record);
            while let Err(err) = self.transport.send(frame.as_bytes()) {
                self.stats.record_send_failure();
                warn!("send of {} byte frame failed: {err}", frame.len());
                match self.policy.reconnect(&mut self.transport, self.queue.as_ref()) {
                    Reconnect::Connected { attempts } => {
                        self.stats.record_reconnect_attempts(attempts);
                    }
                    Reconnect::Interrupted { attempts } => {
                        self.stats.record_reconnect_attempts(attempts);
                        let mut unsent = vec![record];
                        unsent.extend(pending);
                        return Err(unsent);
                    }
                }
            }
            self.stats.record_delivery();
        }
        Ok(())
    }
}
