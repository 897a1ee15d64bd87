//! Ships producer state records to a single remote collector.
//!
//! Any number of producer threads hand records to a [`Shipper`]. One worker
//! thread drains them in order, wraps each in an HTTP POST frame and writes it
//! to a persistent outbound connection, reconnecting with exponential backoff
//! whenever a send fails. Records still queued at shutdown are written to a
//! checkpoint file and re-queued by the next process start.
//!
//! ```text
//! producers ─enqueue─► InjectionQueue ─drain─► InjectionWorker ─frame─► Transport
//!                          ▲      │                    │ send failed
//!             load at start│      │residue at shutdown ▼
//!                    CheckpointStore◄┘            ReconnectPolicy
//! ```
//!
//! Delivery is at-least-once: a record whose send failed part-way is sent
//! again in full after reconnecting.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod frame;
pub mod queue;
pub mod reconnect;
pub mod record;
#[cfg(feature = "sim")]
pub mod sensor;
pub mod shipper;
pub mod stats;
pub mod transport;
pub mod worker;

pub use checkpoint::CheckpointStore;
pub use config::{BackoffConfig, Config, ShipperConfig, TransportConfig};
pub use error::{ConnectError, Error, Result, SendError};
pub use frame::Frame;
pub use queue::InjectionQueue;
pub use reconnect::{Pause, Reconnect, ReconnectPolicy, ThreadSleep};
pub use record::Record;
pub use shipper::{Shipper, ShutdownReport};
pub use stats::{ShipperStats, StatsSnapshot};
pub use transport::{TcpTransport, Transport};
pub use worker::InjectionWorker;
