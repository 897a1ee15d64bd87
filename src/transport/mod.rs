//! Outbound connection to the collector.
//!
//! The pipeline only needs three capabilities from a transport, captured by
//! [`Transport`]. [`TcpTransport`] is the network implementation; tests inject
//! scripted doubles through the same trait.
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──first writable poll──► Connected
//!      ▲                                                              │
//!      └──────────────── any send error (connection closed) ◄─────────┘
//! ```

pub mod tcp;

pub use tcp::TcpTransport;

use crate::error::{ConnectError, SendError};

pub trait Transport: Send {
    /// Opens a fresh connection, replacing any previous one.
    ///
    /// Makes exactly one attempt; retrying is the caller's job.
    fn connect(&mut self) -> Result<(), ConnectError>;

    /// Transmits all of `bytes`.
    ///
    /// A full outbound buffer is waited out for a bounded time. On any error
    /// the connection is closed and must be re-established before the next
    /// send.
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError>;

    /// Destination identity placed in the `Host` header of every frame.
    /// Fixed at construction.
    fn identity(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<(), ConnectError> {
        (**self).connect()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        (**self).send(bytes)
    }

    fn identity(&self) -> &str {
        (**self).identity()
    }
}
