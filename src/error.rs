use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Config(&'static str),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("injection worker panicked")]
    WorkerPanicked,
    #[error("shipper already stopped")]
    AlreadyStopped,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to (re)establish the outbound connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("could not resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },
    #[error("{host} resolved to no usable address")]
    NoAddress { host: String },
    #[error("connect failed: {0}")]
    Io(#[from] io::Error),
}

/// Failure to hand a frame to the transport.
///
/// Every variant leaves the connection closed; the caller is expected to
/// reconnect before sending again.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    #[error("outbound buffer stayed full for {0:?}")]
    Backpressure(Duration),
    #[error("transport failure: {0}")]
    Fatal(#[from] io::Error),
}

impl SendError {
    pub fn is_backpressure(&self) -> bool {
        matches!(self, SendError::Backpressure(_))
    }
}
