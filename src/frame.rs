//! HTTP POST envelope placed around a record for one transmission attempt.
//!
//! ```text
//! POST / HTTP/1.1\r\n
//! Host: <identity>\r\n
//! Content-Type: application/json\r\n
//! Content-Length: <payload bytes>\r\n
//! \r\n
//! <payload>
//! ```
//!
//! Frames are built by the worker right before sending and are never persisted.

use crate::record::Record;

const REQUEST_LINE: &[u8] = b"POST / HTTP/1.1\r\n";
const CONTENT_TYPE: &[u8] = b"Content-Type: application/json\r\n";

pub struct Frame {
    bytes: Vec<u8>,
    header_len: usize,
}

impl Frame {
    pub fn post(identity: &str, record: &Record) -> Self {
        let payload = record.as_bytes();
        let mut bytes = Vec::with_capacity(96 + identity.len() + payload.len());
        bytes.extend_from_slice(REQUEST_LINE);
        bytes.extend_from_slice(format!("Host: {identity}\r\n").as_bytes());
        bytes.extend_from_slice(CONTENT_TYPE);
        bytes.extend_from_slice(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes());
        let header_len = bytes.len();
        bytes.extend_from_slice(payload);
        Self { bytes, header_len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header(&self) -> &[u8] {
        &self.bytes[..self.header_len]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.header_len..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
