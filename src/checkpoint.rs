//! Durable parking spot for records that were still queued at shutdown.
//!
//! # Format
//!
//! A flat byte stream in which a delimiter token opens and closes every record:
//!
//! ```text
//! D rec0 D rec1 D ... D recN-1 D      (N records, N + 1 delimiters)
//! ```
//!
//! Reading keeps every run of bytes between two consecutive delimiter
//! occurrences and drops whatever precedes the first or follows the last one,
//! so stray leading/trailing bytes from a partial write are discarded without
//! a length prefix or checksum.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::ShipperConfig;
use crate::record::Record;
use crate::{Error, Result};

const TEMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    delimiter: Vec<u8>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, delimiter: impl Into<Vec<u8>>) -> Result<Self> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(Error::Config("checkpoint delimiter must not be empty"));
        }
        Ok(Self {
            path: path.into(),
            delimiter,
        })
    }

    pub fn from_config(config: &ShipperConfig) -> Result<Self> {
        Self::new(config.checkpoint_path.clone(), config.delimiter.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn serialize(&self, records: &[Record]) -> Vec<u8> {
        let body: usize = records.iter().map(Record::len).sum();
        let mut out = Vec::with_capacity(body + self.delimiter.len() * (records.len() + 1));
        out.extend_from_slice(&self.delimiter);
        for record in records {
            out.extend_from_slice(record.as_bytes());
            out.extend_from_slice(&self.delimiter);
        }
        out
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Vec<Record> {
        let mut records = Vec::new();
        let Some(mut open) = find(bytes, &self.delimiter, 0) else {
            return records;
        };
        loop {
            let start = open + self.delimiter.len();
            let Some(close) = find(bytes, &self.delimiter, start) else {
                break;
            };
            records.push(Record::from(&bytes[start..close]));
            open = close;
        }
        records
    }

    /// Reads, decodes and removes the checkpoint file.
    ///
    /// A missing file yields no records. Removal failures are logged only: the
    /// records are still returned and may replay on the next start.
    pub fn load(&self) -> Result<Vec<Record>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        };
        info!("reading checkpoint {}", self.path.display());
        let records = self.deserialize(&bytes);
        debug!("recovered {} record(s) from checkpoint", records.len());
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(
                "could not remove checkpoint {}: {err}",
                self.path.display()
            );
        }
        Ok(records)
    }

    /// Writes `records` over any existing checkpoint.
    pub fn save(&self, records: &[Record]) -> Result<()> {
        info!(
            "writing {} record(s) to checkpoint {}",
            records.len(),
            self.path.display()
        );
        let tmp_path = self.temp_path();
        let mut file = File::create(&tmp_path)?;
        file.write_all(&self.serialize(records))?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(TEMP_SUFFIX);
        self.path.with_file_name(name)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
