//! Simulated sensor producing JSON state snapshots.

use std::time::Duration;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, Result};

const ID_LEN: usize = 32;
const HEX: &[u8; 16] = b"0123456789ABCDEF";
const EVENT_TYPES: [&str; 5] = ["nominal", "info", "warning", "error", "critical"];
const EVENT_WEIGHTS: [u32; 5] = [60, 24, 10, 5, 1];
const MIN_WORK_MS: u64 = 100;
const MAX_WORK_MS: u64 = 1500;

#[derive(Debug, Serialize)]
struct SensorState<'a> {
    id: &'a str,
    event: SensorEvent,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct SensorEvent {
    #[serde(rename = "type")]
    kind: &'static str,
    readings: [u8; 3],
}

pub struct Sensor {
    id: String,
    events: WeightedIndex<u32>,
}

impl Sensor {
    /// Creates a sensor with a random 32-character hex id.
    pub fn new() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let id: String = (0..ID_LEN)
            .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
            .collect();
        log::info!("created sensor {id}");
        Self::with_id(id)
    }

    pub fn with_id(id: impl Into<String>) -> Result<Self> {
        let events = WeightedIndex::new(EVENT_WEIGHTS)
            .map_err(|_| Error::Config("sensor event weights must be positive"))?;
        Ok(Self {
            id: id.into(),
            events,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// How long the next unit of simulated work takes.
    pub fn work_interval(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(MIN_WORK_MS..MAX_WORK_MS))
    }

    /// Serializes the current state as pretty-printed JSON.
    pub fn state(&self) -> Result<String> {
        let mut rng = rand::thread_rng();
        let state = SensorState {
            id: &self.id,
            event: SensorEvent {
                kind: EVENT_TYPES[self.events.sample(&mut rng)],
                readings: [
                    rng.gen_range(0..=100),
                    rng.gen_range(0..=100),
                    rng.gen_range(0..=100),
                ],
            },
            timestamp: format_timestamp(OffsetDateTime::now_utc()),
        };
        Ok(serde_json::to_string_pretty(&state)?)
    }
}

fn format_timestamp(dt: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        dt.year(),
        dt.month() as u8,
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}
