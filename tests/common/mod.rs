#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use state_shipper::{ConnectError, SendError, ShipperConfig, Transport};

pub const DELIMITER: &str = "REMOTE_LOGGER_STATE_DEMARCATION";
pub const HOST: &str = "testhost";

#[derive(Debug, Default)]
pub struct CallLog {
    pub connects: usize,
    pub sends: usize,
    pub delivered: Vec<Vec<u8>>,
}

/// Shared view of a transport's calls that survives the transport moving
/// into the worker thread.
#[derive(Clone, Default)]
pub struct Probe(Arc<Mutex<CallLog>>);

impl Probe {
    pub fn log(&self) -> MutexGuard<'_, CallLog> {
        self.0.lock().unwrap()
    }

    pub fn connects(&self) -> usize {
        self.log().connects
    }

    pub fn sends(&self) -> usize {
        self.log().sends
    }

    /// Payloads of successfully sent frames, in send order.
    pub fn payloads(&self) -> Vec<String> {
        self.log()
            .delivered
            .iter()
            .map(|frame| String::from_utf8(payload_of(frame).to_vec()).unwrap())
            .collect()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.log().delivered.clone()
    }

    pub fn wait_for_deliveries(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.log().delivered.len() >= count)
    }

    pub fn wait_for_sends(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.sends() >= count)
    }
}

pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

pub fn payload_of(frame: &[u8]) -> &[u8] {
    let split = frame
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("frame has a header terminator");
    &frame[split + 4..]
}

/// Transport double that plays back scripted outcomes, then falls back to
/// fixed defaults.
pub struct ScriptedTransport {
    connects: VecDeque<bool>,
    sends: VecDeque<bool>,
    connect_default: bool,
    send_default: bool,
    send_delay: Duration,
    panic_on_send: bool,
    probe: Probe,
}

impl ScriptedTransport {
    pub fn reliable(probe: &Probe) -> Self {
        Self {
            connects: VecDeque::new(),
            sends: VecDeque::new(),
            connect_default: true,
            send_default: true,
            send_delay: Duration::ZERO,
            panic_on_send: false,
            probe: probe.clone(),
        }
    }

    pub fn unreachable(probe: &Probe) -> Self {
        Self {
            connect_default: false,
            send_default: false,
            ..Self::reliable(probe)
        }
    }

    pub fn panicking(probe: &Probe) -> Self {
        Self {
            panic_on_send: true,
            ..Self::reliable(probe)
        }
    }

    pub fn with_connects(mut self, outcomes: &[bool]) -> Self {
        self.connects.extend(outcomes);
        self
    }

    pub fn with_sends(mut self, outcomes: &[bool]) -> Self {
        self.sends.extend(outcomes);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self) -> Result<(), ConnectError> {
        self.probe.log().connects += 1;
        if self.connects.pop_front().unwrap_or(self.connect_default) {
            Ok(())
        } else {
            Err(ConnectError::Io(io::ErrorKind::ConnectionRefused.into()))
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        self.probe.log().sends += 1;
        if self.panic_on_send {
            panic!("transport double told to panic");
        }
        if !self.send_delay.is_zero() {
            thread::sleep(self.send_delay);
        }
        if self.sends.pop_front().unwrap_or(self.send_default) {
            self.probe.log().delivered.push(bytes.to_vec());
            Ok(())
        } else {
            Err(SendError::Fatal(io::ErrorKind::ConnectionReset.into()))
        }
    }

    fn identity(&self) -> &str {
        HOST
    }
}

pub fn fast_config(dir: &Path) -> ShipperConfig {
    let mut config = ShipperConfig {
        checkpoint_path: dir.join("remote_logger_data.bin"),
        ..ShipperConfig::default()
    };
    config.backoff.initial_ms = 1;
    config
}
