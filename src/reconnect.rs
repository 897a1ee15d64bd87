use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::config::BackoffConfig;
use crate::transport::Transport;

/// Interruptible sleep used between reconnect attempts.
pub trait Pause {
    /// Sleeps for `delay`. Returns `false` if the sleep was cut short by a
    /// stop request.
    fn pause(&self, delay: Duration) -> bool;
}

/// Plain uninterruptible sleep.
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, delay: Duration) -> bool {
        thread::sleep(delay);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    Connected { attempts: u32 },
    Interrupted { attempts: u32 },
}

/// Exponential backoff around [`Transport::connect`].
///
/// Retries without limit. The delay doubles after every attempt and is only
/// capped when a ceiling is configured.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Option<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, max: Option<Duration>) -> Self {
        Self { initial, max }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial(), config.max())
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Delay that follows `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let doubled = current.saturating_mul(2);
        match self.max {
            Some(max) => doubled.min(max),
            None => doubled,
        }
    }

    /// Sleeps, then tries to connect, until a connection is up or `pause`
    /// reports a stop.
    pub fn reconnect<T, P>(&self, transport: &mut T, pause: &P) -> Reconnect
    where
        T: Transport + ?Sized,
        P: Pause + ?Sized,
    {
        warn!("no connection to {}, reconnecting", transport.identity());
        let mut delay = self.initial;
        let mut attempts = 0u32;
        loop {
            info!("backing off for {delay:?} before connecting");
            if !pause.pause(delay) {
                info!("reconnect abandoned after {attempts} attempt(s): stop requested");
                return Reconnect::Interrupted { attempts };
            }
            delay = self.next_delay(delay);
            attempts = attempts.saturating_add(1);
            match transport.connect() {
                Ok(()) => {
                    info!(
                        "connection to {} re-established after {attempts} attempt(s)",
                        transport.identity()
                    );
                    return Reconnect::Connected { attempts };
                }
                Err(err) => warn!("connect attempt {attempts} failed: {err}"),
            }
        }
    }
}
