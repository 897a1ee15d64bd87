use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};

use state_shipper::sensor::Sensor;
use state_shipper::{Config, Shipper, TcpTransport, Transport};

const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "state-shipper")]
#[command(about = "Run simulated sensors that ship their state to a remote collector")]
struct Cli {
    /// Number of concurrent sensors (1-4)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    sensors: u8,

    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Collector host name
    #[arg(long)]
    host: Option<String>,

    /// Collector port
    #[arg(long)]
    port: Option<u16>,

    /// Checkpoint file for records still queued at shutdown
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Stop each sensor after this many states (runs until interrupted if unset)
    #[arg(long)]
    states_per_sensor: Option<u64>,

    /// Seconds to wait for the queue to drain before shutting down
    #[arg(long, default_value_t = 5)]
    drain_secs: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(host) = cli.host {
        config.transport.host = host;
    }
    if let Some(port) = cli.port {
        config.transport.port = port;
    }
    if let Some(checkpoint) = cli.checkpoint {
        config.shipper.checkpoint_path = checkpoint;
    }

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&term)).context("failed to hook SIGINT")?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&term)).context("failed to hook SIGTERM")?;

    info!(
        "running {} sensor(s) against {}:{}",
        cli.sensors, config.transport.host, config.transport.port
    );

    let mut transport = TcpTransport::new(config.transport.clone());
    if let Err(err) = transport.connect() {
        warn!("initial connect failed, the worker will retry: {err}");
    }

    let mut shipper =
        Shipper::new(transport, config.shipper).context("failed to create shipper")?;
    let restored = shipper.pending() as u64;
    shipper.start().context("failed to start injection worker")?;

    let sensors = (0..cli.sensors)
        .map(|_| Sensor::new())
        .collect::<state_shipper::Result<Vec<_>>>()
        .context("failed to create sensors")?;

    let produced = AtomicU64::new(0);
    thread::scope(|scope| {
        for sensor in sensors {
            let (shipper, term, produced) = (&shipper, &term, &produced);
            scope.spawn(move || {
                let mut sent = 0u64;
                while !term.load(Ordering::Relaxed) {
                    if cli.states_per_sensor.is_some_and(|limit| sent >= limit) {
                        break;
                    }
                    thread::sleep(sensor.work_interval());
                    match sensor.state() {
                        Ok(state) => {
                            shipper.enqueue(state);
                            produced.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => warn!("sensor {} produced no state: {err}", sensor.id()),
                    }
                    sent += 1;
                }
            });
        }
    });

    let expected = restored + produced.load(Ordering::Relaxed);
    let deadline = Instant::now() + Duration::from_secs(cli.drain_secs);
    while shipper.stats().delivered < expected
        && Instant::now() < deadline
        && !term.load(Ordering::Relaxed)
    {
        thread::sleep(IDLE_POLL);
    }

    let report = shipper.shutdown().context("shutdown failed")?;
    info!("shutdown complete: {}", report.stats.summary());
    Ok(())
}
