mod common;

use std::time::{Duration, Instant};

use common::{Probe, ScriptedTransport};
use state_shipper::{Error, Shipper, ShipperConfig};

fn default_backoff_config(dir: &std::path::Path) -> ShipperConfig {
    ShipperConfig {
        checkpoint_path: dir.join("remote_logger_data.bin"),
        ..ShipperConfig::default()
    }
}

#[test]
fn idle_worker_stops_promptly() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut shipper = Shipper::new(ScriptedTransport::reliable(&Probe::default()), default_backoff_config(dir.path()))?;
    shipper.start()?;

    let started = Instant::now();
    let report = shipper.shutdown()?;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.checkpointed, 0);
    Ok(())
}

#[test]
fn shutdown_interrupts_reconnect_backoff() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::default();
    // default backoff starts at one second and doubles
    let mut shipper = Shipper::new(ScriptedTransport::unreachable(&probe), default_backoff_config(dir.path()))?;
    shipper.start()?;
    shipper.enqueue("stuck");
    assert!(probe.wait_for_sends(1, Duration::from_secs(5)));

    let started = Instant::now();
    let report = shipper.shutdown()?;
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(report.checkpointed, 1);
    assert_eq!(report.stats.delivered, 0);
    Ok(())
}

#[test]
fn drained_batch_is_finished_before_stopping() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::default();
    let transport = ScriptedTransport::reliable(&probe).with_send_delay(Duration::from_millis(10));
    let mut shipper = Shipper::new(transport, default_backoff_config(dir.path()))?;
    for seq in 0..10 {
        shipper.enqueue(seq.to_string());
    }
    shipper.start()?;
    assert!(probe.wait_for_sends(1, Duration::from_secs(5)));

    let report = shipper.shutdown()?;
    assert_eq!(report.stats.delivered, 10);
    assert_eq!(report.checkpointed, 0);
    assert_eq!(probe.payloads().len(), 10);
    Ok(())
}

#[test]
fn records_queued_after_a_drain_are_checkpointed_not_sent() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::default();
    let transport = ScriptedTransport::reliable(&probe).with_send_delay(Duration::from_millis(200));
    let mut shipper = Shipper::new(transport, default_backoff_config(dir.path()))?;
    shipper.start()?;
    shipper.enqueue("in-flight");
    assert!(probe.wait_for_sends(1, Duration::from_secs(5)));
    shipper.enqueue("late");

    let report = shipper.shutdown()?;
    assert_eq!(probe.payloads(), vec!["in-flight"]);
    assert_eq!(report.checkpointed, 1);
    Ok(())
}

#[test]
fn worker_panic_is_reported() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::default();
    let mut shipper = Shipper::new(ScriptedTransport::panicking(&probe), default_backoff_config(dir.path()))?;
    shipper.start()?;
    shipper.enqueue("boom");
    assert!(probe.wait_for_sends(1, Duration::from_secs(5)));

    assert!(matches!(shipper.shutdown(), Err(Error::WorkerPanicked)));
    Ok(())
}
