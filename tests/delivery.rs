mod common;

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use common::{fast_config, Probe, ScriptedTransport, HOST};
use state_shipper::Shipper;

const PRODUCERS: usize = 4;
const RECORDS_PER_PRODUCER: usize = 50;

#[test]
fn concurrent_producers_deliver_every_record_once_in_order() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::default();
    let mut shipper = Shipper::new(ScriptedTransport::reliable(&probe), fast_config(dir.path()))?;
    shipper.start()?;

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let shipper = &shipper;
            scope.spawn(move || {
                for seq in 0..RECORDS_PER_PRODUCER {
                    shipper.enqueue(format!("{producer}:{seq}"));
                }
            });
        }
    });

    let total = PRODUCERS * RECORDS_PER_PRODUCER;
    assert!(probe.wait_for_deliveries(total, Duration::from_secs(10)));
    let report = shipper.shutdown()?;

    assert_eq!(report.checkpointed, 0);
    assert_eq!(report.stats.delivered, total as u64);
    assert_eq!(report.stats.send_failures, 0);
    assert!(!dir.path().join("remote_logger_data.bin").exists());

    let payloads = probe.payloads();
    assert_eq!(payloads.len(), total);
    let unique: HashSet<&String> = payloads.iter().collect();
    assert_eq!(unique.len(), total, "duplicate deliveries");

    let mut next_seq = [0usize; PRODUCERS];
    for payload in &payloads {
        let (producer, seq) = payload.split_once(':').unwrap();
        let producer: usize = producer.parse().unwrap();
        let seq: usize = seq.parse().unwrap();
        assert_eq!(seq, next_seq[producer], "producer {producer} out of order");
        next_seq[producer] += 1;
    }
    Ok(())
}

#[test]
fn frames_carry_identity_and_content_length() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::default();
    let mut shipper = Shipper::new(ScriptedTransport::reliable(&probe), fast_config(dir.path()))?;
    shipper.start()?;

    let state = r#"{"id":"ABC","event":{"type":"nominal","readings":[1,2,3]}}"#;
    shipper.enqueue(state);
    assert!(probe.wait_for_deliveries(1, Duration::from_secs(5)));
    shipper.shutdown()?;

    let expected = format!(
        "POST / HTTP/1.1\r\nHost: {HOST}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{state}",
        state.len()
    );
    assert_eq!(probe.frames(), vec![expected.into_bytes()]);
    Ok(())
}

#[test]
fn records_enqueued_across_batches_keep_fifo_order() -> state_shipper::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::default();
    let transport = ScriptedTransport::reliable(&probe).with_send_delay(Duration::from_millis(2));
    let mut shipper = Shipper::new(transport, fast_config(dir.path()))?;
    shipper.start()?;

    for seq in 0..30 {
        shipper.enqueue(seq.to_string());
        if seq % 7 == 0 {
            thread::sleep(Duration::from_millis(5));
        }
    }
    assert!(probe.wait_for_deliveries(30, Duration::from_secs(10)));
    shipper.shutdown()?;

    let expected: Vec<String> = (0..30).map(|seq| seq.to_string()).collect();
    assert_eq!(probe.payloads(), expected);
    Ok(())
}
