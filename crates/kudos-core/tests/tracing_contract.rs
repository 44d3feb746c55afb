//! Tracing contract tests: ledger operations emit structured JSON events
//! carrying the fields operators filter on (org, transfer id, amounts),
//! and the sweeper announces its own lifecycle.

use chrono::{Duration as ChronoDuration, Utc};
use kudos_core::{LedgerConfig, Store, SubmitParams, Sweeper};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct MockWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MockWriter {
    fn contents(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }
}

impl std::io::Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MockWriter {
    type Writer = MockWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn setup_capture() -> (MockWriter, tracing::subscriber::DefaultGuard) {
    let writer = MockWriter {
        buf: Arc::new(Mutex::new(Vec::new())),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_env_filter(EnvFilter::new("kudos_core=debug"))
        .json()
        .finish();
    (writer, tracing::subscriber::set_default(subscriber))
}

/// First JSON line whose event message matches.
fn find_event(output: &str, message: &str) -> Option<serde_json::Value> {
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(line) {
            let msg = v
                .get("fields")
                .and_then(|f| f.get("message"))
                .and_then(|m| m.as_str());
            if msg == Some(message) {
                return Some(v);
            }
        }
    }
    None
}

#[test]
fn test_ledger_events_carry_structured_fields() {
    let (writer, _guard) = setup_capture();

    let store = Store::memory(LedgerConfig {
        grace_period_minutes: 0,
        ..LedgerConfig::default()
    })
    .unwrap();
    store.create_org("acme", "Acme").unwrap();
    store.add_member("acme", "alice", "Alice", true).unwrap();
    store.add_member("acme", "bob", "Bob", false).unwrap();
    store.issue("acme", 1000).unwrap();
    let now = Utc::now();
    store
        .open_period("acme", "2026-08", now, now + ChronoDuration::days(30))
        .unwrap();

    let receipt = store
        .submit_transfer(SubmitParams {
            org_id: "acme",
            sender_id: "alice",
            recipient_id: "bob",
            amount: 10,
            reason: None,
            client_ref: None,
        })
        .unwrap();
    store.sweep_due(Utc::now() + ChronoDuration::minutes(1)).unwrap();

    let output = writer.contents();

    let submitted = find_event(&output, "transfer submitted").expect("no submit event");
    assert_eq!(submitted["level"], "INFO");
    let fields = &submitted["fields"];
    assert_eq!(fields["org_id"], "acme");
    assert_eq!(fields["transfer_id"], receipt.transfer_id.as_str());
    assert_eq!(fields["sender_id"], "alice");
    assert_eq!(fields["recipient_id"], "bob");
    assert_eq!(fields["amount"], 10);

    let swept = find_event(&output, "sweep settled transfers").expect("no sweep event");
    assert_eq!(swept["fields"]["auto_approved"], 1);
    assert_eq!(swept["fields"]["realized"], 1);

    // Bootstrap chatter stays at debug.
    let created = find_event(&output, "org created").expect("no org event");
    assert_eq!(created["level"], "DEBUG");
}

#[test]
fn test_noop_sweep_emits_nothing() {
    let (writer, _guard) = setup_capture();

    let store = Store::memory(LedgerConfig::default()).unwrap();
    store.create_org("acme", "Acme").unwrap();
    store.sweep_due(Utc::now()).unwrap();

    assert!(find_event(&writer.contents(), "sweep settled transfers").is_none());
}

#[tokio::test]
async fn test_sweeper_logs_shutdown() {
    let (writer, _guard) = setup_capture();

    let store = Store::memory(LedgerConfig::default()).unwrap();
    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(Sweeper::new(store, Duration::from_millis(10)).run(rx));

    tokio::time::sleep(Duration::from_millis(30)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();

    let stopping = find_event(&writer.contents(), "sweeper stopping").expect("no stop event");
    assert_eq!(stopping["level"], "INFO");
}
