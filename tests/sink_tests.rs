//! 持久化接口测试

use css_fingerprint::{
    CollatorBuilder, DeviceRecord, FingerprintEntry, FingerprintError, FontCatalog, MemorySink,
    RecordSink, SinkHandler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn catalog() -> FontCatalog {
    FontCatalog::from_list(["Arial", "Georgia", "Verdana"])
}

#[test]
fn test_entry_derives_present_fonts() {
    let mut record = DeviceRecord::new();
    record.apply("font-probe", "Arial", None).unwrap();
    record.apply("lang", "en", None).unwrap();
    record.apply("custom", ("redirect", "A1"), None).unwrap();
    let cycle = record.cycle_id();

    let entry = FingerprintEntry::from_record("1.2.3.4", record, &catalog()).unwrap();
    assert_eq!(entry.address, "1.2.3.4");
    assert_eq!(entry.cycle_id, cycle);
    assert_eq!(entry.custom_properties["redirect"], "A1");

    let fingerprint: serde_json::Value = serde_json::from_str(&entry.fingerprint).unwrap();
    assert_eq!(fingerprint["fonts"]["state"], "present");
    assert_eq!(fingerprint["fonts"]["fonts"], serde_json::json!(["Georgia", "Verdana"]));
    assert_eq!(fingerprint["properties"]["lang"], "en");
}

#[test]
fn test_entry_rejects_derived_record() {
    let mut record = DeviceRecord::new();
    record.fingerprint.derive_present_fonts(["Arial"]).unwrap();

    let err = FingerprintEntry::from_record("1.2.3.4", record, &catalog()).unwrap_err();
    assert!(matches!(err, FingerprintError::AlreadyDerived));
}

#[tokio::test(start_paused = true)]
async fn test_sink_handler_stores_completed_records() {
    let sink = Arc::new(MemorySink::new());
    let handler = SinkHandler::new(Arc::clone(&sink), catalog()).unwrap();
    let collator = CollatorBuilder::new()
        .with_poll_interval(Duration::from_millis(50))
        .build(handler)
        .unwrap();

    collator.insert("1.2.3.4", "font-probe", "Verdana", None).unwrap();
    collator.insert("1.2.3.4", "lang", "en", None).unwrap();
    sleep(Duration::from_millis(100)).await;

    let entries = sink.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].address, "1.2.3.4");
    assert!(entries[0].fingerprint.contains("Georgia"));
    assert!(!entries[0].fingerprint.contains("Verdana"));
}

#[tokio::test(start_paused = true)]
async fn test_sink_handler_skips_small_records() {
    let sink = Arc::new(MemorySink::new());
    let handler = SinkHandler::new(Arc::clone(&sink), catalog())
        .unwrap()
        .with_min_properties(2);
    let collator = CollatorBuilder::new()
        .with_poll_interval(Duration::from_millis(50))
        .build(handler)
        .unwrap();

    collator.insert("10.0.0.1", "lang", "en", None).unwrap();
    collator.insert("10.0.0.2", "lang", "en", None).unwrap();
    collator.insert("10.0.0.2", "tz", "UTC", None).unwrap();
    sleep(Duration::from_millis(100)).await;

    let entries = sink.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].address, "10.0.0.2");
    assert_eq!(collator.stats().deliveries, 2);
}

struct FailingSink {
    attempts: AtomicUsize,
}

#[async_trait::async_trait]
impl RecordSink for FailingSink {
    async fn store(&self, _entry: FingerprintEntry) -> css_fingerprint::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FingerprintError::internal_error("database unavailable"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_failing_sink_is_not_retried() {
    let sink = Arc::new(FailingSink {
        attempts: AtomicUsize::new(0),
    });
    let handler = SinkHandler::new(Arc::clone(&sink), catalog()).unwrap();
    let collator = CollatorBuilder::new()
        .with_poll_interval(Duration::from_millis(50))
        .build(handler)
        .unwrap();

    collator.insert("1.2.3.4", "lang", "en", None).unwrap();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
    assert!(!collator.is_pending("1.2.3.4"));

    // 写入失败不影响该地址的下一个周期
    collator.insert("1.2.3.4", "lang", "fr", None).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_memory_sink() {
    let sink = MemorySink::new();
    assert!(sink.is_empty().await);

    let entry = FingerprintEntry::from_record("1.2.3.4", DeviceRecord::new(), &catalog()).unwrap();
    sink.store(entry.clone()).await.unwrap();
    assert_eq!(sink.len().await, 1);
    assert_eq!(sink.entries().await, vec![entry]);
    assert_eq!(sink.name(), "memory");
}
