//! Usage ledger tests: append-only semantics and the JSONL sink.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;

use heimdall::budget::{UsageLedger, UsageRecord};

fn record(provider: &str, cost_usd: f64, status: &str) -> UsageRecord {
    UsageRecord {
        provider: provider.to_owned(),
        operation: "search".to_owned(),
        cost_usd,
        cache_hit: false,
        response_time_ms: 120,
        status: status.to_owned(),
        timestamp: Utc::now(),
        correlation_id: format!("{provider}:search:0000000000000000"),
        unit_tag: None,
    }
}

// ============================================================================
// In-memory ledger
// ============================================================================

#[test]
fn records_append_in_order() {
    let ledger = UsageLedger::in_memory();
    assert!(ledger.is_empty());

    ledger.record(record("places", 0.017, "ok"));
    ledger.record(record("places", 0.0, "timeout"));
    ledger.record(record("llm", 0.002, "ok"));

    let records = ledger.records();
    assert_eq!(ledger.len(), 3);
    assert_eq!(records[0].status, "ok");
    assert_eq!(records[1].status, "timeout");
    assert_eq!(records[2].provider, "llm");
}

#[test]
fn failures_are_recorded_at_zero_cost() {
    let ledger = UsageLedger::in_memory();
    ledger.record(record("places", 0.0, "server_error"));
    let records = ledger.records();
    assert_eq!(records[0].cost_usd, 0.0);
    assert_eq!(records[0].status, "server_error");
}

#[test]
fn total_cost_filters_by_time_and_provider() {
    let ledger = UsageLedger::in_memory();
    let mut old = record("places", 1.0, "ok");
    old.timestamp = Utc::now() - ChronoDuration::hours(48);
    ledger.record(old);
    ledger.record(record("places", 0.25, "ok"));
    ledger.record(record("llm", 0.5, "ok"));

    let since = Utc::now() - ChronoDuration::hours(24);
    assert_eq!(ledger.total_cost_since(since, Some("places")), 0.25);
    assert_eq!(ledger.total_cost_since(since, None), 0.75);
    let all_time = Utc::now() - ChronoDuration::days(365);
    assert_eq!(ledger.total_cost_since(all_time, Some("places")), 1.25);
}

// ============================================================================
// JSONL sink
// ============================================================================

#[test]
fn sink_appends_one_json_line_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.jsonl");

    let ledger = UsageLedger::with_sink(&path).unwrap();
    ledger.record(record("places", 0.017, "ok"));
    ledger.record(record("llm", 0.0, "rate_limited"));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["provider"], "places");
    assert_eq!(first["cost_usd"], 0.017);
    assert_eq!(first["status"], "ok");
    // Absent unit_tag is omitted, not serialized as null.
    assert!(first.get("unit_tag").is_none());

    let second: Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["status"], "rate_limited");
}

#[test]
fn sink_lines_round_trip_as_usage_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.jsonl");

    let ledger = UsageLedger::with_sink(&path).unwrap();
    let mut r = record("payments", 0.3, "ok");
    r.unit_tag = Some("invoice-2209".to_owned());
    ledger.record(r);

    let content = std::fs::read_to_string(&path).unwrap();
    let parsed: UsageRecord = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(parsed.provider, "payments");
    assert_eq!(parsed.unit_tag.as_deref(), Some("invoice-2209"));
    assert_eq!(parsed.response_time(), std::time::Duration::from_millis(120));
}

#[test]
fn sink_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.jsonl");

    {
        let ledger = UsageLedger::with_sink(&path).unwrap();
        ledger.record(record("places", 0.017, "ok"));
    }
    {
        let ledger = UsageLedger::with_sink(&path).unwrap();
        ledger.record(record("places", 0.017, "ok"));
    }

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2, "append mode must not truncate");
}
