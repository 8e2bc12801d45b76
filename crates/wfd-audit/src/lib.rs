//! wfd-audit
//!
//! Append-only audit trail. One event per line, canonical JSON (keys sorted
//! recursively, compact output) so logs diff and grep cleanly.
//!
//! Topics carry the per-driver and per-bin history streams:
//! `driver/<id>`, `bin/<id>`, plus `engine` for flow-level events. A single
//! physical event may fan out to several topics (a collection appends to both
//! the driver's and the bin's history).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// Identifies one engine process lifetime.
    pub run_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    /// History stream: `driver/<id>`, `bin/<id>`, or `engine`.
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
}

/// Topic helpers, so call sites never hand-format the stream names.
pub fn driver_topic(driver_id: &str) -> String {
    format!("driver/{driver_id}")
}

pub fn bin_topic(bin_id: &str) -> String {
    format!("bin/{bin_id}")
}

pub const ENGINE_TOPIC: &str = "engine";

/// Sink for audit events. The engine holds one `dyn AuditSink`; production
/// wires [`JsonlAuditWriter`], tests wire [`MemoryAudit`].
pub trait AuditSink: Send {
    /// Append one event.
    ///
    /// # Errors
    ///
    /// IO failure in file-backed sinks. The engine treats a failed audit
    /// append as non-fatal (logged, flow continues).
    fn append(&mut self, run_id: Uuid, topic: &str, event_type: &str, payload: Value)
        -> Result<AuditEvent>;
}

// ---------------------------------------------------------------------------
// JSONL writer
// ---------------------------------------------------------------------------

/// File-backed sink. Creates parent directories on construction, appends one
/// canonical JSON line per event.
pub struct JsonlAuditWriter {
    path: PathBuf,
    seq: u64,
}

impl JsonlAuditWriter {
    /// # Errors
    ///
    /// Fails when the parent directory cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
        }
        Ok(Self { path, seq: 0 })
    }

    /// Events appended so far in this process lifetime.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl AuditSink for JsonlAuditWriter {
    fn append(
        &mut self,
        run_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        let ev = AuditEvent {
            event_id: Uuid::new_v4(),
            run_id,
            ts_utc: Utc::now(),
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
        };
        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;
        self.seq += 1;
        Ok(ev)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {path:?}"))?;
    f.write_all(line.as_bytes()).context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Canonicalize by sorting keys recursively and emitting compact JSON.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Read a JSONL audit file back into events.
///
/// # Errors
///
/// Fails on unreadable files or unparseable lines.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let ev: AuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;
        out.push(ev);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Test sink: keeps every event in memory with query helpers for assertions.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Vec<AuditEvent>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn events_for_topic(&self, topic: &str) -> Vec<&AuditEvent> {
        self.events.iter().filter(|e| e.topic == topic).collect()
    }

    pub fn count_type(&self, event_type: &str) -> usize {
        self.events.iter().filter(|e| e.event_type == event_type).count()
    }
}

impl AuditSink for MemoryAudit {
    fn append(
        &mut self,
        run_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        let ev = AuditEvent {
            event_id: Uuid::new_v4(),
            run_id,
            ts_utc: Utc::now(),
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
        };
        self.events.push(ev.clone());
        Ok(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn jsonl_round_trip_and_canonical_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("trail.jsonl");
        let run_id = Uuid::new_v4();

        let mut w = JsonlAuditWriter::new(&path).unwrap();
        w.append(
            run_id,
            &bin_topic("B1"),
            "collection.recorded",
            json!({ "zeta": 1, "alpha": 2 }),
        )
        .unwrap();
        w.append(run_id, ENGINE_TOPIC, "sync.push_failed", json!({})).unwrap();
        assert_eq!(w.seq(), 2);

        let events = read_jsonl(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].topic, "bin/B1");
        assert_eq!(events[0].event_type, "collection.recorded");

        // Canonical output: keys sorted within each line.
        let raw = std::fs::read_to_string(&path).unwrap();
        let first_line = raw.lines().next().unwrap();
        let alpha = first_line.find("\"alpha\"").unwrap();
        let zeta = first_line.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn memory_audit_queries() {
        let run_id = Uuid::new_v4();
        let mut sink = MemoryAudit::new();
        sink.append(run_id, &driver_topic("D1"), "collection.recorded", json!({}))
            .unwrap();
        sink.append(run_id, &driver_topic("D2"), "collection.recorded", json!({}))
            .unwrap();

        assert_eq!(sink.events_for_topic("driver/D1").len(), 1);
        assert_eq!(sink.count_type("collection.recorded"), 2);
    }
}
