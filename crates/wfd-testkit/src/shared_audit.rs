//! In-memory audit sink with a shared inspection handle.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use wfd_audit::{AuditEvent, AuditSink, MemoryAudit};

/// Wraps [`MemoryAudit`] behind an `Arc<Mutex<..>>` so scenario tests keep a
/// query handle after boxing the sink into the engine.
#[derive(Clone, Debug, Default)]
pub struct SharedAudit {
    inner: Arc<Mutex<MemoryAudit>>,
}

impl SharedAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().expect("audit lock").events().to_vec()
    }

    pub fn events_for_topic(&self, topic: &str) -> Vec<AuditEvent> {
        self.inner
            .lock()
            .expect("audit lock")
            .events_for_topic(topic)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn count_type(&self, event_type: &str) -> usize {
        self.inner.lock().expect("audit lock").count_type(event_type)
    }
}

impl AuditSink for SharedAudit {
    fn append(
        &mut self,
        run_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        self.inner
            .lock()
            .expect("audit lock")
            .append(run_id, topic, event_type, payload)
    }
}
