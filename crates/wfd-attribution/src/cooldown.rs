//! Per-bin attribution cooldown.
//!
//! A single physical empty-bin event must not be counted twice: multiple
//! sensor readings or proximity pings can arrive in quick succession, and a
//! manual mark-collected can be followed by the sensor report for the same
//! emptying tens of minutes later. The registry stamps the last attribution
//! per bin and suppresses further auto-attribution inside the window.
//!
//! Entries are garbage-collected lazily; no background timer exists.

use std::collections::BTreeMap;

use wfd_schemas::BinId;

/// Per-bin timestamp lock. Callers supply `now_ms`; the registry never reads
/// a clock.
#[derive(Debug, Clone, Default)]
pub struct CooldownRegistry {
    last_attributed_ms: BTreeMap<BinId, i64>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while `now_ms - last_attributed < cooldown_ms`.
    ///
    /// The window is half-open: at exactly `last + cooldown_ms` the bin is no
    /// longer in cooldown and attribution may fire again.
    pub fn is_in_cooldown(&self, bin_id: &str, now_ms: i64, cooldown_ms: i64) -> bool {
        match self.last_attributed_ms.get(bin_id) {
            Some(&last) => now_ms - last < cooldown_ms,
            None => false,
        }
    }

    /// Stamp an attribution for the bin at `now_ms`.
    pub fn set_cooldown(&mut self, bin_id: impl Into<BinId>, now_ms: i64) {
        self.last_attributed_ms.insert(bin_id.into(), now_ms);
    }

    /// Drop entries whose window has fully elapsed, keeping the map bounded.
    pub fn prune_expired(&mut self, now_ms: i64, cooldown_ms: i64) {
        self.last_attributed_ms
            .retain(|_, &mut last| now_ms - last < cooldown_ms);
    }

    pub fn len(&self) -> usize {
        self.last_attributed_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_attributed_ms.is_empty()
    }
}
