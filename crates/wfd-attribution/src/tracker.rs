//! Delayed attribution: correlating proximity with late sensor reports.
//!
//! Sensor fill-level reports arrive tens of minutes after the physical
//! emptying. The tracker stamps "a driver was near this bin" as it happens
//! and, when a later report shows the bin's fill dropping to empty, decides
//! whether the drop is attributable: the proximity stamp must fall inside the
//! correlation window and the bin must not be in cooldown.
//!
//! The tracker emits [`AutoAttribution`] decisions; the runtime records the
//! actual collections. On every decision the cooldown is stamped and the
//! proximity entry consumed, so one physical event yields one decision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wfd_schemas::{BinId, BinLevelReading};

use crate::cooldown::CooldownRegistry;

/// Fill level at or below which a bin counts as "just emptied".
pub const EMPTY_FILL_THRESHOLD: u8 = 5;

/// A sensor fill-drop the tracker decided to attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoAttribution {
    pub bin_id: BinId,
    /// Age of the consumed proximity stamp at decision time.
    pub proximity_age_ms: i64,
}

/// Correlates near-bin stamps with later fill-drop reports.
///
/// Stamps are keyed by bin only, not by driver. If two drivers pass the same
/// bin inside the window, a later decision may credit the wrong one. That
/// ambiguity is inherited behavior, kept deliberately; resolving it would
/// need driver-keyed evidence the proximity watch does not produce.
#[derive(Debug, Clone, Default)]
pub struct DelayedAttributionTracker {
    near_bin_ms: BTreeMap<BinId, i64>,
}

impl DelayedAttributionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp "a driver is near this bin, now". Re-stamping refreshes the
    /// timestamp.
    pub fn record_proximity(&mut self, bin_id: impl Into<BinId>, now_ms: i64) {
        self.near_bin_ms.insert(bin_id.into(), now_ms);
    }

    /// Number of live proximity stamps (stale ones included until pruned).
    pub fn pending(&self) -> usize {
        self.near_bin_ms.len()
    }

    /// Process a before/after sensor report pair.
    ///
    /// For every bin whose fill transitions from above
    /// [`EMPTY_FILL_THRESHOLD`] (or unknown) to at/below it, a decision fires
    /// iff a proximity stamp no older than `window_ms` exists and the bin is
    /// not in cooldown. Firing stamps the cooldown and consumes the proximity
    /// entry. Stale stamps are pruned on every invocation so the map stays
    /// bounded.
    pub fn on_sensor_report(
        &mut self,
        prev: &[BinLevelReading],
        new: &[BinLevelReading],
        now_ms: i64,
        window_ms: i64,
        cooldown_ms: i64,
        cooldowns: &mut CooldownRegistry,
    ) -> Vec<AutoAttribution> {
        let prev_levels: BTreeMap<&str, u8> = prev
            .iter()
            .map(|r| (r.bin_id.as_str(), r.fill_level))
            .collect();

        let mut decisions = Vec::new();
        for reading in new {
            if reading.fill_level > EMPTY_FILL_THRESHOLD {
                continue;
            }
            // Unknown previous level counts as a drop: the first report after
            // an emptying may be the first we hear of the bin at all.
            let was_filled = prev_levels
                .get(reading.bin_id.as_str())
                .map(|&lvl| lvl > EMPTY_FILL_THRESHOLD)
                .unwrap_or(true);
            if !was_filled {
                continue;
            }

            let Some(&stamped_ms) = self.near_bin_ms.get(&reading.bin_id) else {
                continue;
            };
            let age_ms = now_ms - stamped_ms;
            if age_ms > window_ms {
                continue;
            }
            if cooldowns.is_in_cooldown(&reading.bin_id, now_ms, cooldown_ms) {
                continue;
            }

            cooldowns.set_cooldown(reading.bin_id.clone(), now_ms);
            self.near_bin_ms.remove(&reading.bin_id);
            decisions.push(AutoAttribution {
                bin_id: reading.bin_id.clone(),
                proximity_age_ms: age_ms,
            });
        }

        self.prune_stale(now_ms, window_ms);
        decisions
    }

    /// Drop stamps older than the correlation window.
    pub fn prune_stale(&mut self, now_ms: i64, window_ms: i64) {
        self.near_bin_ms.retain(|_, &mut ts| now_ms - ts <= window_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_MS: i64 = 45 * 60_000; // 30min interval + 15min slack
    const COOLDOWN_MS: i64 = 7_200_000;

    fn reading(bin: &str, fill: u8) -> BinLevelReading {
        BinLevelReading {
            bin_id: bin.to_string(),
            fill_level: fill,
        }
    }

    #[test]
    fn drop_inside_window_fires_once() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();
        tracker.record_proximity("B2", 0);

        // Report 40 minutes later: 80% -> 3%.
        let t1 = 40 * 60_000;
        let decisions = tracker.on_sensor_report(
            &[reading("B2", 80)],
            &[reading("B2", 3)],
            t1,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].bin_id, "B2");
        assert_eq!(decisions[0].proximity_age_ms, t1);
        assert!(cooldowns.is_in_cooldown("B2", t1, COOLDOWN_MS));

        // A second drop report one minute later is suppressed by cooldown.
        let t2 = 41 * 60_000;
        let again = tracker.on_sensor_report(
            &[reading("B2", 3)],
            &[reading("B2", 2)],
            t2,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert!(again.is_empty());
    }

    #[test]
    fn drop_outside_window_never_fires() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();
        tracker.record_proximity("B1", 0);

        let decisions = tracker.on_sensor_report(
            &[reading("B1", 90)],
            &[reading("B1", 0)],
            WINDOW_MS + 1,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert!(decisions.is_empty());
        // The stale stamp is pruned by the same invocation.
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn boundary_age_still_fires() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();
        tracker.record_proximity("B1", 0);

        let decisions = tracker.on_sensor_report(
            &[reading("B1", 90)],
            &[reading("B1", 0)],
            WINDOW_MS,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn no_drop_no_decision() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();
        tracker.record_proximity("B1", 0);

        // 80% -> 60% is not an emptying.
        let decisions = tracker.on_sensor_report(
            &[reading("B1", 80)],
            &[reading("B1", 60)],
            1_000,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert!(decisions.is_empty());
        assert_eq!(tracker.pending(), 1);
    }

    #[test]
    fn already_empty_bin_does_not_refire() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();
        tracker.record_proximity("B1", 0);

        // 4% -> 2%: was already at/below the threshold.
        let decisions = tracker.on_sensor_report(
            &[reading("B1", 4)],
            &[reading("B1", 2)],
            1_000,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert!(decisions.is_empty());
    }

    #[test]
    fn unknown_previous_level_counts_as_drop() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();
        tracker.record_proximity("B1", 0);

        let decisions = tracker.on_sensor_report(
            &[],
            &[reading("B1", 0)],
            1_000,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn no_proximity_no_attribution() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();

        let decisions = tracker.on_sensor_report(
            &[reading("B1", 80)],
            &[reading("B1", 0)],
            1_000,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert!(decisions.is_empty());
    }

    #[test]
    fn proximity_entry_consumed_on_fire() {
        let mut tracker = DelayedAttributionTracker::new();
        let mut cooldowns = CooldownRegistry::new();
        tracker.record_proximity("B1", 0);

        tracker.on_sensor_report(
            &[reading("B1", 80)],
            &[reading("B1", 0)],
            1_000,
            WINDOW_MS,
            COOLDOWN_MS,
            &mut cooldowns,
        );
        assert_eq!(tracker.pending(), 0);
    }
}
