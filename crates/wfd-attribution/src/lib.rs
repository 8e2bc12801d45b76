//! wfd-attribution
//!
//! Evidence logic for collection attribution:
//!
//! - [`proximity`] — pure Haversine distance check gating manual collections.
//! - [`cooldown`] — per-bin timestamp lock suppressing repeat attribution.
//! - [`tracker`] — time-windowed correlation of "driver was near this bin"
//!   stamps with later sensor fill-drop reports.
//!
//! Deterministic, pure logic. No IO, no system clock: callers pass `now_ms`.

pub mod cooldown;
pub mod proximity;
pub mod tracker;

pub use cooldown::CooldownRegistry;
pub use proximity::{haversine_meters, verify, ProximityError};
pub use tracker::{AutoAttribution, DelayedAttributionTracker};
