//! Deterministic event replay.
//!
//! Input is JSONL, one event per line, each stamped with `at_ms`. The engine
//! runs on a scripted clock set to each event's timestamp before dispatch,
//! and on a replay remote that applies pushes verbatim — so a replay of the
//! same file always produces the same final state, byte for byte.

use std::fs;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use wfd_audit::{AuditSink, JsonlAuditWriter, MemoryAudit};
use wfd_config::EngineConfig;
use wfd_runtime::CollectionEngine;
use wfd_schemas::{
    Bin, BinLevelReading, Driver, DriverLocationSample, ManualCollectionRequest, RemoteSnapshot,
    Route, RouteStatus, StateDelta,
};
use wfd_sync::{RemoteStore, SyncError};

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReplayEvent {
    SeedBin { at_ms: i64, bin: Bin },
    SeedDriver { at_ms: i64, driver: Driver },
    SeedRoute { at_ms: i64, route: Route },
    Location { at_ms: i64, sample: DriverLocationSample },
    SensorReport {
        at_ms: i64,
        prev: Vec<BinLevelReading>,
        new: Vec<BinLevelReading>,
    },
    ManualCollection {
        at_ms: i64,
        bin_id: String,
        driver_id: String,
    },
    SyncCycle { at_ms: i64 },
}

impl ReplayEvent {
    fn at_ms(&self) -> i64 {
        match self {
            ReplayEvent::SeedBin { at_ms, .. }
            | ReplayEvent::SeedDriver { at_ms, .. }
            | ReplayEvent::SeedRoute { at_ms, .. }
            | ReplayEvent::Location { at_ms, .. }
            | ReplayEvent::SensorReport { at_ms, .. }
            | ReplayEvent::ManualCollection { at_ms, .. }
            | ReplayEvent::SyncCycle { at_ms } => *at_ms,
        }
    }
}

/// Remote double for replay: pushes always succeed and are folded into the
/// snapshot served back, mimicking a perfectly consistent server.
#[derive(Default)]
struct ReplayRemote {
    state: RemoteSnapshot,
}

impl RemoteStore for ReplayRemote {
    fn push_partial(&mut self, delta: &StateDelta) -> Result<(), SyncError> {
        for bin in &delta.bins {
            self.state.bins.retain(|b| b.id != bin.id);
            self.state.bins.push(bin.clone());
        }
        for route in &delta.routes {
            self.state.routes.retain(|r| r.id != route.id);
            self.state.routes.push(route.clone());
        }
        self.state.collections.extend(delta.collections.iter().cloned());
        Ok(())
    }

    fn pull_full(&mut self) -> Result<RemoteSnapshot, SyncError> {
        Ok(self.state.clone())
    }
}

/// `wfd replay --events <jsonl> [--config <paths...>] [--audit-out <path>]`
pub fn run(events_path: &str, config_paths: &[String], audit_out: Option<&str>) -> Result<()> {
    let cfg = load_config(config_paths)?;

    let audit: Box<dyn AuditSink> = match audit_out {
        Some(path) => Box::new(JsonlAuditWriter::new(path)?),
        None => Box::new(MemoryAudit::new()),
    };

    let now = Arc::new(AtomicI64::new(0));
    let clock_handle = Arc::clone(&now);
    let mut engine = CollectionEngine::new(
        cfg,
        audit,
        Box::new(ReplayRemote::default()),
        Box::new(move || clock_handle.load(Ordering::SeqCst)),
    );

    let raw = fs::read_to_string(events_path)
        .with_context(|| format!("read events file: {events_path}"))?;

    let mut refused = 0usize;
    let mut skipped_attributions = 0usize;
    for (i, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse event at line {}", i + 1))?;
        now.store(event.at_ms(), Ordering::SeqCst);

        match event {
            ReplayEvent::SeedBin { bin, .. } => engine.seed_bin(bin),
            ReplayEvent::SeedDriver { driver, .. } => engine.seed_driver(driver),
            ReplayEvent::SeedRoute { route, .. } => engine.seed_route(route),
            ReplayEvent::Location { sample, .. } => {
                engine.handle_location_sample(sample);
            }
            ReplayEvent::SensorReport { prev, new, .. } => {
                let outcome = engine.handle_sensor_report(&prev, &new);
                skipped_attributions += outcome.skipped_bins.len();
            }
            ReplayEvent::ManualCollection {
                bin_id, driver_id, ..
            } => {
                if engine
                    .handle_manual_collection(ManualCollectionRequest { bin_id, driver_id })
                    .is_err()
                {
                    refused += 1;
                }
            }
            ReplayEvent::SyncCycle { .. } => {
                engine.sync_cycle();
            }
        }
    }

    let store = engine.store();
    let completed_routes = store
        .routes()
        .filter(|r| r.status == RouteStatus::Completed)
        .count();
    let auto = store.collections().iter().filter(|c| c.auto_collection).count();

    println!("events_file: {events_path}");
    println!("collections: {}", store.collections().len());
    println!("  auto: {auto}");
    println!("  manual: {}", store.collections().len() - auto);
    println!("refused_manual_requests: {refused}");
    println!("skipped_attributions: {skipped_attributions}");
    println!("completed_routes: {completed_routes}");
    Ok(())
}

fn load_config(config_paths: &[String]) -> Result<EngineConfig> {
    if config_paths.is_empty() {
        return Ok(EngineConfig::default());
    }
    let path_refs: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let loaded = wfd_config::load_layered_yaml(&path_refs)?;
    EngineConfig::from_value(&loaded.config_json)
}
