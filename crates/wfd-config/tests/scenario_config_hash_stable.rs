//! Config hash determinism: same effective config must always produce the
//! same hash regardless of key ordering or layering call count.

use wfd_config::{load_layered_yaml_from_strings, EngineConfig};

const BASE_YAML: &str = r#"
engine:
  sensor_reporting_interval_minutes: 30
  max_collection_distance_meters: 100.0
  cooldown_ms: 7200000
  remote:
    base_url: "http://fleet.example:9090"
    api_key_env: "WFD_REMOTE_TOKEN"
"#;

const BASE_YAML_REORDERED: &str = r#"
engine:
  remote:
    api_key_env: "WFD_REMOTE_TOKEN"
    base_url: "http://fleet.example:9090"
  cooldown_ms: 7200000
  max_collection_distance_meters: 100.0
  sensor_reporting_interval_minutes: 30
"#;

const OVERLAY_YAML: &str = r#"
engine:
  sensor_reporting_interval_minutes: 60
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(original.config_hash, reordered.config_hash);
}

#[test]
fn overlay_changes_hash_and_window() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = EngineConfig::from_value(&layered.config_json).unwrap();
    assert_eq!(cfg.sensor_reporting_interval_minutes, 60);
    assert_eq!(cfg.attribution_window_ms(), 75 * 60_000);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn out_of_range_overlay_rejected_at_typed_load() {
    let overlay = "engine:\n  cooldown_ms: 0\n";
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, overlay]).unwrap();
    assert!(EngineConfig::from_value(&loaded.config_json).is_err());
}
