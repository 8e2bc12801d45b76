//! wfd-config
//!
//! Layered YAML configuration for the collection engine.
//!
//! - Layers merge in order: earlier documents are base, later documents
//!   override (objects merge recursively, scalars and arrays replace).
//! - The effective config is canonicalized (sorted keys, compact JSON) and
//!   hashed with SHA-256 so runs can be tied to an exact configuration.
//! - Secret-looking literal values are rejected: API keys never live in
//!   config files, only the *name* of the env var that holds them does.
//! - Range validation rejects out-of-range values instead of clamping.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

mod merge;

pub use merge::deep_merge;

/// Literal-value prefixes that indicate a pasted credential. A config layer
/// containing one of these as a leaf string aborts the load.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "glpat-",
    "xoxb-",
    "xoxp-",
];

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote store's REST endpoint.
    pub base_url: String,
    /// Name of the env var holding the API token. Never the token itself.
    pub api_key_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9090".to_string(),
            api_key_env: "WFD_REMOTE_TOKEN".to_string(),
        }
    }
}

/// Operator-tunable engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sensor fleet reporting cadence. Must be in `[5, 120]`.
    pub sensor_reporting_interval_minutes: i64,
    /// Maximum driver-to-bin distance for a manual collection.
    pub max_collection_distance_meters: f64,
    /// Auto-attribution suppression window per bin.
    pub cooldown_ms: i64,
    /// Distance at which a driver location sample counts as "near" a bin.
    pub near_bin_meters: f64,
    /// How long a locally-completed route overrides stale server state.
    pub completion_guard_ms: i64,
    pub remote: RemoteConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sensor_reporting_interval_minutes: 30,
            max_collection_distance_meters: 100.0,
            cooldown_ms: 7_200_000,
            near_bin_meters: 30.0,
            completion_guard_ms: 60_000,
            remote: RemoteConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Deserialize from an effective (merged) config value and validate.
    ///
    /// The engine settings live under the top-level `engine` key; a missing
    /// key yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails on malformed structure or out-of-range values.
    pub fn from_value(effective: &Value) -> Result<Self> {
        let cfg: EngineConfig = match effective.get("engine") {
            Some(section) => serde_json::from_value(section.clone())
                .context("invalid engine config section")?,
            None => EngineConfig::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range checks. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if !(5..=120).contains(&self.sensor_reporting_interval_minutes) {
            bail!(
                "sensor_reporting_interval_minutes must be in [5, 120], got {}",
                self.sensor_reporting_interval_minutes
            );
        }
        if self.max_collection_distance_meters <= 0.0 {
            bail!(
                "max_collection_distance_meters must be positive, got {}",
                self.max_collection_distance_meters
            );
        }
        if self.cooldown_ms <= 0 {
            bail!("cooldown_ms must be positive, got {}", self.cooldown_ms);
        }
        if self.near_bin_meters <= 0.0 {
            bail!("near_bin_meters must be positive, got {}", self.near_bin_meters);
        }
        if self.completion_guard_ms <= 0 {
            bail!(
                "completion_guard_ms must be positive, got {}",
                self.completion_guard_ms
            );
        }
        Ok(())
    }

    /// The delayed-attribution correlation window: reporting interval plus
    /// 15 minutes of transmission/processing slack.
    pub fn attribution_window_ms(&self) -> i64 {
        (self.sensor_reporting_interval_minutes + 15) * 60_000
    }
}

// ---------------------------------------------------------------------------
// Layered loading + hashing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Load and merge YAML files in order, then canonicalize and hash.
///
/// # Errors
///
/// Fails on unreadable files, invalid YAML, or secret literals.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw = fs::read_to_string(p).with_context(|| format!("failed to read config: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// String-input variant of [`load_layered_yaml`] for tests and embedding.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Canonical form: keys sorted recursively, compact output.
pub fn canonicalize_json(v: &Value) -> Result<String> {
    let sorted = sort_keys(v);
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

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut offending: Vec<String> = Vec::new();
    scan_secret_leaves(v, "", &mut offending);
    if !offending.is_empty() {
        bail!(
            "CONFIG_SECRET_DETECTED: {} leaf value(s) look like pasted credentials \
            (first: {}). Move secrets to env vars and reference them by name.",
            offending.len(),
            offending[0]
        );
    }
    Ok(())
}

fn scan_secret_leaves(v: &Value, pointer: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let next = format!("{pointer}/{k}");
                scan_secret_leaves(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{pointer}/{i}");
                scan_secret_leaves(vv, &next, out);
            }
        }
        Value::String(s) => {
            if SECRET_PREFIXES.iter().any(|p| s.starts_with(p)) {
                out.push(pointer.to_string());
            }
        }
        _ => {}
    }
}
