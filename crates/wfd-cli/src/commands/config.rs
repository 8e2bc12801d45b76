use anyhow::Result;

use wfd_config::EngineConfig;

/// `wfd config hash <paths...>`
pub fn hash(paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = wfd_config::load_layered_yaml(&path_refs)?;

    // Validate the typed view so a bad layer fails here, not at daemon boot.
    let cfg = EngineConfig::from_value(&loaded.config_json)?;

    println!("config_hash: {}", loaded.config_hash);
    println!("attribution_window_ms: {}", cfg.attribution_window_ms());
    println!("{}", loaded.canonical_json);
    Ok(())
}
