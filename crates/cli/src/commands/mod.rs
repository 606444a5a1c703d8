pub mod prepare_model;
pub mod serve;
pub mod status;

use std::path::Path;

use deepresearch_config::AppConfig;

/// Resolve configuration from `path` (or the default location) plus
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}
