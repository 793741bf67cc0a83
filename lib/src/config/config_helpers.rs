// lib/src/config/config_helpers.rs
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use serde_json::Value;
use serde_yaml2 as serde_yaml;

use crate::config::config_defaults::{DEFAULT_CONFIG_PATH_RELATIVE, MAPS_API_KEY_ENV};
use crate::config::config_structs::DispatchConfig;

/// Loads the dispatch config. A missing file is not an error: defaults are
/// used so the engine can still run on the geometric fallback.
pub fn load_dispatch_config(config_file_path: Option<&Path>) -> Result<DispatchConfig> {
    let path_to_use = config_file_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH_RELATIVE));

    info!("Attempting to load dispatch config from {:?}", path_to_use);

    let config = if path_to_use.exists() {
        let config_content = fs::read_to_string(&path_to_use)
            .context(format!("Failed to read dispatch config file: {}", path_to_use.display()))?;
        debug!("Dispatch config content: {}", config_content);
        parse_dispatch_config(&config_content)
            .context(format!("Failed to parse dispatch config YAML: {}", path_to_use.display()))?
    } else {
        warn!("Config file not found at {}. Using default dispatch config.", path_to_use.display());
        DispatchConfig::default()
    };

    Ok(apply_env_overrides(config))
}

pub fn parse_dispatch_config(config_content: &str) -> Result<DispatchConfig> {
    serde_yaml::from_str::<DispatchConfig>(config_content).map_err(|e| {
        error!("YAML parsing error for dispatch config: {:?}", e);
        if let Ok(partial) = serde_yaml::from_str::<Value>(config_content) {
            error!("Partial YAML parse: {:?}", partial);
        }
        anyhow!("invalid dispatch config: {:?}", e)
    })
}

pub fn apply_env_overrides(config: DispatchConfig) -> DispatchConfig {
    apply_api_key_override(config, std::env::var(MAPS_API_KEY_ENV).ok())
}

fn apply_api_key_override(mut config: DispatchConfig, api_key: Option<String>) -> DispatchConfig {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        info!("Using distance-matrix API key from {}", MAPS_API_KEY_ENV);
        config.distance_matrix.api_key = Some(key);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_defaults::*;
    use crate::config::config_structs::StorageEngineType;

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = "assignment:\n  max_redirects: 5\nstorage:\n  engine: inmemory\n";
        let config = parse_dispatch_config(yaml).unwrap();
        assert_eq!(config.assignment.max_redirects, 5);
        assert_eq!(config.assignment.store_timeout_ms, DEFAULT_STORE_TIMEOUT_MS);
        assert_eq!(config.storage.engine, StorageEngineType::InMemory);
        assert_eq!(config.distance_matrix.endpoint, DEFAULT_DISTANCE_MATRIX_ENDPOINT);
        assert!(config.distance_matrix.configured_api_key().is_none());
    }

    #[test]
    fn bundled_config_parses() {
        let config = parse_dispatch_config(include_str!("../../../config/dispatch.yaml")).unwrap();
        assert_eq!(config.storage.engine, StorageEngineType::Sled);
        assert_eq!(config.assignment.max_redirects, 3);
        assert!(config.distance_matrix.configured_api_key().is_none());
        assert!(config.seed_file.is_some());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_dispatch_config(Some(Path::new("/nonexistent/dispatch.yaml"))).unwrap();
        assert_eq!(config.assignment.max_redirects, DEFAULT_MAX_REDIRECTS);
    }

    #[test]
    fn blank_api_key_counts_as_unconfigured() {
        let yaml = "distance_matrix:\n  api_key: \"   \"\n";
        let config = parse_dispatch_config(yaml).unwrap();
        assert!(config.distance_matrix.configured_api_key().is_none());
    }

    #[test]
    fn env_key_overrides_file_key() {
        let yaml = "distance_matrix:\n  api_key: from-file\n";
        let config = parse_dispatch_config(yaml).unwrap();
        let config = apply_api_key_override(config, Some("from-env".to_string()));
        assert_eq!(config.distance_matrix.configured_api_key(), Some("from-env"));

        let config = apply_api_key_override(config, Some(String::new()));
        assert_eq!(config.distance_matrix.configured_api_key(), Some("from-env"));
    }

    #[test]
    fn storage_engine_accepts_plain_scalar_spellings() {
        let config = parse_dispatch_config("storage:\n  engine: in-memory\n  path: /tmp/beds\n").unwrap();
        assert_eq!(config.storage.engine, StorageEngineType::InMemory);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/beds"));

        let config = parse_dispatch_config("storage:\n  engine: SLED\n").unwrap();
        assert_eq!(config.storage.engine, StorageEngineType::Sled);

        assert!(parse_dispatch_config("storage:\n  engine: rocksdb\n").is_err());
    }

    #[test]
    fn rejects_unknown_storage_engine() {
        assert!("rocksdb".parse::<StorageEngineType>().is_err());
        assert_eq!("in-memory".parse::<StorageEngineType>().unwrap(), StorageEngineType::InMemory);
    }
}
