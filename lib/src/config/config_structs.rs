// lib/src/config/config_structs.rs
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use log::trace;
use serde::{Deserialize, Serialize};
use models::errors::DispatchError;

use crate::config::config_defaults::*;

/// Read from YAML as a plain scalar (`engine: sled`) through `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageEngineType {
    InMemory,
    Sled,
}

impl FromStr for StorageEngineType {
    type Err = DispatchError;

    /// Accepts the usual spellings: `inmemory`, `in-memory`, `in_memory`, `sled`.
    fn from_str(engine: &str) -> Result<Self, Self::Err> {
        match engine.to_lowercase().as_str() {
            "sled" => Ok(StorageEngineType::Sled),
            "inmemory" | "in-memory" | "in_memory" => Ok(StorageEngineType::InMemory),
            other => Err(DispatchError::ConfigurationError(format!(
                "Invalid storage engine: '{}'. Supported values: sled, inmemory, in-memory",
                other
            ))),
        }
    }
}

impl TryFrom<String> for StorageEngineType {
    type Error = DispatchError;

    fn try_from(engine: String) -> Result<Self, Self::Error> {
        engine.parse()
    }
}

impl From<StorageEngineType> for String {
    fn from(engine: StorageEngineType) -> Self {
        engine.to_string()
    }
}

impl fmt::Display for StorageEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageEngineType::InMemory => write!(f, "inmemory"),
            StorageEngineType::Sled => write!(f, "sled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceMatrixSettings {
    /// Absent or empty means the ranker runs on the haversine fallback only.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub mode: String,
    pub timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
}

impl Default for DistanceMatrixSettings {
    fn default() -> Self {
        trace!("Creating default DistanceMatrixSettings");
        DistanceMatrixSettings {
            api_key: None,
            endpoint: DEFAULT_DISTANCE_MATRIX_ENDPOINT.to_string(),
            mode: DEFAULT_TRAVEL_MODE.to_string(),
            timeout_ms: DEFAULT_DISTANCE_TIMEOUT_MS,
            cache_ttl_secs: DEFAULT_DISTANCE_CACHE_TTL_SECS,
            cache_capacity: DEFAULT_DISTANCE_CACHE_CAPACITY,
        }
    }
}

impl DistanceMatrixSettings {
    pub fn configured_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentSettings {
    /// Redirects allowed per emergency before assignment gives up.
    pub max_redirects: u32,
    pub store_timeout_ms: u64,
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        trace!("Creating default AssignmentSettings");
        AssignmentSettings {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }
}

impl AssignmentSettings {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub engine: StorageEngineType,
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        trace!("Creating default StorageSettings");
        StorageSettings {
            engine: StorageEngineType::Sled,
            path: PathBuf::from(DEFAULT_DATA_DIRECTORY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    pub distance_matrix: DistanceMatrixSettings,
    pub assignment: AssignmentSettings,
    pub storage: StorageSettings,
    pub seed_file: Option<PathBuf>,
}
