// lib/src/config/config_defaults.rs

pub const DEFAULT_CONFIG_PATH_RELATIVE: &str = "./config/dispatch.yaml";
pub const DEFAULT_DATA_DIRECTORY: &str = "./data/dispatch";

pub const DEFAULT_DISTANCE_MATRIX_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";
pub const DEFAULT_TRAVEL_MODE: &str = "driving";
pub const DEFAULT_DISTANCE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DISTANCE_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_DISTANCE_CACHE_CAPACITY: u64 = 1_024;

pub const DEFAULT_MAX_REDIRECTS: u32 = 3;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;

/// Overrides `distance_matrix.api_key` when set and non-empty.
pub const MAPS_API_KEY_ENV: &str = "DISPATCH_MAPS_API_KEY";
