// lib/src/distance/distance_matrix.rs
//! Client for a Google-style distance-matrix service.
//!
//! One request carries the origin and every candidate as destinations. Each
//! element in the reply has its own status, so a single bad destination only
//! costs that destination its road distance.

use async_trait::async_trait;
use caching::Cache;
use log::{debug, info, warn};
use models::errors::{DispatchError, DispatchResult};
use models::{Coordinate, DistanceResult, DistanceSource, HospitalCandidate};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::haversine::{estimate, HaversineRanker};
use super::{sort_by_distance, DistanceRanker};
use crate::config::DistanceMatrixSettings;

const STATUS_OK: &str = "OK";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceMatrixResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRow {
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixElement {
    pub status: String,
    #[serde(default)]
    pub distance: Option<MatrixValue>,
    #[serde(default)]
    pub duration: Option<MatrixValue>,
}

/// `value` is meters for distances and seconds for durations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixValue {
    pub value: f64,
    #[serde(default)]
    pub text: String,
}

/// Checks the batch-level status and shape, returning the single row's
/// elements. Any error here sends the whole batch to the fallback.
pub fn elements_from_response(
    response: DistanceMatrixResponse,
    expected: usize,
) -> DispatchResult<Vec<MatrixElement>> {
    if response.status != STATUS_OK {
        return Err(DispatchError::NetworkError(format!(
            "distance matrix returned status {}: {}",
            response.status,
            response.error_message.unwrap_or_default()
        )));
    }
    let row = response
        .rows
        .into_iter()
        .next()
        .ok_or_else(|| DispatchError::NetworkError("distance matrix returned no rows".to_string()))?;
    if row.elements.len() != expected {
        return Err(DispatchError::NetworkError(format!(
            "distance matrix returned {} elements for {} destinations",
            row.elements.len(),
            expected
        )));
    }
    Ok(row.elements)
}

/// Pairs elements with candidates positionally. Elements that failed, lack a
/// distance, or carry a negative or non-finite one are replaced by the
/// haversine estimate.
pub fn resolve_elements(
    origin: &Coordinate,
    candidates: &[HospitalCandidate],
    elements: &[MatrixElement],
) -> Vec<DistanceResult> {
    candidates
        .iter()
        .zip(elements.iter())
        .map(|(candidate, element)| match (&element.status[..], &element.distance) {
            (STATUS_OK, Some(distance)) if is_usable(distance) => DistanceResult {
                hospital_id: candidate.hospital.id,
                hospital_name: candidate.hospital.name.clone(),
                coordinate: candidate.hospital.coordinate,
                distance_km: distance.value / 1000.0,
                duration: element.duration.as_ref().map(|d| d.text.clone()),
                duration_minutes: element
                    .duration
                    .as_ref()
                    .filter(|d| is_usable(d))
                    .map(|d| (d.value / 60.0) as u32),
                available_beds: candidate.available_beds,
                source: DistanceSource::External,
            },
            (status, distance) => {
                let fallback = estimate(origin, candidate);
                warn!(
                    "Distance matrix element for {} had status {} and distance {:?}; using haversine {:.2} km",
                    candidate.hospital.name,
                    status,
                    distance.as_ref().map(|d| d.value),
                    fallback.distance_km
                );
                fallback
            }
        })
        .collect()
}

fn is_usable(value: &MatrixValue) -> bool {
    value.value.is_finite() && value.value >= 0.0
}

pub struct DistanceMatrixRanker {
    client: Client,
    settings: DistanceMatrixSettings,
    cache: Cache<Vec<MatrixElement>>,
}

impl DistanceMatrixRanker {
    pub fn new(settings: DistanceMatrixSettings) -> DispatchResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| DispatchError::ConfigurationError(format!("failed to build HTTP client: {}", e)))?;
        let cache = Cache::with_ttl(settings.cache_capacity, settings.cache_ttl());
        Ok(DistanceMatrixRanker { client, settings, cache })
    }

    fn destinations(candidates: &[HospitalCandidate]) -> String {
        candidates
            .iter()
            .map(|c| c.hospital.coordinate.to_query_pair())
            .collect::<Vec<_>>()
            .join("|")
    }

    fn cache_key(&self, origin: &Coordinate, destinations: &str) -> String {
        format!("{}|{}|{}", self.settings.mode, origin.to_query_pair(), destinations)
    }

    async fn fetch_elements(
        &self,
        origin: &Coordinate,
        destinations: &str,
        expected: usize,
    ) -> DispatchResult<Vec<MatrixElement>> {
        let api_key = self
            .settings
            .configured_api_key()
            .ok_or_else(|| DispatchError::ConfigurationError("distance matrix API key not configured".to_string()))?;

        info!("Calling distance matrix for {} hospitals from origin {}", expected, origin);

        let request = self
            .client
            .get(&self.settings.endpoint)
            .query(&[
                ("origins", origin.to_query_pair().as_str()),
                ("destinations", destinations),
                ("mode", self.settings.mode.as_str()),
                ("units", "metric"),
                ("key", api_key),
            ]);

        let response: DistanceMatrixResponse = tokio::time::timeout(self.settings.timeout(), async {
            request.send().await?.error_for_status()?.json::<DistanceMatrixResponse>().await
        })
        .await??;

        elements_from_response(response, expected)
    }
}

#[async_trait]
impl DistanceRanker for DistanceMatrixRanker {
    async fn rank(&self, origin: &Coordinate, candidates: &[HospitalCandidate]) -> Vec<DistanceResult> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let destinations = Self::destinations(candidates);
        let key = self.cache_key(origin, &destinations);

        let elements = match self.cache.get(&key).await {
            Some(elements) => {
                debug!("Distance matrix cache hit for origin {}", origin);
                Ok(elements)
            }
            None => {
                let fetched = self.fetch_elements(origin, &destinations, candidates.len()).await;
                if let Ok(ref elements) = fetched {
                    self.cache.insert(key, elements.clone()).await;
                }
                fetched
            }
        };

        match elements {
            Ok(elements) => {
                let mut results = resolve_elements(origin, candidates, &elements);
                sort_by_distance(&mut results);
                results
            }
            Err(e) => {
                warn!("Distance matrix unavailable, falling back to haversine: {}", e);
                HaversineRanker.rank_sync(origin, candidates)
            }
        }
    }

    fn get_type(&self) -> &'static str {
        "distance-matrix"
    }
}
