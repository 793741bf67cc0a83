// lib/src/distance/mod.rs
//! Distance ranking of candidate hospitals.
//!
//! Rankers never fail: any problem with an external service degrades to the
//! haversine estimate, per element or for the whole batch.

pub mod distance_matrix;
pub mod haversine;

use std::cmp::Ordering;
use std::sync::Arc;
use async_trait::async_trait;
use log::{info, warn};
use models::{Coordinate, DistanceResult, HospitalCandidate};

use crate::config::DistanceMatrixSettings;
pub use distance_matrix::{DistanceMatrixRanker, DistanceMatrixResponse};
pub use haversine::{haversine_km, HaversineRanker, EARTH_RADIUS_KM};

#[async_trait]
pub trait DistanceRanker: Send + Sync {
    /// Ranks `candidates` ascending by distance from `origin`. Equal distances
    /// keep their input order.
    async fn rank(&self, origin: &Coordinate, candidates: &[HospitalCandidate]) -> Vec<DistanceResult>;

    fn get_type(&self) -> &'static str;
}

/// Stable ascending sort; NaN distances sink to the end.
pub fn sort_by_distance(results: &mut [DistanceResult]) {
    results.sort_by(|a, b| match (a.distance_km.is_nan(), b.distance_km.is_nan()) {
        (false, false) => a.distance_km.partial_cmp(&b.distance_km).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    });
}

/// Picks the ranker for the given settings. Without an API key no HTTP
/// client is built at all.
pub fn create_ranker(settings: &DistanceMatrixSettings) -> Arc<dyn DistanceRanker> {
    if settings.configured_api_key().is_some() {
        match DistanceMatrixRanker::new(settings.clone()) {
            Ok(ranker) => return Arc::new(ranker),
            Err(e) => warn!("Could not build distance-matrix client ({}); using haversine ranking", e),
        }
    } else {
        info!("No distance-matrix API key configured; using haversine ranking");
    }
    Arc::new(HaversineRanker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{DistanceSource, HospitalId};

    fn result(id: u64, distance_km: f64) -> DistanceResult {
        DistanceResult {
            hospital_id: HospitalId(id),
            hospital_name: format!("H{}", id),
            coordinate: Coordinate::new(0.0, 0.0),
            distance_km,
            duration: None,
            duration_minutes: None,
            available_beds: 0,
            source: DistanceSource::External,
        }
    }

    #[test]
    fn orders_five_one_three_as_one_three_five() {
        let mut results = vec![result(1, 5.0), result(2, 1.0), result(3, 3.0)];
        sort_by_distance(&mut results);
        let distances: Vec<f64> = results.iter().map(|r| r.distance_km).collect();
        assert_eq!(distances, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn nan_sorts_last() {
        let mut results = vec![result(1, f64::NAN), result(2, 2.0)];
        sort_by_distance(&mut results);
        assert_eq!(results[0].hospital_id, HospitalId(2));
    }

    #[test]
    fn equal_distances_keep_input_order() {
        let mut results = vec![result(9, 2.0), result(4, 2.0), result(7, 1.0)];
        sort_by_distance(&mut results);
        let ids: Vec<u64> = results.iter().map(|r| r.hospital_id.0).collect();
        assert_eq!(ids, vec![7, 9, 4]);
    }

    #[test]
    fn missing_key_selects_haversine() {
        let ranker = create_ranker(&DistanceMatrixSettings::default());
        assert_eq!(ranker.get_type(), "haversine");
    }
}
