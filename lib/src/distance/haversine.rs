// lib/src/distance/haversine.rs
use async_trait::async_trait;
use models::{Coordinate, DistanceResult, HospitalCandidate};

use super::{sort_by_distance, DistanceRanker};

/// Mean Earth radius used by the great-circle fallback.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers. Inputs in degrees.
pub fn haversine_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lng = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn estimate(origin: &Coordinate, candidate: &HospitalCandidate) -> DistanceResult {
    DistanceResult::estimated(candidate, haversine_km(origin, &candidate.hospital.coordinate))
}

/// Ranker that never leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineRanker;

impl HaversineRanker {
    pub fn rank_sync(&self, origin: &Coordinate, candidates: &[HospitalCandidate]) -> Vec<DistanceResult> {
        let mut results: Vec<DistanceResult> = candidates.iter().map(|c| estimate(origin, c)).collect();
        sort_by_distance(&mut results);
        results
    }
}

#[async_trait]
impl DistanceRanker for HaversineRanker {
    async fn rank(&self, origin: &Coordinate, candidates: &[HospitalCandidate]) -> Vec<DistanceResult> {
        self.rank_sync(origin, candidates)
    }

    fn get_type(&self) -> &'static str {
        "haversine"
    }
}
