// models/src/assignment.rs
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::identifiers::{EmergencyId, HospitalId};
use crate::medical::{Hospital, HospitalBeds};

/// Duration label used whenever a distance was computed geometrically.
pub const ESTIMATED_DURATION: &str = "Estimated";

/// A hospital together with the capacity snapshot read for ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct HospitalCandidate {
    pub hospital: Hospital,
    pub total_beds: u32,
    pub available_beds: u32,
}

impl HospitalCandidate {
    pub fn new(hospital: Hospital, beds: &HospitalBeds) -> Self {
        HospitalCandidate {
            hospital,
            total_beds: beds.total_beds(),
            available_beds: beds.available_beds(),
        }
    }

    /// Candidate whose snapshot could not be read. It is still ranked and
    /// still tried, since only the reservation itself is authoritative.
    pub fn without_snapshot(hospital: Hospital) -> Self {
        HospitalCandidate {
            hospital,
            total_beds: 0,
            available_beds: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceSource {
    /// Reported by the external distance-matrix service.
    External,
    /// Great-circle fallback.
    Haversine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceResult {
    pub hospital_id: HospitalId,
    pub hospital_name: String,
    pub coordinate: Coordinate,
    pub distance_km: f64,
    pub duration: Option<String>,
    pub duration_minutes: Option<u32>,
    /// Snapshot at ranking time. Advisory only.
    pub available_beds: u32,
    pub source: DistanceSource,
}

impl DistanceResult {
    pub fn estimated(candidate: &HospitalCandidate, distance_km: f64) -> Self {
        DistanceResult {
            hospital_id: candidate.hospital.id,
            hospital_name: candidate.hospital.name.clone(),
            coordinate: candidate.hospital.coordinate,
            distance_km,
            duration: Some(ESTIMATED_DURATION.to_string()),
            duration_minutes: None,
            available_beds: candidate.available_beds,
            source: DistanceSource::Haversine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoLocation,
    NotHospitalTarget,
    NoHospitals,
    NoAvailableBeds,
    RedirectLimitExceeded,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::NoLocation => "no_location",
            FailureReason::NotHospitalTarget => "not_hospital_target",
            FailureReason::NoHospitals => "no_hospitals",
            FailureReason::NoAvailableBeds => "no_available_beds",
            FailureReason::RedirectLimitExceeded => "redirect_limit_exceeded",
        }
    }

    /// Text suitable for showing to the reporting citizen.
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::NoLocation => "Emergency location coordinates are required for hospital assignment",
            FailureReason::NotHospitalTarget => "Emergency is not addressed to a hospital",
            FailureReason::NoHospitals => "No active hospitals found in the system",
            FailureReason::NoAvailableBeds => "No hospitals with available beds found",
            FailureReason::RedirectLimitExceeded => "Emergency was redirected too many times; manual dispatch required",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssignmentResult {
    Assigned {
        emergency_id: EmergencyId,
        hospital_id: HospitalId,
        hospital_name: String,
        distance_km: f64,
        message: String,
    },
    Failed {
        emergency_id: EmergencyId,
        reason: FailureReason,
        message: String,
    },
}

impl AssignmentResult {
    pub fn assigned(emergency_id: EmergencyId, ranked: &DistanceResult) -> Self {
        AssignmentResult::Assigned {
            emergency_id,
            hospital_id: ranked.hospital_id,
            hospital_name: ranked.hospital_name.clone(),
            distance_km: ranked.distance_km,
            message: format!(
                "Emergency assigned to {} ({:.2} km away)",
                ranked.hospital_name, ranked.distance_km
            ),
        }
    }

    pub fn failed(emergency_id: EmergencyId, reason: FailureReason) -> Self {
        AssignmentResult::Failed {
            emergency_id,
            reason,
            message: reason.message().to_string(),
        }
    }

    pub fn emergency_id(&self) -> EmergencyId {
        match self {
            AssignmentResult::Assigned { emergency_id, .. } => *emergency_id,
            AssignmentResult::Failed { emergency_id, .. } => *emergency_id,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, AssignmentResult::Assigned { .. })
    }

    pub fn hospital_id(&self) -> Option<HospitalId> {
        match self {
            AssignmentResult::Assigned { hospital_id, .. } => Some(*hospital_id),
            AssignmentResult::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            AssignmentResult::Assigned { .. } => None,
            AssignmentResult::Failed { reason, .. } => Some(*reason),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AssignmentResult::Assigned { message, .. } => message,
            AssignmentResult::Failed { message, .. } => message,
        }
    }
}
