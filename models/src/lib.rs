// models/src/lib.rs

pub mod assignment;
pub mod errors;
pub mod geo;
pub mod identifiers;
pub mod medical;

// Re-export common core types for convenience when other crates use 'models::*'
pub use assignment::{
    AssignmentResult, DistanceResult, DistanceSource, FailureReason, HospitalCandidate, ESTIMATED_DURATION,
};
pub use errors::{DispatchError, DispatchResult};
pub use geo::Coordinate;
pub use identifiers::{EmergencyId, HospitalId};
pub use medical::{AssignmentState, EmergencyRecord, Hospital, HospitalBeds, ReleaseOutcome, TargetDepartment};
