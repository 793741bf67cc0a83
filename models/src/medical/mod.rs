// models/src/medical/mod.rs
pub mod emergency;
pub mod hospital;
pub mod hospital_beds;

pub use emergency::{AssignmentState, EmergencyRecord, TargetDepartment};
pub use hospital::Hospital;
pub use hospital_beds::{HospitalBeds, ReleaseOutcome};
