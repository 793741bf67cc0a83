// lib/src/lib.rs
// Hospital assignment and bed-allocation engine.

pub mod assignment;
pub mod capacity;
pub mod config;
pub mod distance;
pub mod seed;
pub mod storage_engine;

pub use models::{
    AssignmentResult, AssignmentState, Coordinate, DispatchError, DispatchResult, DistanceResult, EmergencyId,
    EmergencyRecord, FailureReason, Hospital, HospitalBeds, HospitalId, TargetDepartment,
};

pub use assignment::{AssignmentEngine, HospitalStatus, NewEmergency, ReportOutcome};
pub use capacity::{CapacityStore, InMemoryCapacityStore, SledCapacityStore};
pub use config::{load_dispatch_config, DispatchConfig, StorageEngineType};
pub use distance::{create_ranker, DistanceMatrixRanker, DistanceRanker, HaversineRanker};
pub use seed::{load_seed_file, provision_from_seed, SeedFile, SeedHospital};
pub use storage_engine::{build_storage, EmergencyRepository, HospitalDirectory, StorageBundle};
