// lib/src/assignment/mod.rs
pub mod engine;

pub use engine::{AssignmentEngine, HospitalStatus, NewEmergency, ReportOutcome};
