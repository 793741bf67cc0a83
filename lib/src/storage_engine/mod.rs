// lib/src/storage_engine/mod.rs
// Hospital directory and emergency record stores. Bed counters live in
// `crate::capacity`; a `StorageBundle` opens all three over one backend.

pub mod inmemory_storage;
pub mod sled_storage;
pub mod storage_engine;

pub use inmemory_storage::InMemoryStorage;
pub use sled_storage::SledStorage;
pub use storage_engine::{build_storage, open_sled, EmergencyRepository, HospitalDirectory, StorageBundle};
