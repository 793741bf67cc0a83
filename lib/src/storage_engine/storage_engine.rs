// lib/src/storage_engine/storage_engine.rs
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info};
use models::errors::{DispatchError, DispatchResult};
use models::{EmergencyId, EmergencyRecord, Hospital, HospitalId};

use crate::capacity::{CapacityStore, InMemoryCapacityStore, SledCapacityStore};
use crate::config::{StorageEngineType, StorageSettings};
use crate::storage_engine::inmemory_storage::InMemoryStorage;
use crate::storage_engine::sled_storage::SledStorage;

/// Read side of the hospital registry. Hospitals are provisioned out of band
/// and never change while an assignment is running.
#[async_trait]
pub trait HospitalDirectory: Send + Sync + Debug {
    /// Active hospitals ordered by id, so ranking ties resolve the same way
    /// on every call.
    async fn active_hospitals(&self) -> DispatchResult<Vec<Hospital>>;
    async fn list_all(&self) -> DispatchResult<Vec<Hospital>>;
    async fn get(&self, id: HospitalId) -> DispatchResult<Option<Hospital>>;
    async fn upsert(&self, hospital: Hospital) -> DispatchResult<()>;
    async fn count(&self) -> DispatchResult<usize>;
    fn get_type(&self) -> &'static str;
}

#[async_trait]
pub trait EmergencyRepository: Send + Sync + Debug {
    async fn get(&self, id: EmergencyId) -> DispatchResult<Option<EmergencyRecord>>;
    /// Inserts a new record. Fails with `InvalidState` if the id is taken.
    async fn create(&self, record: EmergencyRecord) -> DispatchResult<()>;
    /// Overwrites the stored record.
    async fn save(&self, record: &EmergencyRecord) -> DispatchResult<()>;
    /// All records, oldest first.
    async fn list(&self) -> DispatchResult<Vec<EmergencyRecord>>;
    fn get_type(&self) -> &'static str;
}

/// The three stores the assignment engine runs against, opened together
/// from one storage section.
#[derive(Clone)]
pub struct StorageBundle {
    pub engine_type: StorageEngineType,
    pub hospitals: Arc<dyn HospitalDirectory>,
    pub emergencies: Arc<dyn EmergencyRepository>,
    pub capacity: Arc<dyn CapacityStore>,
}

impl Debug for StorageBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBundle")
            .field("engine_type", &self.engine_type)
            .field("hospitals", &self.hospitals.get_type())
            .field("emergencies", &self.emergencies.get_type())
            .field("capacity", &self.capacity.get_type())
            .finish()
    }
}

pub fn open_sled(path: &Path) -> DispatchResult<sled::Db> {
    std::fs::create_dir_all(path).map_err(|e| {
        DispatchError::StorageError(format!("Failed to create data directory {:?}: {}", path, e))
    })?;
    debug!("Opening sled database at {:?}", path);
    sled::open(path).map_err(|e| DispatchError::Unavailable(format!("Failed to open sled at {:?}: {}", path, e)))
}

pub fn build_storage(settings: &StorageSettings, store_timeout: Duration) -> DispatchResult<StorageBundle> {
    let bundle = match settings.engine {
        StorageEngineType::InMemory => {
            let storage = Arc::new(InMemoryStorage::new());
            StorageBundle {
                engine_type: StorageEngineType::InMemory,
                hospitals: storage.clone(),
                emergencies: storage,
                capacity: Arc::new(InMemoryCapacityStore::new()),
            }
        }
        StorageEngineType::Sled => {
            let db = open_sled(&settings.path)?;
            let storage = Arc::new(SledStorage::open(&db, store_timeout)?);
            StorageBundle {
                engine_type: StorageEngineType::Sled,
                hospitals: storage.clone(),
                emergencies: storage,
                capacity: Arc::new(SledCapacityStore::open(&db, store_timeout)?),
            }
        }
    };
    info!("Storage ready: {:?}", bundle);
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_in_memory_bundle() {
        let settings = StorageSettings {
            engine: StorageEngineType::InMemory,
            ..StorageSettings::default()
        };
        let bundle = build_storage(&settings, Duration::from_secs(1)).unwrap();
        assert_eq!(bundle.capacity.get_type(), "in-memory");
        assert_eq!(bundle.hospitals.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn builds_sled_bundle_in_fresh_directory() {
        let dir = std::env::temp_dir().join(format!("dispatch-bundle-{}", uuid::Uuid::new_v4()));
        let settings = StorageSettings {
            engine: StorageEngineType::Sled,
            path: dir.clone(),
        };
        {
            let bundle = build_storage(&settings, Duration::from_secs(1)).unwrap();
            assert_eq!(bundle.capacity.get_type(), "sled");
            assert_eq!(bundle.emergencies.get_type(), "sled");
        }
        let _ = std::fs::remove_dir_all(dir);
    }
}
