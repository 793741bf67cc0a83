// lib/src/storage_engine/inmemory_storage.rs
use std::collections::HashMap;
use async_trait::async_trait;
use models::errors::{DispatchError, DispatchResult};
use models::{EmergencyId, EmergencyRecord, Hospital, HospitalId};
use tokio::sync::Mutex as TokioMutex;

use crate::storage_engine::storage_engine::{EmergencyRepository, HospitalDirectory};

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    hospitals: TokioMutex<HashMap<HospitalId, Hospital>>,
    emergencies: TokioMutex<HashMap<EmergencyId, EmergencyRecord>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }
}

#[async_trait]
impl HospitalDirectory for InMemoryStorage {
    async fn active_hospitals(&self) -> DispatchResult<Vec<Hospital>> {
        let mut active: Vec<Hospital> = self
            .hospitals
            .lock()
            .await
            .values()
            .filter(|h| h.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|h| h.id);
        Ok(active)
    }

    async fn list_all(&self) -> DispatchResult<Vec<Hospital>> {
        let mut all: Vec<Hospital> = self.hospitals.lock().await.values().cloned().collect();
        all.sort_by_key(|h| h.id);
        Ok(all)
    }

    async fn get(&self, id: HospitalId) -> DispatchResult<Option<Hospital>> {
        Ok(self.hospitals.lock().await.get(&id).cloned())
    }

    async fn upsert(&self, hospital: Hospital) -> DispatchResult<()> {
        hospital.coordinate.validate()?;
        self.hospitals.lock().await.insert(hospital.id, hospital);
        Ok(())
    }

    async fn count(&self) -> DispatchResult<usize> {
        Ok(self.hospitals.lock().await.len())
    }

    fn get_type(&self) -> &'static str {
        "in-memory"
    }
}

#[async_trait]
impl EmergencyRepository for InMemoryStorage {
    async fn get(&self, id: EmergencyId) -> DispatchResult<Option<EmergencyRecord>> {
        Ok(self.emergencies.lock().await.get(&id).cloned())
    }

    async fn create(&self, record: EmergencyRecord) -> DispatchResult<()> {
        let mut emergencies = self.emergencies.lock().await;
        if emergencies.contains_key(&record.id) {
            return Err(DispatchError::InvalidState(format!("emergency {} already exists", record.id)));
        }
        emergencies.insert(record.id, record);
        Ok(())
    }

    async fn save(&self, record: &EmergencyRecord) -> DispatchResult<()> {
        self.emergencies.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn list(&self) -> DispatchResult<Vec<EmergencyRecord>> {
        let mut records: Vec<EmergencyRecord> = self.emergencies.lock().await.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn get_type(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Coordinate, TargetDepartment};

    #[tokio::test]
    async fn inactive_hospitals_are_filtered_and_order_is_by_id() {
        let storage = InMemoryStorage::new();
        storage
            .upsert(Hospital::new(HospitalId(3), "C", Coordinate::new(1.0, 1.0)))
            .await
            .unwrap();
        storage
            .upsert(Hospital::new(HospitalId(1), "A", Coordinate::new(1.0, 1.0)))
            .await
            .unwrap();
        storage
            .upsert(Hospital::new(HospitalId(2), "B", Coordinate::new(1.0, 1.0)).deactivated())
            .await
            .unwrap();

        let active = storage.active_hospitals().await.unwrap();
        let ids: Vec<u64> = active.iter().map(|h| h.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(HospitalDirectory::count(&storage).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rejects_hospital_with_invalid_coordinate() {
        let storage = InMemoryStorage::new();
        let result = storage
            .upsert(Hospital::new(HospitalId(1), "A", Coordinate::new(120.0, 0.0)))
            .await;
        assert!(matches!(result, Err(DispatchError::InvalidData(_))));
    }

    #[tokio::test]
    async fn create_refuses_duplicate_ids() {
        let storage = InMemoryStorage::new();
        let record = EmergencyRecord::new(None, TargetDepartment::Police);
        storage.create(record.clone()).await.unwrap();
        assert!(matches!(storage.create(record).await, Err(DispatchError::InvalidState(_))));
    }
}
