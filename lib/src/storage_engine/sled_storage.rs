// lib/src/storage_engine/sled_storage.rs
//! Sled-backed hospital directory and emergency records.
//!
//! Like the capacity counters, every sled call runs on the blocking pool and
//! is bounded by the store timeout. A record save that lands after its caller
//! timed out is swapped back, so a failed save leaves the stored record as it
//! was.

use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error, trace, warn};
use models::errors::{DispatchError, DispatchResult};
use models::{EmergencyId, EmergencyRecord, Hospital, HospitalId};
use serde::de::DeserializeOwned;
use sled::IVec;
use tokio::task::{self, JoinHandle};
use tokio::time::timeout;

use crate::storage_engine::storage_engine::{EmergencyRepository, HospitalDirectory};

pub const HOSPITALS_TREE: &str = "hospitals";
pub const EMERGENCIES_TREE: &str = "emergencies";

#[derive(Debug, Clone)]
pub struct SledStorage {
    hospitals: sled::Tree,
    emergencies: sled::Tree,
    timeout: Duration,
}

fn decode<T: DeserializeOwned>(bytes: &IVec) -> DispatchResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_all<T: DeserializeOwned>(tree: &sled::Tree) -> DispatchResult<Vec<T>> {
    let mut values = Vec::new();
    for entry in tree.iter() {
        let (_, value) = entry?;
        values.push(decode(&value)?);
    }
    Ok(values)
}

/// Replaces the value under `key` and flushes. Returns the previous value
/// and the bytes written.
fn swap_in(tree: &sled::Tree, key: &[u8], next: IVec) -> DispatchResult<(Option<IVec>, IVec)> {
    loop {
        let previous = tree.get(key)?;
        match tree.compare_and_swap(key, previous.as_ref(), Some(next.clone()))? {
            Ok(()) => {
                tree.flush()?;
                return Ok((previous, next));
            }
            Err(_) => trace!("Record CAS conflict, retrying"),
        }
    }
}

impl SledStorage {
    pub fn open(db: &sled::Db, store_timeout: Duration) -> DispatchResult<Self> {
        Ok(SledStorage {
            hospitals: db.open_tree(HOSPITALS_TREE)?,
            emergencies: db.open_tree(EMERGENCIES_TREE)?,
            timeout: store_timeout,
        })
    }

    async fn bounded<T, F>(&self, op: &str, call: F) -> DispatchResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> DispatchResult<T> + Send + 'static,
    {
        match timeout(self.timeout, task::spawn_blocking(call)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DispatchError::Unavailable(format!("{} task failed: {}", op, e))),
            Err(_) => Err(DispatchError::Unavailable(format!("{} timed out after {:?}", op, self.timeout))),
        }
    }
}

/// Puts the previous record back if a timed-out save still landed and
/// nothing has written over it since.
fn reverse_late_save(
    tree: sled::Tree,
    id: EmergencyId,
    handle: JoinHandle<DispatchResult<(Option<IVec>, IVec)>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Ok(Ok((previous, written))) = handle.await {
            warn!("Late save of emergency {} after timeout; restoring previous record", id);
            let reversal = task::spawn_blocking(move || {
                let restored = tree.compare_and_swap(id.as_bytes(), Some(&written), previous)?;
                tree.flush()?;
                Ok::<_, sled::Error>(restored)
            });
            match reversal.await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(_))) => debug!("Emergency {} was written again; late save left in place", id),
                Ok(Err(e)) => error!("Restoring emergency {} failed: {}", id, e),
                Err(e) => error!("Restoring emergency {} failed: {}", id, e),
            }
        }
    })
}

#[async_trait]
impl HospitalDirectory for SledStorage {
    async fn active_hospitals(&self) -> DispatchResult<Vec<Hospital>> {
        let hospitals = self.list_all().await?;
        Ok(hospitals.into_iter().filter(|h| h.is_active).collect())
    }

    async fn list_all(&self) -> DispatchResult<Vec<Hospital>> {
        let tree = self.hospitals.clone();
        self.bounded("list hospitals", move || decode_all(&tree)).await
    }

    async fn get(&self, id: HospitalId) -> DispatchResult<Option<Hospital>> {
        let tree = self.hospitals.clone();
        self.bounded("get hospital", move || tree.get(id.to_key())?.map(|v| decode(&v)).transpose())
            .await
    }

    async fn upsert(&self, hospital: Hospital) -> DispatchResult<()> {
        hospital.coordinate.validate()?;
        let bytes = serde_json::to_vec(&hospital)?;
        let tree = self.hospitals.clone();
        let key = hospital.id.to_key();
        self.bounded("upsert hospital", move || {
            tree.insert(key, bytes)?;
            tree.flush()?;
            Ok(())
        })
        .await?;
        debug!("Stored hospital {} ({})", hospital.id, hospital.name);
        Ok(())
    }

    async fn count(&self) -> DispatchResult<usize> {
        let tree = self.hospitals.clone();
        self.bounded("count hospitals", move || Ok(tree.len())).await
    }

    fn get_type(&self) -> &'static str {
        "sled"
    }
}

#[async_trait]
impl EmergencyRepository for SledStorage {
    async fn get(&self, id: EmergencyId) -> DispatchResult<Option<EmergencyRecord>> {
        let tree = self.emergencies.clone();
        self.bounded("get emergency", move || tree.get(id.as_bytes())?.map(|v| decode(&v)).transpose())
            .await
    }

    async fn create(&self, record: EmergencyRecord) -> DispatchResult<()> {
        let bytes = serde_json::to_vec(&record)?;
        let tree = self.emergencies.clone();
        let id = record.id;
        self.bounded("create emergency", move || {
            if tree.compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(bytes))?.is_err() {
                warn!("Refusing to overwrite existing emergency {}", id);
                return Err(DispatchError::InvalidState(format!("emergency {} already exists", id)));
            }
            tree.flush()?;
            Ok(())
        })
        .await
    }

    async fn save(&self, record: &EmergencyRecord) -> DispatchResult<()> {
        let next = IVec::from(serde_json::to_vec(record)?);
        let tree = self.emergencies.clone();
        let id = record.id;
        let mut handle = task::spawn_blocking(move || swap_in(&tree, id.as_bytes(), next));

        match timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result.map(|_| ()),
            Ok(Err(e)) => Err(DispatchError::Unavailable(format!("save task failed: {}", e))),
            Err(_) => {
                reverse_late_save(self.emergencies.clone(), id, handle);
                Err(DispatchError::Unavailable(format!(
                    "save of emergency {} timed out after {:?}",
                    id, self.timeout
                )))
            }
        }
    }

    async fn list(&self) -> DispatchResult<Vec<EmergencyRecord>> {
        let tree = self.emergencies.clone();
        let mut records: Vec<EmergencyRecord> = self.bounded("list emergencies", move || decode_all(&tree)).await?;
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn get_type(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{AssignmentState, Coordinate, TargetDepartment};

    fn temp_storage() -> SledStorage {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SledStorage::open(&db, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn hospitals_come_back_in_id_order() {
        let storage = temp_storage();
        for id in [12u64, 3, 7] {
            storage
                .upsert(Hospital::new(HospitalId(id), format!("H{}", id), Coordinate::new(18.5, 73.8)))
                .await
                .unwrap();
        }
        let ids: Vec<u64> = storage.active_hospitals().await.unwrap().iter().map(|h| h.id.0).collect();
        assert_eq!(ids, vec![3, 7, 12]);
        let found = HospitalDirectory::get(&storage, HospitalId(7)).await.unwrap().unwrap();
        assert_eq!(found.name, "H7");
    }

    #[tokio::test]
    async fn emergency_record_survives_save_and_reload() {
        let storage = temp_storage();
        let mut record = EmergencyRecord::new(Some(Coordinate::new(18.52, 73.85)), TargetDepartment::Hospital)
            .with_description("road accident");
        storage.create(record.clone()).await.unwrap();

        record.state = AssignmentState::Assigned;
        record.assigned_hospital = Some(HospitalId(2));
        storage.save(&record).await.unwrap();

        let loaded = EmergencyRepository::get(&storage, record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(matches!(storage.create(record).await, Err(DispatchError::InvalidState(_))));
    }

    #[tokio::test]
    async fn unknown_ids_are_none() {
        let storage = temp_storage();
        assert!(HospitalDirectory::get(&storage, HospitalId(1)).await.unwrap().is_none());
        assert!(EmergencyRepository::get(&storage, EmergencyId::new_v4()).await.unwrap().is_none());
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn late_save_is_swapped_back() {
        let storage = temp_storage();
        let mut record = EmergencyRecord::new(Some(Coordinate::new(18.52, 73.85)), TargetDepartment::Hospital);
        storage.create(record.clone()).await.unwrap();
        let original = record.clone();

        record.state = AssignmentState::Assigned;
        record.assigned_hospital = Some(HospitalId(2));
        let tree = storage.emergencies.clone();
        let next = IVec::from(serde_json::to_vec(&record).unwrap());
        let late = task::spawn_blocking(move || {
            std::thread::sleep(Duration::from_millis(50));
            swap_in(&tree, record.id.as_bytes(), next)
        });
        reverse_late_save(storage.emergencies.clone(), original.id, late).await.unwrap();

        let loaded = EmergencyRepository::get(&storage, original.id).await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn newer_save_survives_reversal_of_an_older_one() {
        let storage = temp_storage();
        let mut record = EmergencyRecord::new(Some(Coordinate::new(18.52, 73.85)), TargetDepartment::Hospital);
        storage.create(record.clone()).await.unwrap();

        record.state = AssignmentState::Failed;
        let tree = storage.emergencies.clone();
        let stale = IVec::from(serde_json::to_vec(&record).unwrap());
        let id = record.id;
        let late = task::spawn_blocking(move || swap_in(&tree, id.as_bytes(), stale));
        let (_, written) = late.await.unwrap().unwrap();

        record.state = AssignmentState::Assigned;
        record.assigned_hospital = Some(HospitalId(3));
        storage.save(&record).await.unwrap();

        let landed = tokio::spawn(async move { Ok((None, written)) });
        reverse_late_save(storage.emergencies.clone(), id, landed).await.unwrap();

        let loaded = EmergencyRepository::get(&storage, id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    // With a zero budget either outcome is possible; the stored record must
    // agree with the one the caller was told about.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timed_out_save_leaves_previous_record() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let storage = SledStorage::open(&db, Duration::from_secs(2)).unwrap();
        let mut record = EmergencyRecord::new(Some(Coordinate::new(18.52, 73.85)), TargetDepartment::Hospital);
        storage.create(record.clone()).await.unwrap();
        let original = record.clone();

        let hurried = SledStorage::open(&db, Duration::ZERO).unwrap();
        record.state = AssignmentState::Assigned;
        record.assigned_hospital = Some(HospitalId(4));
        let outcome = hurried.save(&record).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let loaded = EmergencyRepository::get(&storage, record.id).await.unwrap().unwrap();
        match outcome {
            Ok(()) => assert_eq!(loaded, record),
            Err(e) => {
                assert!(matches!(e, DispatchError::Unavailable(_)));
                assert_eq!(loaded, original);
            }
        }
    }
}
