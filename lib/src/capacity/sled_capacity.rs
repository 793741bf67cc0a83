// lib/src/capacity/sled_capacity.rs
//! Sled-backed bed counters.
//!
//! Counters are JSON-encoded `HospitalBeds` values keyed by hospital id.
//! Reserve and release are compare-and-swap loops over the stored bytes, so
//! concurrent writers never act on a stale read. Sled calls run on the
//! blocking pool and are bounded by the configured store timeout; a timeout
//! or a sled failure surfaces as `DispatchError::Unavailable`. A reserve or
//! release that lands after its caller timed out is reversed, so an error
//! always leaves the counter as it was.

use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error, trace, warn};
use models::errors::{DispatchError, DispatchResult};
use models::{HospitalBeds, HospitalId, ReleaseOutcome};
use tokio::task::{self, JoinHandle};
use tokio::time::timeout;

use super::CapacityStore;

pub const CAPACITY_TREE: &str = "hospital_beds";

#[derive(Debug, Clone)]
pub struct SledCapacityStore {
    tree: sled::Tree,
    timeout: Duration,
}

fn decode(bytes: &[u8]) -> DispatchResult<HospitalBeds> {
    let beds: HospitalBeds = serde_json::from_slice(bytes)?;
    beds.validate()?;
    Ok(beds)
}

/// Applies `change` to the stored counter until the swap lands. Returns
/// `Ok(None)` when `change` declines to mutate.
fn update_counter<F>(tree: &sled::Tree, hospital_id: HospitalId, mut change: F) -> DispatchResult<Option<HospitalBeds>>
where
    F: FnMut(&mut HospitalBeds) -> bool,
{
    let key = hospital_id.to_key();
    loop {
        let current = tree
            .get(key)?
            .ok_or_else(|| DispatchError::NotFound(format!("capacity for hospital {}", hospital_id)))?;
        let mut beds = decode(&current)?;
        if !change(&mut beds) {
            return Ok(None);
        }
        let next = serde_json::to_vec(&beds)?;
        match tree.compare_and_swap(key, Some(&current), Some(next))? {
            Ok(()) => return Ok(Some(beds)),
            Err(_) => trace!("Capacity CAS conflict for hospital {}, retrying", hospital_id),
        }
    }
}

impl SledCapacityStore {
    pub fn open(db: &sled::Db, store_timeout: Duration) -> DispatchResult<Self> {
        let tree = db.open_tree(CAPACITY_TREE)?;
        Ok(SledCapacityStore { tree, timeout: store_timeout })
    }

    async fn await_bounded<T>(&self, op: &str, handle: JoinHandle<DispatchResult<T>>) -> DispatchResult<T> {
        match timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DispatchError::Unavailable(format!("{} task failed: {}", op, e))),
            Err(_) => Err(DispatchError::Unavailable(format!("{} timed out after {:?}", op, self.timeout))),
        }
    }
}

/// Waits out a counter write the caller already saw time out. If it landed,
/// `undo` reverses it so the counter matches the error that was returned.
fn reverse_late_write<F>(
    tree: sled::Tree,
    hospital_id: HospitalId,
    op: &'static str,
    handle: JoinHandle<DispatchResult<Option<HospitalBeds>>>,
    undo: F,
) -> JoinHandle<()>
where
    F: FnMut(&mut HospitalBeds) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        if let Ok(Ok(Some(_))) = handle.await {
            warn!("Late {} at hospital {} after timeout; reversing it", op, hospital_id);
            let reversal = task::spawn_blocking(move || update_counter(&tree, hospital_id, undo));
            match reversal.await {
                Ok(Ok(Some(_))) => {}
                Ok(Ok(None)) => error!(
                    "Late {} at hospital {} could not be reversed: counter already moved",
                    op, hospital_id
                ),
                Ok(Err(e)) => error!("Reversal of late {} at hospital {} failed: {}", op, hospital_id, e),
                Err(e) => error!("Reversal of late {} at hospital {} failed: {}", op, hospital_id, e),
            }
        }
    })
}

fn take_bed(beds: &mut HospitalBeds) -> bool {
    beds.reserve()
}

fn return_bed(beds: &mut HospitalBeds) -> bool {
    beds.release() == ReleaseOutcome::Released
}

#[async_trait]
impl CapacityStore for SledCapacityStore {
    async fn try_reserve(&self, hospital_id: HospitalId) -> DispatchResult<bool> {
        let tree = self.tree.clone();
        let mut handle = task::spawn_blocking(move || update_counter(&tree, hospital_id, take_bed));

        match timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => {
                let reserved = result?.is_some();
                debug!("Reserve at hospital {}: {}", hospital_id, reserved);
                Ok(reserved)
            }
            Ok(Err(e)) => Err(DispatchError::Unavailable(format!("reserve task failed: {}", e))),
            Err(_) => {
                // The caller moves on to another hospital, so a reservation
                // that lands later is handed back.
                reverse_late_write(self.tree.clone(), hospital_id, "reserve", handle, return_bed);
                Err(DispatchError::Unavailable(format!(
                    "reserve at hospital {} timed out after {:?}",
                    hospital_id, self.timeout
                )))
            }
        }
    }

    async fn release(&self, hospital_id: HospitalId) -> DispatchResult<()> {
        let tree = self.tree.clone();
        let mut handle = task::spawn_blocking(move || update_counter(&tree, hospital_id, return_bed));

        match timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => {
                match result? {
                    Some(beds) => debug!(
                        "Released bed at hospital {} (available now {})",
                        hospital_id, beds.available_beds()
                    ),
                    None => warn!("Release at hospital {} ignored: already at total capacity", hospital_id),
                }
                Ok(())
            }
            Ok(Err(e)) => Err(DispatchError::Unavailable(format!("release task failed: {}", e))),
            Err(_) => {
                // The caller still holds the bed as far as its records go, so
                // a release that lands later is taken back.
                reverse_late_write(self.tree.clone(), hospital_id, "release", handle, take_bed);
                Err(DispatchError::Unavailable(format!(
                    "release at hospital {} timed out after {:?}",
                    hospital_id, self.timeout
                )))
            }
        }
    }

    async fn snapshot(&self, hospital_id: HospitalId) -> DispatchResult<HospitalBeds> {
        let tree = self.tree.clone();
        let handle = task::spawn_blocking(move || {
            let bytes = tree
                .get(hospital_id.to_key())?
                .ok_or_else(|| DispatchError::NotFound(format!("capacity for hospital {}", hospital_id)))?;
            decode(&bytes)
        });
        self.await_bounded("snapshot", handle).await
    }

    async fn provision(&self, beds: HospitalBeds) -> DispatchResult<()> {
        beds.validate()?;
        let bytes = serde_json::to_vec(&beds)?;
        self.tree.insert(beds.hospital_id().to_key(), bytes)?;
        self.tree.flush_async().await?;
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;

    async fn temp_store(id: u64, total: u32, available: u32) -> Arc<SledCapacityStore> {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledCapacityStore::open(&db, Duration::from_secs(5)).unwrap();
        store
            .provision(HospitalBeds::new(HospitalId(id), total, available).unwrap())
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn reserve_and_release_round_trip() {
        let store = temp_store(4, 3, 1).await;
        assert!(store.try_reserve(HospitalId(4)).await.unwrap());
        assert!(!store.try_reserve(HospitalId(4)).await.unwrap());
        store.release(HospitalId(4)).await.unwrap();
        assert_eq!(store.snapshot(HospitalId(4)).await.unwrap().available_beds(), 1);
    }

    #[tokio::test]
    async fn release_is_clamped_at_total() {
        let store = temp_store(4, 2, 2).await;
        store.release(HospitalId(4)).await.unwrap();
        store.release(HospitalId(4)).await.unwrap();
        assert_eq!(store.snapshot(HospitalId(4)).await.unwrap().available_beds(), 2);
    }

    #[tokio::test]
    async fn unknown_hospital_is_not_found() {
        let store = temp_store(4, 2, 2).await;
        assert!(matches!(store.snapshot(HospitalId(5)).await, Err(DispatchError::NotFound(_))));
        assert!(matches!(store.try_reserve(HospitalId(5)).await, Err(DispatchError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn compare_and_swap_prevents_overbooking() {
        let store = temp_store(9, 50, 12).await;
        let attempts = (0..48).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.try_reserve(HospitalId(9)).await.unwrap() })
        });
        let granted = join_all(attempts)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();
        assert_eq!(granted, 12);
        assert_eq!(store.snapshot(HospitalId(9)).await.unwrap().available_beds(), 0);
    }

    fn read_counter(tree: &sled::Tree, id: u64) -> HospitalBeds {
        decode(&tree.get(HospitalId(id).to_key()).unwrap().unwrap()).unwrap()
    }

    fn slow_write<F>(tree: &sled::Tree, id: u64, change: F) -> JoinHandle<DispatchResult<Option<HospitalBeds>>>
    where
        F: FnMut(&mut HospitalBeds) -> bool + Send + 'static,
    {
        let tree = tree.clone();
        task::spawn_blocking(move || {
            std::thread::sleep(Duration::from_millis(50));
            update_counter(&tree, HospitalId(id), change)
        })
    }

    #[tokio::test]
    async fn late_release_is_taken_back() {
        let store = temp_store(6, 2, 0).await;
        let late = slow_write(&store.tree, 6, return_bed);
        reverse_late_write(store.tree.clone(), HospitalId(6), "release", late, take_bed)
            .await
            .unwrap();
        assert_eq!(read_counter(&store.tree, 6).available_beds(), 0);
    }

    #[tokio::test]
    async fn late_reservation_is_handed_back() {
        let store = temp_store(6, 2, 2).await;
        let late = slow_write(&store.tree, 6, take_bed);
        reverse_late_write(store.tree.clone(), HospitalId(6), "reserve", late, return_bed)
            .await
            .unwrap();
        assert_eq!(read_counter(&store.tree, 6).available_beds(), 2);
    }

    #[tokio::test]
    async fn declined_late_write_is_left_alone() {
        let store = temp_store(6, 2, 0).await;
        let late = slow_write(&store.tree, 6, take_bed);
        reverse_late_write(store.tree.clone(), HospitalId(6), "reserve", late, return_bed)
            .await
            .unwrap();
        assert_eq!(read_counter(&store.tree, 6).available_beds(), 0);
    }

    // With a zero budget either outcome is possible; whichever the caller
    // saw must be what the counter ends up holding.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timed_out_calls_leave_counter_matching_the_result() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledCapacityStore::open(&db, Duration::ZERO).unwrap();
        store
            .provision(HospitalBeds::new(HospitalId(8), 4, 2).unwrap())
            .await
            .unwrap();

        let mut expected = 2;
        for _ in 0..5 {
            match store.try_reserve(HospitalId(8)).await {
                Ok(true) => expected -= 1,
                Ok(false) => panic!("a bed was free"),
                Err(e) => assert!(matches!(e, DispatchError::Unavailable(_))),
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            match store.release(HospitalId(8)).await {
                Ok(()) => expected = (expected + 1).min(4),
                Err(e) => assert!(matches!(e, DispatchError::Unavailable(_))),
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(read_counter(&store.tree, 8).available_beds(), expected);
        }
    }

    #[tokio::test]
    async fn corrupt_counter_is_rejected() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledCapacityStore::open(&db, Duration::from_secs(5)).unwrap();
        let tree = db.open_tree(CAPACITY_TREE).unwrap();
        let raw = serde_json::json!({
            "hospital_id": 1,
            "total_beds": 1,
            "available_beds": 4,
            "last_updated": "2025-01-01T00:00:00Z"
        });
        tree.insert(HospitalId(1).to_key(), serde_json::to_vec(&raw).unwrap()).unwrap();
        assert!(matches!(store.try_reserve(HospitalId(1)).await, Err(DispatchError::InvalidData(_))));
    }
}
