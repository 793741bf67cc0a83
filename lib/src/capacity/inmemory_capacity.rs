// lib/src/capacity/inmemory_capacity.rs
use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use log::{debug, warn};
use models::errors::{DispatchError, DispatchResult};
use models::{HospitalBeds, HospitalId, ReleaseOutcome};
use tokio::sync::{Mutex as TokioMutex, RwLock};

use super::CapacityStore;

/// One mutex per hospital. The outer map is only write-locked while
/// provisioning, so reservations at different hospitals never contend.
#[derive(Debug, Default)]
pub struct InMemoryCapacityStore {
    counters: RwLock<HashMap<HospitalId, Arc<TokioMutex<HospitalBeds>>>>,
}

impl InMemoryCapacityStore {
    pub fn new() -> Self {
        InMemoryCapacityStore::default()
    }

    async fn counter(&self, hospital_id: HospitalId) -> DispatchResult<Arc<TokioMutex<HospitalBeds>>> {
        self.counters
            .read()
            .await
            .get(&hospital_id)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound(format!("capacity for hospital {}", hospital_id)))
    }
}

#[async_trait]
impl CapacityStore for InMemoryCapacityStore {
    async fn try_reserve(&self, hospital_id: HospitalId) -> DispatchResult<bool> {
        let counter = self.counter(hospital_id).await?;
        let mut beds = counter.lock().await;
        let reserved = beds.reserve();
        debug!(
            "Reserve at hospital {}: {} (available now {})",
            hospital_id, reserved, beds.available_beds()
        );
        Ok(reserved)
    }

    async fn release(&self, hospital_id: HospitalId) -> DispatchResult<()> {
        let counter = self.counter(hospital_id).await?;
        let mut beds = counter.lock().await;
        match beds.release() {
            ReleaseOutcome::Released => debug!(
                "Released bed at hospital {} (available now {})",
                hospital_id, beds.available_beds()
            ),
            ReleaseOutcome::Clamped => warn!(
                "Release at hospital {} ignored: already at total capacity {}",
                hospital_id, beds.total_beds()
            ),
        }
        Ok(())
    }

    async fn snapshot(&self, hospital_id: HospitalId) -> DispatchResult<HospitalBeds> {
        let counter = self.counter(hospital_id).await?;
        let beds = counter.lock().await;
        Ok(beds.clone())
    }

    async fn provision(&self, beds: HospitalBeds) -> DispatchResult<()> {
        beds.validate()?;
        let mut counters = self.counters.write().await;
        if let Some(existing) = counters.get(&beds.hospital_id()) {
            *existing.lock().await = beds;
            return Ok(());
        }
        counters.insert(beds.hospital_id(), Arc::new(TokioMutex::new(beds)));
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "in-memory"
    }
}
