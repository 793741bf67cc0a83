// lib/src/capacity/mod.rs
//! Bed capacity counters.
//!
//! Every change to a hospital's available beds goes through
//! [`CapacityStore::try_reserve`] or [`CapacityStore::release`]. Both are
//! atomic per hospital: any interleaving of calls against one hospital has the
//! effect of some serial order of those calls. An `Err` from either means the
//! counter is unchanged, including after any write still in flight settles.

pub mod inmemory_capacity;
pub mod sled_capacity;

use async_trait::async_trait;
use models::errors::DispatchResult;
use models::{HospitalBeds, HospitalId};

pub use inmemory_capacity::InMemoryCapacityStore;
pub use sled_capacity::SledCapacityStore;

#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// Takes one bed if `available > 0`. `Ok(false)` means the hospital is
    /// full and nothing changed.
    async fn try_reserve(&self, hospital_id: HospitalId) -> DispatchResult<bool>;

    /// Gives one bed back. A release at full capacity is clamped and logged,
    /// never an error.
    async fn release(&self, hospital_id: HospitalId) -> DispatchResult<()>;

    /// Point-in-time read for ranking. May be stale by the time it is used.
    async fn snapshot(&self, hospital_id: HospitalId) -> DispatchResult<HospitalBeds>;

    /// Out-of-band provisioning from seed data. Replaces any existing counters.
    async fn provision(&self, beds: HospitalBeds) -> DispatchResult<()>;

    fn get_type(&self) -> &'static str;
}
