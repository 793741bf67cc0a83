// models/src/medical/hospital_beds.rs
//! Bed counters for a single hospital.
//!
//! The counters are private so that the only ways to move `available_beds`
//! are [`HospitalBeds::reserve`] and [`HospitalBeds::release`]. Capacity stores
//! wrap these transitions in whatever atomicity their backend offers (a
//! per-hospital mutex, a compare-and-swap loop) but never write the counters
//! directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DispatchError, DispatchResult};
use crate::identifiers::HospitalId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalBeds {
    hospital_id: HospitalId,
    total_beds: u32,
    available_beds: u32,
    last_updated: DateTime<Utc>,
}

/// What a release actually did to the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// The counter was already at `total_beds`; nothing changed.
    Clamped,
}

impl HospitalBeds {
    pub fn new(hospital_id: HospitalId, total_beds: u32, available_beds: u32) -> DispatchResult<Self> {
        if available_beds > total_beds {
            return Err(DispatchError::InvalidData(format!(
                "hospital {}: available beds {} exceed total beds {}",
                hospital_id, available_beds, total_beds
            )));
        }
        Ok(HospitalBeds {
            hospital_id,
            total_beds,
            available_beds,
            last_updated: Utc::now(),
        })
    }

    pub fn hospital_id(&self) -> HospitalId {
        self.hospital_id
    }

    pub fn total_beds(&self) -> u32 {
        self.total_beds
    }

    pub fn available_beds(&self) -> u32 {
        self.available_beds
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Takes one bed if any is free. Returns false without mutation otherwise.
    pub fn reserve(&mut self) -> bool {
        if self.available_beds == 0 {
            return false;
        }
        self.available_beds -= 1;
        self.last_updated = Utc::now();
        true
    }

    /// Returns one bed, never exceeding `total_beds`.
    pub fn release(&mut self) -> ReleaseOutcome {
        if self.available_beds >= self.total_beds {
            return ReleaseOutcome::Clamped;
        }
        self.available_beds += 1;
        self.last_updated = Utc::now();
        ReleaseOutcome::Released
    }

    /// Decoded values come from storage and are re-checked before use.
    pub fn validate(&self) -> DispatchResult<()> {
        if self.available_beds > self.total_beds {
            return Err(DispatchError::InvalidData(format!(
                "hospital {}: stored available beds {} exceed total {}",
                self.hospital_id, self.available_beds, self.total_beds
            )));
        }
        Ok(())
    }
}
