// models/src/medical/hospital.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::identifiers::HospitalId;

/// A hospital is fixed during assignment; only its bed counters move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: HospitalId,
    pub name: String,
    pub coordinate: Coordinate,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Hospital {
    pub fn new(id: HospitalId, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Hospital {
            id,
            name: name.into(),
            coordinate,
            address: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}
