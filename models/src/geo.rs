// models/src/geo.rs
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::{DispatchError, DispatchResult};

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate { latitude, longitude }
    }

    /// Builds a coordinate and rejects values outside the valid degree ranges.
    pub fn checked(latitude: f64, longitude: f64) -> DispatchResult<Self> {
        let coordinate = Coordinate::new(latitude, longitude);
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> DispatchResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DispatchError::InvalidData(format!("latitude {} out of range", self.latitude)));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DispatchError::InvalidData(format!("longitude {} out of range", self.longitude)));
        }
        Ok(())
    }

    /// `lat,lng` as expected by distance-matrix style query strings.
    pub fn to_query_pair(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}
