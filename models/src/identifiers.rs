use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DispatchError;

/// Hospital identity as provisioned by seed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HospitalId(pub u64);

impl HospitalId {
    pub fn new(id: u64) -> Self {
        HospitalId(id)
    }

    /// Big-endian key bytes, so keys in ordered stores sort by id.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for HospitalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmergencyId(pub Uuid);

impl EmergencyId {
    pub fn new_v4() -> Self {
        EmergencyId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for EmergencyId {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EmergencyId(Uuid::parse_str(s.trim())?))
    }
}

impl fmt::Display for EmergencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{EmergencyId, HospitalId};
    use core::str::FromStr;

    #[test]
    fn should_encode_hospital_key_big_endian() {
        assert_eq!(HospitalId::new(42).to_key(), [0, 0, 0, 0, 0, 0, 0, 42]);
    }

    #[test]
    fn should_order_hospital_keys_numerically() {
        assert!(HospitalId::new(2).to_key() < HospitalId::new(10).to_key());
    }

    #[test]
    fn should_parse_emergency_id_from_str() {
        let id = EmergencyId::new_v4();
        let parsed = EmergencyId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        assert!(EmergencyId::from_str("not-a-uuid").is_err());
    }
}
