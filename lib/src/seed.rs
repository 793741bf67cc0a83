// lib/src/seed.rs
//! Out-of-band provisioning of hospitals and their bed counters.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_yaml2 as serde_yaml;
use models::errors::{DispatchError, DispatchResult};
use models::{Coordinate, Hospital, HospitalBeds, HospitalId};

use crate::capacity::CapacityStore;
use crate::storage_engine::HospitalDirectory;

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedHospital {
    pub id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub total_beds: u32,
    pub available_beds: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl SeedHospital {
    fn to_records(&self) -> DispatchResult<(Hospital, HospitalBeds)> {
        let id = HospitalId(self.id);
        let coordinate = Coordinate::checked(self.latitude, self.longitude)
            .map_err(|e| DispatchError::InvalidData(format!("seed hospital {}: {}", self.id, e)))?;
        let beds = HospitalBeds::new(id, self.total_beds, self.available_beds)?;

        let mut hospital = Hospital::new(id, self.name.clone(), coordinate);
        hospital.address = self.address.clone();
        hospital.phone = self.phone.clone();
        hospital.is_active = self.active;
        Ok((hospital, beds))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SeedFile {
    pub hospitals: Vec<SeedHospital>,
}

impl SeedFile {
    /// Three hospitals in Pune; used when no seed file is configured.
    pub fn builtin() -> Self {
        let hospital = |id, name: &str, latitude, longitude, address: &str, phone: &str, total_beds, available_beds| {
            SeedHospital {
                id,
                name: name.to_string(),
                latitude,
                longitude,
                address: Some(address.to_string()),
                phone: Some(phone.to_string()),
                total_beds,
                available_beds,
                active: true,
            }
        };
        SeedFile {
            hospitals: vec![
                hospital(1, "City General Hospital", 18.5204, 73.8567, "123 Main Street, Pune", "020-12345678", 100, 25),
                hospital(2, "Metro Medical Center", 18.5314, 73.8446, "456 Park Avenue, Pune", "020-87654321", 80, 15),
                hospital(3, "Emergency Care Hospital", 18.5074, 73.8077, "789 Emergency Lane, Pune", "020-11223344", 120, 30),
            ],
        }
    }

    /// Checks every entry before anything is written.
    pub fn validate(&self) -> DispatchResult<Vec<(Hospital, HospitalBeds)>> {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(self.hospitals.len());
        for entry in &self.hospitals {
            if !seen.insert(entry.id) {
                return Err(DispatchError::InvalidData(format!("duplicate seed hospital id {}", entry.id)));
            }
            records.push(entry.to_records()?);
        }
        Ok(records)
    }
}

pub fn load_seed_file(path: &Path) -> Result<SeedFile> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read seed file: {}", path.display()))?;
    serde_yaml::from_str::<SeedFile>(&content).map_err(|e| {
        error!("YAML parsing error for seed file {}: {:?}", path.display(), e);
        anyhow!("invalid seed file {}: {:?}", path.display(), e)
    })
}

/// Writes the seed into empty stores. Returns how many hospitals were
/// provisioned; zero when the directory already holds hospitals.
pub async fn provision_from_seed(
    hospitals: &dyn HospitalDirectory,
    capacity: &dyn CapacityStore,
    seed: &SeedFile,
) -> DispatchResult<usize> {
    let existing = hospitals.count().await?;
    if existing > 0 {
        info!("Directory already holds {} hospitals, skipping seed", existing);
        return Ok(0);
    }

    let records = seed.validate()?;
    let provisioned = records.len();
    for (hospital, beds) in records {
        // Counter first, so a visible hospital always has one.
        capacity.provision(beds).await?;
        info!("Provisioned hospital {} ({})", hospital.id, hospital.name);
        hospitals.upsert(hospital).await?;
    }
    Ok(provisioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::InMemoryCapacityStore;
    use crate::storage_engine::InMemoryStorage;

    #[test]
    fn parses_seed_yaml() {
        let yaml = r#"
hospitals:
  - id: 7
    name: Ruby Hall Clinic
    latitude: 18.5303
    longitude: 73.8768
    total_beds: 40
    available_beds: 4
  - id: 8
    name: Closed Wing
    latitude: 18.5
    longitude: 73.8
    total_beds: 10
    available_beds: 0
    active: false
"#;
        let seed: SeedFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(seed.hospitals.len(), 2);
        assert!(seed.hospitals[0].active);
        assert!(!seed.hospitals[1].active);
        assert!(seed.hospitals[0].address.is_none());
    }

    #[test]
    fn bundled_seed_file_matches_builtin_set() {
        let seed: SeedFile = serde_yaml::from_str(include_str!("../../config/seed_hospitals.yaml")).unwrap();
        assert_eq!(seed, SeedFile::builtin());
    }

    #[test]
    fn rejects_more_available_than_total() {
        let mut seed = SeedFile::builtin();
        seed.hospitals[1].available_beds = 500;
        assert!(matches!(seed.validate(), Err(DispatchError::InvalidData(_))));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut seed = SeedFile::builtin();
        seed.hospitals[2].id = 1;
        assert!(seed.validate().is_err());
    }

    #[tokio::test]
    async fn provisions_once_then_skips() {
        let storage = InMemoryStorage::new();
        let capacity = InMemoryCapacityStore::new();
        let seed = SeedFile::builtin();

        assert_eq!(provision_from_seed(&storage, &capacity, &seed).await.unwrap(), 3);
        assert_eq!(capacity.snapshot(HospitalId(3)).await.unwrap().available_beds(), 30);

        capacity.try_reserve(HospitalId(3)).await.unwrap();
        assert_eq!(provision_from_seed(&storage, &capacity, &seed).await.unwrap(), 0);
        assert_eq!(capacity.snapshot(HospitalId(3)).await.unwrap().available_beds(), 29);
    }
}
