// lib/src/assignment/engine.rs
//! Hospital selection and the redirect protocol.
//!
//! Ranking uses capacity snapshots, but only `CapacityStore::try_reserve`
//! decides whether a bed is taken. Each assign/redirect runs in its own
//! spawned task: once a reservation succeeds the record is persisted even if
//! the caller stops waiting.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use models::errors::{DispatchError, DispatchResult};
use models::{
    AssignmentResult, AssignmentState, Coordinate, DistanceResult, EmergencyId, EmergencyRecord, FailureReason,
    Hospital, HospitalBeds, HospitalCandidate, HospitalId, TargetDepartment,
};

use crate::capacity::CapacityStore;
use crate::config::AssignmentSettings;
use crate::distance::DistanceRanker;
use crate::storage_engine::{EmergencyRepository, HospitalDirectory, StorageBundle};

/// Intake payload for a new emergency report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmergency {
    pub origin: Option<Coordinate>,
    pub target_department: TargetDepartment,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub emergency_id: EmergencyId,
    /// `None` when the report does not target a hospital.
    pub assignment: Option<AssignmentResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalStatus {
    pub hospital: Hospital,
    /// `None` when the counter could not be read.
    pub beds: Option<HospitalBeds>,
}

struct EngineCore {
    hospitals: Arc<dyn HospitalDirectory>,
    capacity: Arc<dyn CapacityStore>,
    emergencies: Arc<dyn EmergencyRepository>,
    ranker: Arc<dyn DistanceRanker>,
    settings: AssignmentSettings,
    in_flight: StdMutex<HashSet<EmergencyId>>,
}

/// Marks one emergency as being worked on by this engine. Dropping the claim
/// frees it.
struct InFlightClaim<'a> {
    in_flight: &'a StdMutex<HashSet<EmergencyId>>,
    id: EmergencyId,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.id);
    }
}

#[derive(Clone)]
pub struct AssignmentEngine {
    core: Arc<EngineCore>,
}

impl AssignmentEngine {
    pub fn new(
        hospitals: Arc<dyn HospitalDirectory>,
        capacity: Arc<dyn CapacityStore>,
        emergencies: Arc<dyn EmergencyRepository>,
        ranker: Arc<dyn DistanceRanker>,
        settings: AssignmentSettings,
    ) -> Self {
        info!(
            "Assignment engine using {} ranking, {} capacity, max {} redirects",
            ranker.get_type(),
            capacity.get_type(),
            settings.max_redirects
        );
        AssignmentEngine {
            core: Arc::new(EngineCore {
                hospitals,
                capacity,
                emergencies,
                ranker,
                settings,
                in_flight: StdMutex::new(HashSet::new()),
            }),
        }
    }

    pub fn from_bundle(bundle: &StorageBundle, ranker: Arc<dyn DistanceRanker>, settings: AssignmentSettings) -> Self {
        AssignmentEngine::new(
            bundle.hospitals.clone(),
            bundle.capacity.clone(),
            bundle.emergencies.clone(),
            ranker,
            settings,
        )
    }

    /// Assigns a stored emergency to the nearest hospital that grants a bed.
    pub async fn assign(&self, emergency_id: EmergencyId) -> DispatchResult<AssignmentResult> {
        let core = self.core.clone();
        tokio::spawn(async move { core.assign(emergency_id).await }).await?
    }

    /// Hospital rejection: frees the held bed and assigns elsewhere, never to
    /// a hospital that has already rejected this emergency.
    pub async fn redirect(&self, emergency_id: EmergencyId, reason: &str) -> DispatchResult<AssignmentResult> {
        let core = self.core.clone();
        let reason = reason.to_string();
        tokio::spawn(async move { core.redirect(emergency_id, reason).await }).await?
    }

    /// Read-only ranking of all active hospitals. Reserves nothing.
    pub async fn get_nearest_hospitals(&self, latitude: f64, longitude: f64) -> DispatchResult<Vec<DistanceResult>> {
        let origin = Coordinate::checked(latitude, longitude)?;
        let hospitals = self.core.hospitals.active_hospitals().await?;
        let candidates = self.core.load_candidates(hospitals).await;
        Ok(self.core.ranker.rank(&origin, &candidates).await)
    }

    /// Stores a new report and, when it is addressed to a hospital, assigns it.
    pub async fn report(&self, report: NewEmergency) -> DispatchResult<ReportOutcome> {
        if let Some(origin) = &report.origin {
            origin.validate()?;
        }
        let mut record = EmergencyRecord::new(report.origin, report.target_department);
        record.description = report.description;
        let emergency_id = record.id;
        let targets_hospital = record.target_department.includes_hospital();
        self.core.emergencies.create(record).await?;
        info!("Recorded emergency {} for {}", emergency_id, report.target_department);

        let assignment = if targets_hospital {
            Some(self.assign(emergency_id).await?)
        } else {
            None
        };
        Ok(ReportOutcome { emergency_id, assignment })
    }

    /// Assigns every stored emergency that targets a hospital, carries
    /// coordinates and holds no bed: never assigned, or left `Redirected` by
    /// a redirect that could not finish. Records that fail stay as they are;
    /// nothing is assigned without a reservation.
    pub async fn assign_pending(&self) -> DispatchResult<Vec<AssignmentResult>> {
        let pending: Vec<EmergencyId> = self
            .core
            .emergencies
            .list()
            .await?
            .into_iter()
            .filter(|r| {
                matches!(r.state, AssignmentState::Unassigned | AssignmentState::Redirected)
                    && r.target_department.includes_hospital()
                    && r.origin.is_some()
            })
            .map(|r| r.id)
            .collect();
        info!("Backfilling {} emergencies without a bed", pending.len());

        let mut results = Vec::with_capacity(pending.len());
        for emergency_id in pending {
            match self.assign(emergency_id).await {
                Ok(result) => results.push(result),
                Err(e) => warn!("Backfill of emergency {} failed: {}", emergency_id, e),
            }
        }
        Ok(results)
    }

    pub async fn get_emergency(&self, emergency_id: EmergencyId) -> DispatchResult<EmergencyRecord> {
        self.core.load(emergency_id).await
    }

    /// Every hospital with its current counters, active or not.
    pub async fn hospital_overview(&self) -> DispatchResult<Vec<HospitalStatus>> {
        let hospitals = self.core.hospitals.list_all().await?;
        let snapshots = join_all(hospitals.iter().map(|h| self.core.capacity.snapshot(h.id))).await;
        Ok(hospitals
            .into_iter()
            .zip(snapshots)
            .map(|(hospital, beds)| HospitalStatus { hospital, beds: beds.ok() })
            .collect())
    }
}

impl EngineCore {
    fn claim(&self, id: EmergencyId) -> DispatchResult<InFlightClaim<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(id) {
            return Err(DispatchError::InvalidState(format!(
                "emergency {} is already being assigned",
                id
            )));
        }
        Ok(InFlightClaim { in_flight: &self.in_flight, id })
    }

    async fn load(&self, id: EmergencyId) -> DispatchResult<EmergencyRecord> {
        self.emergencies
            .get(id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("emergency {}", id)))
    }

    /// Pairs each hospital with a capacity snapshot. A failed read keeps the
    /// hospital in the running without one.
    async fn load_candidates(&self, hospitals: Vec<Hospital>) -> Vec<HospitalCandidate> {
        let snapshots = join_all(hospitals.iter().map(|h| self.capacity.snapshot(h.id))).await;
        hospitals
            .into_iter()
            .zip(snapshots)
            .map(|(hospital, snapshot)| match snapshot {
                Ok(beds) => HospitalCandidate::new(hospital, &beds),
                Err(e) => {
                    warn!("No capacity snapshot for hospital {}: {}", hospital.id, e);
                    HospitalCandidate::without_snapshot(hospital)
                }
            })
            .collect()
    }

    async fn assign(&self, id: EmergencyId) -> DispatchResult<AssignmentResult> {
        let _claim = self.claim(id)?;
        let mut record = self.load(id).await?;

        if !record.target_department.includes_hospital() {
            debug!("Emergency {} targets {}; no hospital assignment", id, record.target_department);
            return Ok(AssignmentResult::failed(id, FailureReason::NotHospitalTarget));
        }
        if record.state == AssignmentState::Assigned {
            return Err(DispatchError::InvalidState(format!(
                "emergency {} is already assigned to hospital {}",
                id,
                record.assigned_hospital.map(|h| h.to_string()).unwrap_or_default()
            )));
        }
        if !record.state.can_start_assignment() && record.state != AssignmentState::NoLocation {
            return Err(DispatchError::InvalidState(format!(
                "emergency {} cannot be assigned from state {}",
                id, record.state
            )));
        }
        self.run_assignment(&mut record).await
    }

    async fn run_assignment(&self, record: &mut EmergencyRecord) -> DispatchResult<AssignmentResult> {
        let origin = match record.origin.filter(|c| c.validate().is_ok()) {
            Some(origin) => origin,
            None => {
                warn!("Emergency {} has no usable location; not assigning", record.id);
                return self.finish_failed(record, AssignmentState::NoLocation, FailureReason::NoLocation).await;
            }
        };
        record.state = AssignmentState::Assigning;

        let active = self.hospitals.active_hospitals().await?;
        if active.is_empty() {
            warn!("No active hospitals for emergency {}", record.id);
            return self.finish_failed(record, AssignmentState::Failed, FailureReason::NoHospitals).await;
        }
        let eligible: Vec<Hospital> = active
            .into_iter()
            .filter(|h| !record.rejected_hospitals.contains(&h.id))
            .collect();

        let candidates = self.load_candidates(eligible).await;
        let ranked = self.ranker.rank(&origin, &candidates).await;
        debug!(
            "Emergency {}: {} ranked candidates via {}",
            record.id,
            ranked.len(),
            self.ranker.get_type()
        );

        for candidate in &ranked {
            match self.capacity.try_reserve(candidate.hospital_id).await {
                Ok(true) => return self.finish_assigned(record, candidate).await,
                Ok(false) => debug!(
                    "Hospital {} ({}) has no free bed for emergency {}",
                    candidate.hospital_id, candidate.hospital_name, record.id
                ),
                Err(e) => warn!(
                    "Skipping hospital {} for emergency {}: {}",
                    candidate.hospital_id, record.id, e
                ),
            }
        }

        info!("No hospital could take emergency {}", record.id);
        self.finish_failed(record, AssignmentState::Failed, FailureReason::NoAvailableBeds).await
    }

    /// Persists the assignment. If that fails, the bed just taken is handed
    /// back before the error is returned.
    async fn finish_assigned(&self, record: &mut EmergencyRecord, ranked: &DistanceResult) -> DispatchResult<AssignmentResult> {
        record.state = AssignmentState::Assigned;
        record.assigned_hospital = Some(ranked.hospital_id);
        record.touch();

        if let Err(e) = self.emergencies.save(record).await {
            error!(
                "Failed to persist assignment of emergency {} to hospital {}: {}; releasing bed",
                record.id, ranked.hospital_id, e
            );
            if let Err(release_err) = self.capacity.release(ranked.hospital_id).await {
                error!("Release of bed at hospital {} also failed: {}", ranked.hospital_id, release_err);
            }
            return Err(e);
        }

        let result = AssignmentResult::assigned(record.id, ranked);
        info!("{} [emergency {}]", result.message(), record.id);
        Ok(result)
    }

    async fn finish_failed(
        &self,
        record: &mut EmergencyRecord,
        state: AssignmentState,
        reason: FailureReason,
    ) -> DispatchResult<AssignmentResult> {
        record.state = state;
        record.assigned_hospital = None;
        record.touch();
        self.emergencies.save(record).await?;
        Ok(AssignmentResult::failed(record.id, reason))
    }

    async fn redirect(&self, id: EmergencyId, reason: String) -> DispatchResult<AssignmentResult> {
        let _claim = self.claim(id)?;
        let mut record = self.load(id).await?;

        let rejecting = match (record.state, record.assigned_hospital) {
            (AssignmentState::Assigned, Some(hospital_id)) => hospital_id,
            (state, _) => {
                return Err(DispatchError::InvalidState(format!(
                    "emergency {} is {}, only assigned emergencies can be redirected",
                    id, state
                )))
            }
        };

        self.capacity.release(rejecting).await?;

        record.state = AssignmentState::Redirected;
        record.assigned_hospital = None;
        if !record.rejected_hospitals.contains(&rejecting) {
            record.rejected_hospitals.push(rejecting);
        }
        record.redirect_count += 1;
        record.last_redirect_reason = Some(reason.clone());
        record.touch();
        info!(
            "Emergency {} rejected by hospital {} ({}); redirect {} of {}",
            id, rejecting, reason, record.redirect_count, self.settings.max_redirects
        );

        if record.redirect_count > self.settings.max_redirects {
            warn!("Emergency {} exceeded the redirect limit", id);
            record.state = AssignmentState::Failed;
            if let Err(e) = self.emergencies.save(&record).await {
                self.restore_reservation(id, rejecting).await;
                return Err(e);
            }
            return Ok(AssignmentResult::failed(id, FailureReason::RedirectLimitExceeded));
        }

        if let Err(e) = self.emergencies.save(&record).await {
            self.restore_reservation(id, rejecting).await;
            return Err(e);
        }
        self.run_assignment(&mut record).await
    }

    /// The stored record still names `hospital_id`; take the bed back so the
    /// counters agree with it.
    async fn restore_reservation(&self, id: EmergencyId, hospital_id: HospitalId) {
        error!("Could not persist redirect of emergency {}; re-reserving hospital {}", id, hospital_id);
        match self.capacity.try_reserve(hospital_id).await {
            Ok(true) => {}
            Ok(false) => error!("Hospital {} filled up before emergency {} could be restored", hospital_id, id),
            Err(e) => error!("Re-reserve at hospital {} failed: {}", hospital_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::InMemoryCapacityStore;
    use crate::distance::HaversineRanker;
    use crate::storage_engine::InMemoryStorage;

    fn engine() -> AssignmentEngine {
        let storage = Arc::new(InMemoryStorage::new());
        AssignmentEngine::new(
            storage.clone(),
            Arc::new(InMemoryCapacityStore::new()),
            storage,
            Arc::new(HaversineRanker),
            AssignmentSettings::default(),
        )
    }

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let engine = engine();
        let id = EmergencyId::new_v4();
        let claim = engine.core.claim(id).unwrap();
        assert!(matches!(engine.core.claim(id), Err(DispatchError::InvalidState(_))));
        drop(claim);
        assert!(engine.core.claim(id).is_ok());
    }

    #[tokio::test]
    async fn police_report_is_stored_but_not_assigned() {
        let engine = engine();
        let outcome = engine
            .report(NewEmergency {
                origin: Some(Coordinate::new(18.52, 73.85)),
                target_department: TargetDepartment::Police,
                description: Some("theft".to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.assignment.is_none());
        let record = engine.get_emergency(outcome.emergency_id).await.unwrap();
        assert_eq!(record.state, AssignmentState::Unassigned);
    }

    #[tokio::test]
    async fn report_rejects_out_of_range_origin() {
        let engine = engine();
        let result = engine
            .report(NewEmergency {
                origin: Some(Coordinate::new(95.0, 0.0)),
                target_department: TargetDepartment::Hospital,
                description: None,
            })
            .await;
        assert!(matches!(result, Err(DispatchError::InvalidData(_))));
    }

    #[tokio::test]
    async fn nearest_with_no_hospitals_is_empty() {
        let engine = engine();
        assert!(engine.get_nearest_hospitals(18.5, 73.8).await.unwrap().is_empty());
        assert!(engine.get_nearest_hospitals(200.0, 73.8).await.is_err());
    }
}
