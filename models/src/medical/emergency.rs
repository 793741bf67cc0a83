// models/src/medical/emergency.rs
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DispatchError;
use crate::geo::Coordinate;
use crate::identifiers::{EmergencyId, HospitalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetDepartment {
    Police,
    Hospital,
    Both,
}

impl TargetDepartment {
    pub fn includes_hospital(&self) -> bool {
        matches!(self, TargetDepartment::Hospital | TargetDepartment::Both)
    }
}

impl FromStr for TargetDepartment {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "police" => Ok(TargetDepartment::Police),
            "hospital" => Ok(TargetDepartment::Hospital),
            "both" => Ok(TargetDepartment::Both),
            other => Err(DispatchError::InvalidData(format!(
                "Invalid target department: '{}'. Supported values: police, hospital, both",
                other
            ))),
        }
    }
}

impl fmt::Display for TargetDepartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetDepartment::Police => "POLICE",
            TargetDepartment::Hospital => "HOSPITAL",
            TargetDepartment::Both => "BOTH",
        };
        write!(f, "{}", s)
    }
}

/// Assignment lifecycle of an emergency record.
///
/// `Unassigned -> Assigning -> Assigned | Failed`, and from `Assigned` a
/// rejection moves through `Redirected` back to `Assigning`. `NoLocation` is
/// terminal for records that arrive without coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentState {
    Unassigned,
    Assigning,
    Assigned,
    Redirected,
    Failed,
    NoLocation,
}

impl AssignmentState {
    /// States from which a fresh assignment attempt may start.
    pub fn can_start_assignment(&self) -> bool {
        matches!(
            self,
            AssignmentState::Unassigned | AssignmentState::Redirected | AssignmentState::Failed
        )
    }
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentState::Unassigned => "Unassigned",
            AssignmentState::Assigning => "Assigning",
            AssignmentState::Assigned => "Assigned",
            AssignmentState::Redirected => "Redirected",
            AssignmentState::Failed => "Failed",
            AssignmentState::NoLocation => "NoLocation",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyRecord {
    pub id: EmergencyId,
    pub origin: Option<Coordinate>,
    pub target_department: TargetDepartment,
    pub description: Option<String>,
    pub state: AssignmentState,
    pub assigned_hospital: Option<HospitalId>,
    /// Every hospital that has rejected this emergency, oldest first.
    #[serde(default)]
    pub rejected_hospitals: Vec<HospitalId>,
    #[serde(default)]
    pub redirect_count: u32,
    #[serde(default)]
    pub last_redirect_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmergencyRecord {
    pub fn new(origin: Option<Coordinate>, target_department: TargetDepartment) -> Self {
        let now = Utc::now();
        EmergencyRecord {
            id: EmergencyId::new_v4(),
            origin,
            target_department,
            description: None,
            state: AssignmentState::Unassigned,
            assigned_hospital: None,
            rejected_hospitals: Vec::new(),
            redirect_count: 0,
            last_redirect_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
