//! Detection session state
//!
//! Owned exclusively by the detection controller; handlers only ever see
//! cloned snapshots.

use super::{DispatchOutcome, SpeciesRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wildwatch_common::DetectionPhase;

/// Phase change produced by [`DetectionState::transition_to`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub old_phase: DetectionPhase,
    pub new_phase: DetectionPhase,
    pub detection_id: Option<Uuid>,
    pub transitioned_at: DateTime<Utc>,
}

/// Current detection state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionState {
    pub phase: DetectionPhase,

    /// Label reported by the classifier, registered or not
    pub last_label: Option<String>,

    /// Registry record for `last_label`, None when unregistered
    pub resolved_species: Option<SpeciesRecord>,

    /// Kept across acknowledge until the next dispatch replaces it
    pub last_dispatch_outcome: Option<DispatchOutcome>,

    /// Assigned when classification starts
    pub detection_id: Option<Uuid>,

    pub updated_at: DateTime<Utc>,
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionState {
    /// Fresh session state in IDLE
    pub fn new() -> Self {
        Self {
            phase: DetectionPhase::Idle,
            last_label: None,
            resolved_species: None,
            last_dispatch_outcome: None,
            detection_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Move to a new phase and stamp the change
    pub fn transition_to(&mut self, new_phase: DetectionPhase) -> PhaseTransition {
        let old_phase = self.phase;
        self.phase = new_phase;
        self.updated_at = Utc::now();

        PhaseTransition {
            old_phase,
            new_phase,
            detection_id: self.detection_id,
            transitioned_at: self.updated_at,
        }
    }

    /// Resolved species is registered and DANGEROUS
    pub fn is_hazardous(&self) -> bool {
        self.resolved_species
            .as_ref()
            .map(SpeciesRecord::is_dangerous)
            .unwrap_or(false)
    }

    /// Drop everything tied to the current detection
    pub fn clear_detection(&mut self) {
        self.last_label = None;
        self.resolved_species = None;
        self.detection_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildwatch_common::HazardLevel;

    #[test]
    fn test_new_state_is_idle() {
        let state = DetectionState::new();
        assert_eq!(state.phase, DetectionPhase::Idle);
        assert!(state.last_label.is_none());
        assert!(state.resolved_species.is_none());
        assert!(state.last_dispatch_outcome.is_none());
        assert!(!state.is_hazardous());
    }

    #[test]
    fn test_transition_reports_old_and_new() {
        let mut state = DetectionState::new();
        let id = Uuid::new_v4();
        state.detection_id = Some(id);

        let t = state.transition_to(DetectionPhase::Classifying);
        assert_eq!(t.old_phase, DetectionPhase::Idle);
        assert_eq!(t.new_phase, DetectionPhase::Classifying);
        assert_eq!(t.detection_id, Some(id));
        assert_eq!(state.phase, DetectionPhase::Classifying);
        assert_eq!(state.updated_at, t.transitioned_at);
    }

    #[test]
    fn test_hazard_follows_resolved_species() {
        let mut state = DetectionState::new();
        state.resolved_species = Some(SpeciesRecord::new(
            "dog",
            "Dog",
            "Loyal Guardian",
            HazardLevel::Safe,
            "Safe",
        ));
        assert!(!state.is_hazardous());

        state.resolved_species = Some(SpeciesRecord::new(
            "tiger",
            "Tiger",
            "Predator",
            HazardLevel::Dangerous,
            "DANGER",
        ));
        assert!(state.is_hazardous());
    }

    #[test]
    fn test_serialized_phase_name() {
        let value = serde_json::to_value(DetectionState::new()).unwrap();
        assert_eq!(value["phase"], "IDLE");
        assert!(value["last_label"].is_null());
    }
}
