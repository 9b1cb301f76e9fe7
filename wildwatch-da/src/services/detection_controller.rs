//! Detection controller
//!
//! Owns the session's [`DetectionState`] and drives it through
//! IDLE → CLASSIFYING → RESOLVED → (IDLE | ALERT_SENDING → ALERT_RESULT → IDLE).
//!
//! The state lock is only held between suspension points. While a
//! classification or dispatch is awaited, an [`InFlightGuard`] watches the
//! awaiting future: if the caller drops it, the guard moves the state to where
//! an abandoned operation ends up, and the detection id check discards any
//! result that arrives for a superseded operation.

use crate::models::{DetectionState, DispatchOutcome, PhaseTransition, SpeciesRegistry};
use crate::services::alert_dispatcher::{AlertDispatcher, DispatchError};
use crate::services::classifier_client::{AudioSample, ClassificationError, Classifier};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wildwatch_common::{DetectionPhase, EventBus, WildwatchEvent};

const CLASSIFICATION_ABANDONED: &str = "classification abandoned";

/// Detection controller errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Classifier failed; text is the upstream diagnostic
    #[error("Server error: {0}")]
    ServiceError(String),

    #[error("Operation already in progress (phase {0})")]
    AlreadyInProgress(DetectionPhase),

    #[error("Not dangerous: {0}")]
    NotDangerous(String),

    #[error("Operation not allowed in phase {0}")]
    InvalidPhase(DetectionPhase),
}

impl From<ClassificationError> for DetectionError {
    fn from(e: ClassificationError) -> Self {
        match e {
            ClassificationError::InvalidInput(msg) => DetectionError::InvalidInput(msg),
            ClassificationError::ServiceError(msg) => DetectionError::ServiceError(msg),
        }
    }
}

impl From<DispatchError> for DetectionError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::InvalidInput(msg) => DetectionError::InvalidInput(msg),
        }
    }
}

pub struct DetectionController {
    state: Mutex<DetectionState>,
    registry: Arc<SpeciesRegistry>,
    classifier: Arc<dyn Classifier>,
    dispatcher: AlertDispatcher,
    recipients: Vec<String>,
    event_bus: EventBus,
    classification_timeout: Option<Duration>,
}

impl DetectionController {
    pub fn new(
        registry: Arc<SpeciesRegistry>,
        classifier: Arc<dyn Classifier>,
        dispatcher: AlertDispatcher,
        recipients: Vec<String>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            state: Mutex::new(DetectionState::new()),
            registry,
            classifier,
            dispatcher,
            recipients,
            event_bus,
            classification_timeout: None,
        }
    }

    /// Give up on classifications that take longer than `timeout`
    pub fn with_classification_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.classification_timeout = timeout;
        self
    }

    /// Snapshot of the current state
    pub fn state(&self) -> DetectionState {
        self.lock_state().clone()
    }

    pub fn phase(&self) -> DetectionPhase {
        self.lock_state().phase
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn registry(&self) -> &Arc<SpeciesRegistry> {
        &self.registry
    }

    pub fn gateway_name(&self) -> &'static str {
        self.dispatcher.gateway_name()
    }

    /// Classify a sample and resolve the label against the registry
    ///
    /// Only legal from IDLE. Returns the RESOLVED state on success; on
    /// classifier failure the state is back in IDLE and the error is returned.
    pub async fn submit_sample(&self, sample: AudioSample) -> Result<DetectionState, DetectionError> {
        if sample.is_empty() {
            return Err(DetectionError::InvalidInput(
                "audio sample is empty".to_string(),
            ));
        }

        let detection_id = {
            let mut state = self.lock_state();
            if state.phase != DetectionPhase::Idle {
                debug!(phase = %state.phase, "Rejecting sample: controller busy");
                return Err(DetectionError::AlreadyInProgress(state.phase));
            }

            let id = Uuid::new_v4();
            state.clear_detection();
            state.detection_id = Some(id);
            let transition = state.transition_to(DetectionPhase::Classifying);
            self.publish_transition(transition);
            id
        };

        info!(
            detection_id = %detection_id,
            bytes = sample.len(),
            "Classifying audio sample"
        );

        let mut guard = InFlightGuard::new(self, detection_id, InFlight::Classification);
        let result = self.classify_with_timeout(&sample).await;
        guard.disarm();

        let mut state = self.lock_state();
        if !Self::is_current(&state, detection_id, DetectionPhase::Classifying) {
            warn!(detection_id = %detection_id, "Discarding stale classification result");
            return Err(DetectionError::ServiceError(
                "classification result discarded".to_string(),
            ));
        }

        match result {
            Ok(label) => {
                let species = self.registry.lookup(&label).cloned();

                match &species {
                    Some(record) => info!(
                        detection_id = %detection_id,
                        label = %label,
                        hazard = ?record.hazard_level,
                        "Species resolved"
                    ),
                    None => warn!(
                        detection_id = %detection_id,
                        label = %label,
                        "Classifier label not in species registry"
                    ),
                }

                self.event_bus.emit_lossy(WildwatchEvent::SpeciesDetected {
                    detection_id,
                    label: label.clone(),
                    title: species.as_ref().map(|s| s.title.clone()),
                    hazard_level: species.as_ref().map(|s| s.hazard_level),
                    timestamp: Utc::now(),
                });

                state.last_label = Some(label);
                state.resolved_species = species;
                let transition = state.transition_to(DetectionPhase::Resolved);
                self.publish_transition(transition);
                Ok(state.clone())
            }
            Err(e) => {
                warn!(detection_id = %detection_id, error = %e, "Classification failed");
                self.fail_classification(&mut state, detection_id, &e.to_string());
                Err(e.into())
            }
        }
    }

    /// Send the resolved species' warning to every configured recipient
    ///
    /// Only legal from RESOLVED with a DANGEROUS species. Delivery failures do
    /// not make this fail; they are recorded in the returned outcome.
    pub async fn dispatch_alert(&self) -> Result<DispatchOutcome, DetectionError> {
        let (detection_id, label, message) = {
            let mut state = self.lock_state();
            match state.phase {
                phase if phase.is_in_flight() => {
                    return Err(DetectionError::AlreadyInProgress(phase));
                }
                DetectionPhase::Idle => {
                    return Err(DetectionError::NotDangerous(
                        "no species has been resolved".to_string(),
                    ));
                }
                DetectionPhase::AlertResult => {
                    return Err(DetectionError::InvalidPhase(state.phase));
                }
                _ => {}
            }

            if !state.is_hazardous() {
                return Err(DetectionError::NotDangerous(match &state.resolved_species {
                    Some(species) => format!("{} is not a dangerous species", species.label),
                    None => format!(
                        "label '{}' is not a registered species",
                        state.last_label.as_deref().unwrap_or_default()
                    ),
                }));
            }
            let Some(species) = state.resolved_species.clone() else {
                return Err(DetectionError::InvalidPhase(state.phase));
            };

            AlertDispatcher::validate(&species.warning_template, &self.recipients)?;

            let transition = state.transition_to(DetectionPhase::AlertSending);
            self.publish_transition(transition);
            (state.detection_id, species.label, species.warning_template)
        };

        info!(
            label = %label,
            recipients = self.recipients.len(),
            "Dispatching hazard alert"
        );

        let mut guard = InFlightGuard::new(
            self,
            detection_id.unwrap_or_default(),
            InFlight::Dispatch {
                message: message.clone(),
            },
        );
        let result = self.dispatcher.dispatch(&message, &self.recipients).await;
        guard.disarm();

        let mut state = self.lock_state();
        if state.phase != DetectionPhase::AlertSending || state.detection_id != detection_id {
            warn!(label = %label, "Discarding stale dispatch outcome");
            return Err(DetectionError::InvalidPhase(state.phase));
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                // Validated above; only reachable if the recipient list changed underneath
                let transition = state.transition_to(DetectionPhase::Resolved);
                self.publish_transition(transition);
                return Err(e.into());
            }
        };

        self.finish_dispatch(&mut state, label, outcome.clone());
        Ok(outcome)
    }

    /// Return to IDLE from RESOLVED or ALERT_RESULT
    ///
    /// A no-op from IDLE. The last dispatch outcome survives until the next
    /// dispatch replaces it.
    pub fn acknowledge(&self) -> Result<DetectionState, DetectionError> {
        let mut state = self.lock_state();
        match state.phase {
            DetectionPhase::Idle => Ok(state.clone()),
            phase if phase.is_in_flight() => Err(DetectionError::AlreadyInProgress(phase)),
            _ => {
                debug!(label = ?state.last_label, "Detection acknowledged");
                state.clear_detection();
                let transition = state.transition_to(DetectionPhase::Idle);
                self.publish_transition(transition);
                Ok(state.clone())
            }
        }
    }

    async fn classify_with_timeout(&self, sample: &AudioSample) -> Result<String, ClassificationError> {
        match self.classification_timeout {
            Some(limit) => tokio::time::timeout(limit, self.classifier.classify(sample))
                .await
                .unwrap_or_else(|_| {
                    Err(ClassificationError::ServiceError(format!(
                        "classification timed out after {} ms",
                        limit.as_millis()
                    )))
                }),
            None => self.classifier.classify(sample).await,
        }
    }

    fn fail_classification(&self, state: &mut DetectionState, detection_id: Uuid, error: &str) {
        self.event_bus.emit_lossy(WildwatchEvent::ClassificationFailed {
            detection_id,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
        state.clear_detection();
        let transition = state.transition_to(DetectionPhase::Idle);
        self.publish_transition(transition);
    }

    fn finish_dispatch(&self, state: &mut DetectionState, label: String, outcome: DispatchOutcome) {
        self.event_bus.emit_lossy(WildwatchEvent::AlertDispatched {
            detection_id: state.detection_id,
            label,
            attempted: outcome.attempted.len(),
            succeeded: outcome.succeeded_count(),
            failed: outcome.failed_count(),
            overall_success: outcome.overall_success,
            timestamp: Utc::now(),
        });
        state.last_dispatch_outcome = Some(outcome);
        let transition = state.transition_to(DetectionPhase::AlertResult);
        self.publish_transition(transition);
    }

    /// Caller stopped waiting for an in-flight operation
    fn abandon(&self, detection_id: Uuid, operation: &InFlight) {
        let mut state = self.lock_state();
        match operation {
            InFlight::Classification => {
                if Self::is_current(&state, detection_id, DetectionPhase::Classifying) {
                    warn!(detection_id = %detection_id, "Classification abandoned");
                    self.fail_classification(&mut state, detection_id, CLASSIFICATION_ABANDONED);
                }
            }
            InFlight::Dispatch { message } => {
                if state.phase == DetectionPhase::AlertSending {
                    warn!("Alert dispatch abandoned");
                    let label = state
                        .resolved_species
                        .as_ref()
                        .map(|s| s.label.clone())
                        .unwrap_or_default();
                    let outcome = DispatchOutcome::abandoned(message.clone(), self.recipients.clone());
                    self.finish_dispatch(&mut state, label, outcome);
                }
            }
        }
    }

    fn is_current(state: &DetectionState, detection_id: Uuid, phase: DetectionPhase) -> bool {
        state.phase == phase && state.detection_id == Some(detection_id)
    }

    fn publish_transition(&self, transition: PhaseTransition) {
        debug!(
            old_phase = %transition.old_phase,
            new_phase = %transition.new_phase,
            "Detection phase changed"
        );
        self.event_bus.emit_lossy(WildwatchEvent::DetectionPhaseChanged {
            old_phase: transition.old_phase,
            new_phase: transition.new_phase,
            detection_id: transition.detection_id,
            timestamp: transition.transitioned_at,
        });
    }

    /// State lock; a panic while holding it leaves the state usable
    fn lock_state(&self) -> MutexGuard<'_, DetectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum InFlight {
    Classification,
    Dispatch { message: String },
}

/// Restores the state if the future awaiting an operation is dropped
struct InFlightGuard<'a> {
    controller: &'a DetectionController,
    detection_id: Uuid,
    operation: InFlight,
    armed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(controller: &'a DetectionController, detection_id: Uuid, operation: InFlight) -> Self {
        Self {
            controller,
            detection_id,
            operation,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon(self.detection_id, &self.operation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier_client::mock::MockClassifier;
    use crate::services::messaging_gateway::mock::MockGateway;

    fn controller(
        classifier: MockClassifier,
        gateway: Arc<MockGateway>,
        recipients: &[&str],
    ) -> (DetectionController, EventBus) {
        let bus = EventBus::new(64);
        let controller = DetectionController::new(
            Arc::new(SpeciesRegistry::builtin()),
            Arc::new(classifier),
            AlertDispatcher::new(gateway),
            recipients.iter().map(|r| r.to_string()).collect(),
            bus.clone(),
        );
        (controller, bus)
    }

    fn sample() -> AudioSample {
        AudioSample::new(vec![0u8; 64])
    }

    #[tokio::test]
    async fn test_registered_label_resolves() {
        let (c, _) = controller(MockClassifier::returning("tiger"), Arc::default(), &["A"]);
        let state = c.submit_sample(sample()).await.unwrap();

        assert_eq!(state.phase, DetectionPhase::Resolved);
        assert_eq!(state.last_label.as_deref(), Some("tiger"));
        assert_eq!(state.resolved_species.as_ref().unwrap().title, "Tiger");
        assert!(state.detection_id.is_some());
    }

    #[tokio::test]
    async fn test_unknown_label_keeps_label_without_species() {
        let (c, _) = controller(MockClassifier::returning("wolf"), Arc::default(), &["A"]);
        let state = c.submit_sample(sample()).await.unwrap();

        assert_eq!(state.phase, DetectionPhase::Resolved);
        assert_eq!(state.last_label.as_deref(), Some("wolf"));
        assert!(state.resolved_species.is_none());
    }

    #[tokio::test]
    async fn test_empty_sample_leaves_state_untouched() {
        let classifier = MockClassifier::returning("tiger");
        let (c, _) = controller(classifier, Arc::default(), &["A"]);

        let err = c.submit_sample(AudioSample::new(Vec::new())).await.unwrap_err();
        assert!(matches!(err, DetectionError::InvalidInput(_)));
        assert_eq!(c.phase(), DetectionPhase::Idle);
    }

    #[tokio::test]
    async fn test_classifier_failure_returns_to_idle() {
        let (c, bus) = controller(MockClassifier::failing("model offline"), Arc::default(), &["A"]);
        let mut rx = bus.subscribe();

        let err = c.submit_sample(sample()).await.unwrap_err();
        assert_eq!(err, DetectionError::ServiceError("model offline".to_string()));
        assert_eq!(c.phase(), DetectionPhase::Idle);
        assert!(c.state().detection_id.is_none());

        let types: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            types,
            vec!["DetectionPhaseChanged", "ClassificationFailed", "DetectionPhaseChanged"]
        );
    }

    #[tokio::test]
    async fn test_submit_while_resolved_is_rejected() {
        let (c, _) = controller(MockClassifier::returning("dog"), Arc::default(), &["A"]);
        c.submit_sample(sample()).await.unwrap();

        let err = c.submit_sample(sample()).await.unwrap_err();
        assert_eq!(err, DetectionError::AlreadyInProgress(DetectionPhase::Resolved));
    }

    #[tokio::test]
    async fn test_safe_species_not_dispatched() {
        let gateway = Arc::new(MockGateway::default());
        let (c, _) = controller(MockClassifier::returning("dog"), gateway.clone(), &["A"]);
        c.submit_sample(sample()).await.unwrap();

        let err = c.dispatch_alert().await.unwrap_err();
        assert!(matches!(err, DetectionError::NotDangerous(_)));
        assert_eq!(c.phase(), DetectionPhase::Resolved);
        assert!(gateway.sent_to().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_from_idle_is_not_dangerous() {
        let gateway = Arc::new(MockGateway::default());
        let (c, _) = controller(MockClassifier::returning("tiger"), gateway.clone(), &["A"]);

        assert!(matches!(
            c.dispatch_alert().await,
            Err(DetectionError::NotDangerous(_))
        ));
        assert!(gateway.sent_to().is_empty());
    }

    #[tokio::test]
    async fn test_dangerous_dispatch_reaches_alert_result() {
        let gateway = Arc::new(MockGateway::failing_for(&["B"]));
        let (c, _) = controller(MockClassifier::returning("leopard"), gateway.clone(), &["A", "B", "C"]);
        c.submit_sample(sample()).await.unwrap();

        let outcome = c.dispatch_alert().await.unwrap();
        assert!(!outcome.overall_success);
        assert_eq!(outcome.succeeded.len(), 2);
        assert!(outcome.failed.contains_key("B"));
        assert_eq!(
            outcome.message,
            "EXTREME DANGER! Leopard detected in vicinity. Find secure shelter immediately!"
        );

        let state = c.state();
        assert_eq!(state.phase, DetectionPhase::AlertResult);
        assert_eq!(state.last_dispatch_outcome, Some(outcome));

        // Second dispatch needs an acknowledge first
        assert_eq!(
            c.dispatch_alert().await.unwrap_err(),
            DetectionError::InvalidPhase(DetectionPhase::AlertResult)
        );
    }

    #[tokio::test]
    async fn test_empty_recipients_rejected_before_transition() {
        let gateway = Arc::new(MockGateway::default());
        let (c, _) = controller(MockClassifier::returning("tiger"), gateway.clone(), &[]);
        c.submit_sample(sample()).await.unwrap();

        assert!(matches!(
            c.dispatch_alert().await,
            Err(DetectionError::InvalidInput(_))
        ));
        assert_eq!(c.phase(), DetectionPhase::Resolved);
        assert!(gateway.sent_to().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_keeps_last_outcome() {
        let (c, _) = controller(MockClassifier::returning("elephant"), Arc::default(), &["A"]);
        c.submit_sample(sample()).await.unwrap();
        c.dispatch_alert().await.unwrap();

        let state = c.acknowledge().unwrap();
        assert_eq!(state.phase, DetectionPhase::Idle);
        assert!(state.last_label.is_none());
        assert!(state.resolved_species.is_none());
        assert!(state.detection_id.is_none());
        assert!(state.last_dispatch_outcome.is_some());
    }

    #[tokio::test]
    async fn test_acknowledge_from_idle_is_noop() {
        let (c, bus) = controller(MockClassifier::returning("tiger"), Arc::default(), &["A"]);
        let mut rx = bus.subscribe();
        let before = c.state();

        let after = c.acknowledge().unwrap();
        assert_eq!(before, after);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_abandoned_classification_returns_to_idle() {
        let classifier = MockClassifier::returning("tiger").with_delay(Duration::from_secs(5));
        let (c, _) = controller(classifier, Arc::default(), &["A"]);

        let result = tokio::time::timeout(Duration::from_millis(50), c.submit_sample(sample())).await;
        assert!(result.is_err());
        assert_eq!(c.phase(), DetectionPhase::Idle);
    }

    #[tokio::test]
    async fn test_classification_timeout_is_service_error() {
        let classifier = MockClassifier::returning("tiger").with_delay(Duration::from_secs(5));
        let (c, _) = controller(classifier, Arc::default(), &["A"]);
        let c = c.with_classification_timeout(Some(Duration::from_millis(50)));

        let err = c.submit_sample(sample()).await.unwrap_err();
        assert_eq!(
            err,
            DetectionError::ServiceError("classification timed out after 50 ms".to_string())
        );
        assert_eq!(c.phase(), DetectionPhase::Idle);
    }

    #[tokio::test]
    async fn test_abandoned_dispatch_fails_everyone() {
        let gateway = Arc::new(MockGateway::default().with_delay(Duration::from_secs(5)));
        let (c, _) = controller(MockClassifier::returning("tiger"), gateway, &["A", "B"]);
        c.submit_sample(sample()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(50), c.dispatch_alert()).await;
        assert!(result.is_err());

        let state = c.state();
        assert_eq!(state.phase, DetectionPhase::AlertResult);
        let outcome = state.last_dispatch_outcome.unwrap();
        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.failed.get("A").map(String::as_str), Some("dispatch abandoned"));
        assert_eq!(outcome.failed.get("B").map(String::as_str), Some("dispatch abandoned"));
    }
}
