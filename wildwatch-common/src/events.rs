//! Event types for the WildWatch event system
//!
//! Provides shared event definitions and the EventBus used to push detection
//! progress to presentation clients over SSE.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Detection pipeline phase
///
/// IDLE → CLASSIFYING → RESOLVED → (IDLE | ALERT_SENDING → ALERT_RESULT → IDLE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionPhase {
    /// Waiting for a sample
    Idle,
    /// A sample is with the Classifier Service
    Classifying,
    /// Label received and looked up
    Resolved,
    /// Warning is being fanned out to recipients
    AlertSending,
    /// Dispatch finished, outcome available
    AlertResult,
}

impl DetectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionPhase::Idle => "IDLE",
            DetectionPhase::Classifying => "CLASSIFYING",
            DetectionPhase::Resolved => "RESOLVED",
            DetectionPhase::AlertSending => "ALERT_SENDING",
            DetectionPhase::AlertResult => "ALERT_RESULT",
        }
    }

    /// Phases with an outstanding asynchronous operation
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DetectionPhase::Classifying | DetectionPhase::AlertSending)
    }
}

impl std::fmt::Display for DetectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Species hazard classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HazardLevel {
    Safe,
    Dangerous,
}

impl HazardLevel {
    pub fn is_dangerous(&self) -> bool {
        matches!(self, HazardLevel::Dangerous)
    }
}

/// WildWatch event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WildwatchEvent {
    /// Detection controller moved between phases
    ///
    /// Triggers:
    /// - SSE: Update hazard banner and enabled controls
    DetectionPhaseChanged {
        old_phase: DetectionPhase,
        new_phase: DetectionPhase,
        /// Detection the transition belongs to (None once acknowledged)
        detection_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Classifier returned a label
    ///
    /// `title` and `hazard_level` are None when the label is not registered.
    SpeciesDetected {
        detection_id: Uuid,
        label: String,
        title: Option<String>,
        hazard_level: Option<HazardLevel>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Classification attempt failed or was abandoned
    ClassificationFailed {
        detection_id: Uuid,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Alert fan-out finished
    AlertDispatched {
        detection_id: Option<Uuid>,
        label: String,
        attempted: usize,
        succeeded: usize,
        failed: usize,
        overall_success: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Carousel moved to a new slide
    CarouselAdvanced {
        index: usize,
        label: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl WildwatchEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            WildwatchEvent::DetectionPhaseChanged { .. } => "DetectionPhaseChanged",
            WildwatchEvent::SpeciesDetected { .. } => "SpeciesDetected",
            WildwatchEvent::ClassificationFailed { .. } => "ClassificationFailed",
            WildwatchEvent::AlertDispatched { .. } => "AlertDispatched",
            WildwatchEvent::CarouselAdvanced { .. } => "CarouselAdvanced",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use wildwatch_common::events::{DetectionPhase, EventBus, WildwatchEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(WildwatchEvent::DetectionPhaseChanged {
///     old_phase: DetectionPhase::Idle,
///     new_phase: DetectionPhase::Classifying,
///     detection_id: None,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "DetectionPhaseChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WildwatchEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<WildwatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: WildwatchEvent,
    ) -> Result<usize, broadcast::error::SendError<WildwatchEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WildwatchEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
