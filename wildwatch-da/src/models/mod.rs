//! Data models for wildwatch-da

pub mod detection_state;
pub mod dispatch_outcome;
pub mod species;

pub use detection_state::{DetectionState, PhaseTransition};
pub use dispatch_outcome::{DispatchOutcome, DISPATCH_ABANDONED};
pub use species::{RegistryError, SpeciesRecord, SpeciesRegistry};
