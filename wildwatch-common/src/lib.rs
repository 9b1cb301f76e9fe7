//! # WildWatch Common Library
//!
//! Shared code for the WildWatch services:
//! - Error type used by configuration loading
//! - TOML configuration model and file resolution
//! - Event types (WildwatchEvent enum) and EventBus
//! - SSE stream helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{DetectionPhase, EventBus, HazardLevel, WildwatchEvent};
