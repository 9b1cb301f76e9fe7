//! HTTP API handlers for wildwatch-da
//!
//! JSON endpoints for the detection pipeline and carousel, plus an SSE
//! stream of pipeline events.

pub mod carousel;
pub mod detection;
pub mod health;
pub mod species;
pub mod sse;

pub use carousel::carousel_routes;
pub use detection::detection_routes;
pub use health::health_routes;
pub use species::species_routes;
pub use sse::event_stream;
