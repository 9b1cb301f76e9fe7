//! wildwatch-da library interface
//!
//! Detection & Alert service: classifies wildlife audio samples, resolves
//! them against the species registry and fans hazard warnings out to the
//! configured recipients.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use wildwatch_common::{Error, EventBus, Result};

use crate::config::Settings;
use crate::models::SpeciesRegistry;
use crate::services::messaging_gateway::DEFAULT_REQUEST_TIMEOUT;
use crate::services::{
    AlertDispatcher, Carousel, Classifier, DetectionController, HttpClassifierClient, LogGateway,
    MessagingGateway, TwilioGateway,
};

/// EventBus capacity for SSE fan-out
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<DetectionController>,
    pub registry: Arc<SpeciesRegistry>,
    pub carousel: Arc<Mutex<Carousel>>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
    /// Most recent unresolved upstream failure; cleared by the next success
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        controller: Arc<DetectionController>,
        carousel: Arc<Mutex<Carousel>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            registry: Arc::clone(controller.registry()),
            controller,
            carousel,
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Wire the built-in registry, HTTP classifier and gateway from settings
    ///
    /// `dry_run` swaps the Twilio gateway for [`LogGateway`], so no
    /// credentials are needed.
    pub fn from_settings(settings: &Settings, dry_run: bool) -> Result<Self> {
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        let registry = Arc::new(SpeciesRegistry::from_records(
            SpeciesRegistry::builtin_records(),
        )?);

        let classifier: Arc<dyn Classifier> = Arc::new(
            HttpClassifierClient::new(&settings.classifier_endpoint, settings.classifier_timeout)
                .map_err(|e| Error::Config(e.to_string()))?,
        );

        let gateway: Arc<dyn MessagingGateway> = if dry_run {
            tracing::warn!("Dry run: alerts are logged, not sent");
            Arc::new(LogGateway)
        } else {
            Arc::new(
                TwilioGateway::new(
                    settings.twilio_config()?,
                    settings
                        .gateway
                        .delivery_timeout
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
                )
                    .map_err(|e| Error::Config(e.to_string()))?,
            )
        };

        let dispatcher =
            AlertDispatcher::new(gateway).with_delivery_timeout(settings.gateway.delivery_timeout);

        let controller = DetectionController::new(
            Arc::clone(&registry),
            classifier,
            dispatcher,
            settings.recipients.clone(),
            event_bus.clone(),
        )
        .with_classification_timeout(Some(settings.classifier_timeout));

        let carousel = Carousel::from_registry(&registry, settings.transition, event_bus.clone());

        Ok(Self::new(
            Arc::new(controller),
            Arc::new(Mutex::new(carousel)),
            event_bus,
        ))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::species_routes())
        .merge(api::detection_routes())
        .merge(api::carousel_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
