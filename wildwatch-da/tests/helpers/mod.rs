//! Shared test helpers: scripted classifier and gateway, app state builder,
//! request helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use wildwatch_common::EventBus;
use wildwatch_da::models::SpeciesRegistry;
use wildwatch_da::services::{
    AlertDispatcher, AudioSample, Carousel, ClassificationError, Classifier, DeliveryError,
    DetectionController, MessagingGateway,
};
use wildwatch_da::AppState;

pub const BOUNDARY: &str = "wildwatch-test-boundary";

/// Classifier returning a scripted result after an optional delay
pub struct ScriptedClassifier {
    result: Result<String, ClassificationError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn label(label: &str) -> Self {
        Self {
            result: Ok(label.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            result: Err(ClassificationError::ServiceError(message.to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _sample: &AudioSample) -> Result<String, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Gateway recording every delivery; rejects recipients listed in `failing`
#[derive(Default)]
pub struct RecordingGateway {
    failing: HashSet<String>,
    delay: Duration,
    deliveries: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    pub fn failing(recipients: &[&str]) -> Self {
        Self {
            failing: recipients.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, recipient: &str) -> usize {
        self.deliveries()
            .iter()
            .filter(|(r, _)| r == recipient)
            .count()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), DeliveryError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        if self.failing.contains(recipient) {
            Err(DeliveryError::Rejected(400, "unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn recipients(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

pub fn controller(
    classifier: Arc<ScriptedClassifier>,
    gateway: Arc<RecordingGateway>,
    recipient_ids: &[&str],
    event_bus: EventBus,
) -> DetectionController {
    DetectionController::new(
        Arc::new(SpeciesRegistry::builtin()),
        classifier,
        AlertDispatcher::new(gateway),
        recipients(recipient_ids),
        event_bus,
    )
}

/// App state over the built-in registry with a zero-length carousel transition
pub fn test_app_state(
    classifier: Arc<ScriptedClassifier>,
    gateway: Arc<RecordingGateway>,
    recipient_ids: &[&str],
) -> AppState {
    let event_bus = EventBus::new(100);
    let controller = Arc::new(controller(classifier, gateway, recipient_ids, event_bus.clone()));
    let carousel = Carousel::from_registry(controller.registry(), Duration::ZERO, event_bus.clone());
    AppState::new(controller, Arc::new(tokio::sync::Mutex::new(carousel)), event_bus)
}

/// multipart/form-data body with a single file part
pub fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Send a request through the router and decode the JSON response
pub async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &axum::Router, path: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(path).body(Body::empty()).unwrap()).await
}

pub async fn post(app: &axum::Router, path: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_sample(app: &axum::Router, field: &str, bytes: &[u8]) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri("/detection/sample")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(field, "roar.wav", bytes)))
            .unwrap(),
    )
    .await
}
