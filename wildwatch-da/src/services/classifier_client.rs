//! Classifier Service client
//!
//! Submits one audio sample per call and returns the label the service
//! reports. Labels are not checked against the species registry here.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// File name sent when the sample carries none
pub const DEFAULT_SAMPLE_NAME: &str = "sample.wav";

const PREDICT_PATH: &str = "/predict";
const USER_AGENT: &str = concat!("wildwatch-da/", env!("CARGO_PKG_VERSION"));

/// Classification errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    /// Sample rejected before contacting the service
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure or non-success response; text is the upstream diagnostic
    #[error("Server error: {0}")]
    ServiceError(String),
}

/// Raw audio handed to the classifier
#[derive(Debug, Clone, Default)]
pub struct AudioSample {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

impl AudioSample {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Name used for the multipart part
    pub fn file_name(&self) -> &str {
        self.file_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_SAMPLE_NAME)
    }
}

/// Classifier contract
///
/// One attempt per call, no retry.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, sample: &AudioSample) -> Result<String, ClassificationError>;
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predicted_class: Option<String>,
}

/// HTTP binding for the Classifier Service (`POST {endpoint}/predict`)
pub struct HttpClassifierClient {
    http_client: reqwest::Client,
    predict_url: String,
}

impl HttpClassifierClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClassificationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClassificationError::ServiceError(e.to_string()))?;

        Ok(Self {
            http_client,
            predict_url: format!("{}{}", endpoint.trim_end_matches('/'), PREDICT_PATH),
        })
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }
}

#[async_trait]
impl Classifier for HttpClassifierClient {
    async fn classify(&self, sample: &AudioSample) -> Result<String, ClassificationError> {
        if sample.is_empty() {
            return Err(ClassificationError::InvalidInput(
                "audio sample is empty".to_string(),
            ));
        }

        tracing::debug!(
            url = %self.predict_url,
            bytes = sample.len(),
            file_name = sample.file_name(),
            "Submitting sample to classifier"
        );

        let part = Part::bytes(sample.bytes.clone()).file_name(sample.file_name().to_string());
        let form = Form::new().part("audio", part);

        let response = self
            .http_client
            .post(&self.predict_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClassificationError::ServiceError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClassificationError::ServiceError(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Classifier returned error status");
            return Err(ClassificationError::ServiceError(body));
        }

        let parsed: PredictResponse = serde_json::from_str(&body).map_err(|e| {
            ClassificationError::ServiceError(format!("malformed classifier response: {}", e))
        })?;

        let label = parsed.predicted_class.ok_or_else(|| {
            ClassificationError::ServiceError(
                "malformed classifier response: missing predicted_class".to_string(),
            )
        })?;

        tracing::info!(label = %label, "Classifier returned label");
        Ok(label)
    }
}
