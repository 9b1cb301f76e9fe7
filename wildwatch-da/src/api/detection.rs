//! Detection pipeline endpoints
//!
//! POST /detection/sample, POST /detection/alert, POST /detection/acknowledge,
//! GET /detection/state

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult},
    models::{DetectionState, DispatchOutcome},
    services::{AudioSample, DetectionError},
    AppState,
};

/// Multipart part carrying the audio bytes
pub const AUDIO_FIELD: &str = "audio";

const MAX_SAMPLE_BYTES: usize = 25 * 1024 * 1024;

/// GET /detection/state
pub async fn get_state(State(state): State<AppState>) -> Json<DetectionState> {
    Json(state.controller.state())
}

/// POST /detection/sample
///
/// Classifies the `audio` part. On success the carousel jumps to the
/// detected species and any earlier upstream error is cleared.
pub async fn submit_sample(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectionState>> {
    let sample = read_audio_part(&mut multipart).await?;

    tracing::info!(
        bytes = sample.len(),
        file_name = sample.file_name(),
        "Received audio sample"
    );

    let detection = match state.controller.submit_sample(sample).await {
        Ok(detection) => detection,
        Err(e) => {
            if let DetectionError::ServiceError(msg) = &e {
                *state.last_error.write().await = Some(msg.clone());
            }
            return Err(e.into());
        }
    };
    *state.last_error.write().await = None;

    if let Some(species) = &detection.resolved_species {
        state.carousel.lock().await.sync_to_label(&species.label);
    }

    Ok(Json(detection))
}

/// POST /detection/alert
pub async fn dispatch_alert(State(state): State<AppState>) -> ApiResult<Json<DispatchOutcome>> {
    let outcome = state.controller.dispatch_alert().await?;

    *state.last_error.write().await = (!outcome.overall_success).then(|| {
        format!(
            "alert delivery failed for {} of {} recipients",
            outcome.failed_count(),
            outcome.attempted.len()
        )
    });

    Ok(Json(outcome))
}

/// POST /detection/acknowledge
pub async fn acknowledge(State(state): State<AppState>) -> ApiResult<Json<DetectionState>> {
    Ok(Json(state.controller.acknowledge()?))
}

async fn read_audio_part(multipart: &mut Multipart) -> ApiResult<AudioSample> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read audio part: {}", e)))?;

        let mut sample = AudioSample::new(bytes.to_vec());
        if let Some(name) = file_name {
            sample = sample.with_file_name(name);
        }
        return Ok(sample);
    }

    Err(ApiError::BadRequest(format!(
        "Missing '{}' part in multipart body",
        AUDIO_FIELD
    )))
}

pub fn detection_routes() -> Router<AppState> {
    Router::new()
        .route("/detection/state", get(get_state))
        .route(
            "/detection/sample",
            post(submit_sample).layer(DefaultBodyLimit::max(MAX_SAMPLE_BYTES)),
        )
        .route("/detection/alert", post(dispatch_alert))
        .route("/detection/acknowledge", post(acknowledge))
}
