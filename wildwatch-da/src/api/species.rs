//! GET /species

use axum::{extract::State, routing::get, Json, Router};

use crate::{models::SpeciesRecord, AppState};

/// Registry contents in registration order
pub async fn list_species(State(state): State<AppState>) -> Json<Vec<SpeciesRecord>> {
    Json(state.registry.records().to_vec())
}

pub fn species_routes() -> Router<AppState> {
    Router::new().route("/species", get(list_species))
}
