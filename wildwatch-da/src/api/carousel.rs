//! Carousel navigation endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::ApiResult,
    services::{CarouselView, Navigation},
    AppState,
};

/// Navigation response
#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    /// False when the request landed inside a running transition or on the current slide
    pub moved: bool,
    #[serde(flatten)]
    pub carousel: CarouselView,
}

impl NavigationResponse {
    fn new(navigation: Navigation, carousel: CarouselView) -> Self {
        Self {
            moved: matches!(navigation, Navigation::Moved(_)),
            carousel,
        }
    }
}

/// GET /carousel
pub async fn get_carousel(State(state): State<AppState>) -> Json<CarouselView> {
    Json(state.carousel.lock().await.view())
}

/// POST /carousel/next
pub async fn next_slide(State(state): State<AppState>) -> ApiResult<Json<NavigationResponse>> {
    let mut carousel = state.carousel.lock().await;
    let navigation = carousel.next()?;
    Ok(Json(NavigationResponse::new(navigation, carousel.view())))
}

/// POST /carousel/previous
pub async fn previous_slide(State(state): State<AppState>) -> ApiResult<Json<NavigationResponse>> {
    let mut carousel = state.carousel.lock().await;
    let navigation = carousel.previous()?;
    Ok(Json(NavigationResponse::new(navigation, carousel.view())))
}

/// POST /carousel/select/:index
pub async fn select_slide(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> ApiResult<Json<NavigationResponse>> {
    let mut carousel = state.carousel.lock().await;
    let navigation = carousel.select(index)?;
    Ok(Json(NavigationResponse::new(navigation, carousel.view())))
}

pub fn carousel_routes() -> Router<AppState> {
    Router::new()
        .route("/carousel", get(get_carousel))
        .route("/carousel/next", post(next_slide))
        .route("/carousel/previous", post(previous_slide))
        .route("/carousel/select/:index", post(select_slide))
}
