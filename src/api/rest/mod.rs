pub mod auth;
pub mod couriers;
pub mod deliveries;
pub mod extract;
pub mod geography;
pub mod pagination;
pub mod products;
pub mod stats;
pub mod tracking;
pub mod upload;
pub mod users;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(geography::router())
        .merge(couriers::router())
        .merge(tracking::router())
        .merge(deliveries::router())
        .merge(products::router())
        .merge(stats::router())
        .merge(upload::router(state.config.max_upload_bytes))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    regions: usize,
    cities: usize,
    couriers: usize,
    products: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        regions: state.regions.len(),
        cities: state.cities.len(),
        couriers: state.couriers.len(),
        products: state.products.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.products_total.set(state.products.len() as i64);

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
