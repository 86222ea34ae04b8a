use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::extract::{AppJson, AppQuery};
use crate::engine::lifecycle::{find_by_secret_key, update_location};
use crate::error::AppError;
use crate::models::product::Product;
use crate::state::AppState;

/// Recipient-facing endpoints, authorised only by the product's secret key.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products/by-secret-key", get(by_secret_key))
        .route("/products/update-location", post(update_product_location))
}

#[derive(Deserialize)]
pub struct SecretKeyQuery {
    pub secret_key: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub secret_key: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

async fn by_secret_key(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<SecretKeyQuery>,
) -> Result<Json<Product>, AppError> {
    let secret_key = query
        .secret_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Secret key is required.".to_string()))?;

    let id = find_by_secret_key(&state, secret_key.trim())?;
    state
        .product(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found.".to_string()))
}

async fn update_product_location(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<UpdateLocationRequest>,
) -> Result<Json<Product>, AppError> {
    let product = update_location(
        &state,
        payload.secret_key.as_deref(),
        payload.latitude,
        payload.longitude,
    )?;
    Ok(Json(product))
}
