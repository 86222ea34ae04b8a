use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::extract::AppJson;
use crate::auth::AuthUser;
use crate::engine::lifecycle::{confirm, Confirmation};
use crate::error::AppError;
use crate::models::product::OrderStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products/confirm-receipt", post(confirm_receipt))
        .route("/products/confirm-delivery", post(confirm_delivery))
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub product_id: Option<u64>,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub detail: &'static str,
    pub product_id: u64,
    pub order_status: OrderStatus,
}

async fn confirm_receipt(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppJson(payload): AppJson<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    respond(&state, &auth, payload, Confirmation::Receipt)
}

async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppJson(payload): AppJson<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    respond(&state, &auth, payload, Confirmation::Delivery)
}

fn respond(
    state: &AppState,
    auth: &AuthUser,
    payload: ConfirmRequest,
    confirmation: Confirmation,
) -> Result<Json<ConfirmResponse>, AppError> {
    let product = confirm(state, &auth.user, payload.product_id, confirmation)?;
    Ok(Json(ConfirmResponse {
        detail: confirmation.detail(),
        product_id: product.id,
        order_status: product.order_status,
    }))
}
