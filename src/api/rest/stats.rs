use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::auth::AuthUser;
use crate::engine::stats::{build_dashboard, Dashboard};
use crate::models::product::Product;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(stats))
}

async fn stats(State(state): State<Arc<AppState>>, _auth: AuthUser) -> Json<Dashboard> {
    let region_names: HashMap<u64, String> = state
        .regions
        .iter()
        .map(|entry| (*entry.key(), entry.value().name.clone()))
        .collect();
    let products: Vec<Product> = state
        .products
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    Json(build_dashboard(&products, &region_names))
}
