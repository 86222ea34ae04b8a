use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::api::rest::extract::{AppJson, AppPath, AppQuery};
use crate::api::rest::pagination::{paginate, Page, PageParams};
use crate::auth::AuthUser;
use crate::engine::coverage::{check_boss_assignment, ProductFilter};
use crate::engine::lifecycle::{create_product, update_product, ProductDraft, ProductUpdate};
use crate::error::AppError;
use crate::models::product::Product;
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", get(list_products).post(create))
        .route(
            "/products/:id",
            get(get_product)
                .put(update)
                .patch(update)
                .delete(delete_product),
        )
        .route("/assign-product", post(assign_product))
        .route("/courier/products", get(my_products))
}

fn product_not_found(id: u64) -> AppError {
    AppError::NotFound(format!("product {id} not found"))
}

fn sorted_page(
    state: &AppState,
    mut products: Vec<Product>,
    params: &PageParams,
) -> Result<Page<Product>, AppError> {
    products.sort_by_key(|product| product.id);
    paginate(products, params, state.config.page_size)
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppQuery(filter): AppQuery<ProductFilter>,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Page<Product>>, AppError> {
    auth.require_staff()?;

    let products = state
        .products
        .iter()
        .filter(|entry| filter.matches(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();

    Ok(Json(sorted_page(&state, products, &params)?))
}

/// Courier Boss creations must stay within the boss's own coverage; other
/// staff roles are not checked.
async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppJson(payload): AppJson<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    auth.require_staff()?;
    check_boss_assignment(&state, &auth.user, payload.assigned_to)?;

    let product = create_product(&state, payload)?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Courier Boss shortcut that creates an already assigned product.
/// Unlike `POST /products` it does not check coverage.
async fn assign_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppJson(payload): AppJson<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    auth.require_role(Role::CourierBoss)?;

    let product = create_product(&state, payload)?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<Json<Product>, AppError> {
    auth.require_staff()?;

    state
        .product(id)
        .map(Json)
        .ok_or_else(|| product_not_found(id))
}

// Coverage is only checked on create.
async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
    AppJson(payload): AppJson<ProductUpdate>,
) -> Result<Json<Product>, AppError> {
    auth.require_staff()?;

    Ok(Json(update_product(&state, id, payload)?))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, AppError> {
    auth.require_staff()?;

    state.delete_product(id).ok_or_else(|| product_not_found(id))?;
    tracing::info!(product_id = id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Products assigned to the caller's courier record; empty for non-couriers.
async fn my_products(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Page<Product>>, AppError> {
    let products = match auth.courier(&state) {
        Some(courier) => state
            .products
            .iter()
            .filter(|entry| entry.value().assigned_to == Some(courier.id))
            .map(|entry| entry.value().clone())
            .collect(),
        None => Vec::new(),
    };

    Ok(Json(sorted_page(&state, products, &params)?))
}
