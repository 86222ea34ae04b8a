use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::extract::{AppJson, AppPath, AppQuery};
use crate::api::rest::pagination::{paginate, Page, PageParams};
use crate::auth::AuthUser;
use crate::engine::coverage::CourierFilter;
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", get(list_couriers).post(create_courier))
        .route(
            "/couriers/:id",
            get(get_courier)
                .put(update_courier)
                .patch(update_courier)
                .delete(delete_courier),
        )
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub user: u64,
    #[serde(default)]
    pub covered_cities: BTreeSet<u64>,
}

#[derive(Deserialize)]
pub struct UpdateCourierRequest {
    pub covered_cities: Option<BTreeSet<u64>>,
}

fn courier_not_found(id: u64) -> AppError {
    AppError::NotFound(format!("courier {id} not found"))
}

fn ensure_cities(state: &AppState, cities: &BTreeSet<u64>) -> Result<(), AppError> {
    match cities.iter().find(|id| !state.cities.contains_key(id)) {
        Some(missing) => Err(AppError::BadRequest(format!(
            "covered_cities: city {missing} does not exist."
        ))),
        None => Ok(()),
    }
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppJson(payload): AppJson<CreateCourierRequest>,
) -> Result<(StatusCode, Json<Courier>), AppError> {
    auth.require_staff()?;

    if !state.users.contains_key(&payload.user) {
        return Err(AppError::BadRequest(format!(
            "user: user {} does not exist.",
            payload.user
        )));
    }
    ensure_cities(&state, &payload.covered_cities)?;

    let courier = Courier {
        id: state.ids.couriers.next(),
        user: payload.user,
        covered_cities: payload.covered_cities,
    };

    if !state.insert_courier(courier.clone()) {
        return Err(AppError::Conflict(
            "courier with this user already exists.".to_string(),
        ));
    }
    tracing::info!(
        courier_id = courier.id,
        user_id = courier.user,
        cities = courier.covered_cities.len(),
        "courier created"
    );
    Ok((StatusCode::CREATED, Json(courier)))
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppQuery(filter): AppQuery<CourierFilter>,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Page<Courier>>, AppError> {
    auth.require_staff()?;

    let mut couriers: Vec<Courier> = state
        .couriers
        .iter()
        .filter(|entry| filter.matches(entry.value(), &state.cities))
        .map(|entry| entry.value().clone())
        .collect();
    couriers.sort_by_key(|courier| courier.id);

    Ok(Json(paginate(couriers, &params, state.config.page_size)?))
}

async fn get_courier(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<Json<Courier>, AppError> {
    auth.require_staff()?;

    state
        .couriers
        .get(&id)
        .map(|entry| Json(entry.value().clone()))
        .ok_or_else(|| courier_not_found(id))
}

async fn update_courier(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
    AppJson(payload): AppJson<UpdateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    auth.require_staff()?;

    if let Some(cities) = &payload.covered_cities {
        ensure_cities(&state, cities)?;
    }

    let mut courier = state
        .couriers
        .get_mut(&id)
        .ok_or_else(|| courier_not_found(id))?;

    if let Some(cities) = payload.covered_cities {
        courier.covered_cities = cities;
    }

    Ok(Json(courier.clone()))
}

async fn delete_courier(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, AppError> {
    auth.require_staff()?;

    state.delete_courier(id).ok_or_else(|| courier_not_found(id))?;
    tracing::info!(courier_id = id, "courier deleted");
    Ok(StatusCode::NO_CONTENT)
}
