use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use validator::Validate;

use crate::api::rest::extract::{AppJson, AppPath, AppQuery};
use crate::api::rest::pagination::{paginate, Page, PageParams};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::geography::{City, Region};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/regions", get(list_regions).post(create_region))
        .route(
            "/regions/:id",
            get(get_region)
                .put(update_region)
                .patch(update_region)
                .delete(delete_region),
        )
        .route("/cities", get(list_cities).post(create_city))
        .route(
            "/cities/:id",
            get(get_city)
                .put(update_city)
                .patch(update_city)
                .delete(delete_city),
        )
}

#[derive(Deserialize, Validate)]
pub struct RegionPayload {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateCityRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub region: u64,
}

#[derive(Deserialize, Validate)]
pub struct UpdateCityRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub region: Option<u64>,
}

fn region_not_found(id: u64) -> AppError {
    AppError::NotFound(format!("region {id} not found"))
}

fn city_not_found(id: u64) -> AppError {
    AppError::NotFound(format!("city {id} not found"))
}

fn ensure_region(state: &AppState, id: u64) -> Result<(), AppError> {
    if state.regions.contains_key(&id) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("region: region {id} does not exist.")))
    }
}

async fn list_regions(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Page<Region>>, AppError> {
    let mut regions: Vec<Region> = state
        .regions
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    regions.sort_by_key(|region| region.id);

    Ok(Json(paginate(regions, &params, state.config.page_size)?))
}

async fn create_region(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppJson(payload): AppJson<RegionPayload>,
) -> Result<(StatusCode, Json<Region>), AppError> {
    payload.validate()?;

    let region = Region {
        id: state.ids.regions.next(),
        name: payload.name.trim().to_string(),
    };
    state.regions.insert(region.id, region.clone());
    Ok((StatusCode::CREATED, Json(region)))
}

async fn get_region(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<Json<Region>, AppError> {
    state
        .regions
        .get(&id)
        .map(|entry| Json(entry.value().clone()))
        .ok_or_else(|| region_not_found(id))
}

async fn update_region(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppPath(id): AppPath<u64>,
    AppJson(payload): AppJson<RegionPayload>,
) -> Result<Json<Region>, AppError> {
    payload.validate()?;

    let mut region = state.regions.get_mut(&id).ok_or_else(|| region_not_found(id))?;
    region.name = payload.name.trim().to_string();
    Ok(Json(region.clone()))
}

async fn delete_region(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, AppError> {
    state.delete_region(id).ok_or_else(|| region_not_found(id))?;
    tracing::info!(region_id = id, "region deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_cities(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Page<City>>, AppError> {
    let mut cities: Vec<City> = state
        .cities
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    cities.sort_by_key(|city| city.id);

    Ok(Json(paginate(cities, &params, state.config.page_size)?))
}

async fn create_city(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppJson(payload): AppJson<CreateCityRequest>,
) -> Result<(StatusCode, Json<City>), AppError> {
    payload.validate()?;
    ensure_region(&state, payload.region)?;

    let city = City {
        id: state.ids.cities.next(),
        name: payload.name.trim().to_string(),
        region: payload.region,
    };
    state.cities.insert(city.id, city.clone());
    Ok((StatusCode::CREATED, Json(city)))
}

async fn get_city(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<Json<City>, AppError> {
    state
        .cities
        .get(&id)
        .map(|entry| Json(entry.value().clone()))
        .ok_or_else(|| city_not_found(id))
}

async fn update_city(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppPath(id): AppPath<u64>,
    AppJson(payload): AppJson<UpdateCityRequest>,
) -> Result<Json<City>, AppError> {
    payload.validate()?;
    if let Some(region) = payload.region {
        ensure_region(&state, region)?;
    }

    let mut city = state.cities.get_mut(&id).ok_or_else(|| city_not_found(id))?;
    if let Some(name) = payload.name {
        city.name = name.trim().to_string();
    }
    if let Some(region) = payload.region {
        city.region = region;
    }
    Ok(Json(city.clone()))
}

async fn delete_city(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, AppError> {
    state.delete_city(id).ok_or_else(|| city_not_found(id))?;
    tracing::info!(city_id = id, "city deleted");
    Ok(StatusCode::NO_CONTENT)
}
