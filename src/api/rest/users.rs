use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::extract::{AppPath, AppQuery};
use crate::api::rest::pagination::{paginate, Page, PageParams};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Page<User>>, AppError> {
    auth.require_role(Role::Admin)?;

    let mut users: Vec<User> = state
        .users
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    users.sort_by_key(|user| user.id);

    Ok(Json(paginate(users, &params, state.config.page_size)?))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<Json<User>, AppError> {
    auth.require_role(Role::Admin)?;

    state
        .users
        .get(&id)
        .map(|entry| Json(entry.value().clone()))
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, AppError> {
    auth.require_role(Role::Admin)?;

    state
        .delete_user(id)
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
    tracing::info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
