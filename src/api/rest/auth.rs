use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::rest::extract::AppJson;
use crate::auth::accounts::{authenticate, create_user, NewUser};
use crate::auth::{AuthUser, TokenPair, TokenType};
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::user::{Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/token/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub courier: Option<Courier>,
}

async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewUser>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if payload.role == Role::Admin {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered.".to_string(),
        ));
    }

    let user = create_user(&state, payload)?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let Some(user) = authenticate(&state, &payload.username, &payload.password) else {
        warn!(username = %payload.username, "login rejected");
        return Err(AppError::Unauthorized("Invalid Credentials".to_string()));
    };

    info!(user_id = user.id, "user logged in");
    Ok(Json(state.jwt.issue_pair(&user)?))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let token = payload
        .refresh
        .ok_or_else(|| AppError::BadRequest("refresh: This field is required.".to_string()))?;

    let claims = state.jwt.verify(&token, TokenType::Refresh)?;
    if state.revoked_tokens.contains(&claims.jti) {
        return Err(AppError::Unauthorized("Token is blacklisted".to_string()));
    }

    let user_id = claims.user_id()?;
    let role = state
        .users
        .get(&user_id)
        .map(|entry| entry.value().role)
        .ok_or_else(|| AppError::Unauthorized("user no longer exists".to_string()))?;

    let access = state.jwt.issue(user_id, role, TokenType::Access)?;
    Ok(Json(json!({ "access": access })))
}

/// Revokes the given refresh token. Any failure is reported as a plain 400.
async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    let claims = payload
        .refresh
        .ok_or(())
        .and_then(|token| state.jwt.verify(&token, TokenType::Refresh).map_err(|_| ()))
        .map_err(|()| AppError::BadRequest("invalid refresh token".to_string()))?;

    if claims.user_id()? != auth.user.id {
        return Err(AppError::BadRequest("invalid refresh token".to_string()));
    }

    state.revoked_tokens.insert(claims.jti);
    info!(user_id = auth.user.id, "refresh token revoked");
    Ok(StatusCode::RESET_CONTENT)
}

async fn me(State(state): State<Arc<AppState>>, auth: AuthUser) -> Json<MeResponse> {
    let courier = auth.courier(&state);
    Json(MeResponse {
        user: auth.user,
        courier,
    })
}
