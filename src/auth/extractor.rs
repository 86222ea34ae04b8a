use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::tokens::{Claims, TokenType};
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::user::{Role, User};
use crate::state::AppState;

/// The user behind a valid `Authorization: Bearer <access token>` header.
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

impl AuthUser {
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.user.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ))
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.user.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("{role} role required.")))
        }
    }

    /// The courier record linked to this user, if any.
    pub fn courier(&self, state: &AppState) -> Option<Courier> {
        state.courier_for_user(self.user.id)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided.".to_string())
            })?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("expected a bearer token".to_string()))?;

        let claims = state.jwt.verify(token.trim(), TokenType::Access)?;
        let user = state
            .users
            .get(&claims.user_id()?)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::Unauthorized("user no longer exists".to_string()))?;

        Ok(AuthUser { user, claims })
    }
}
