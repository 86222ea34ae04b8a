use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(max = 15))]
    pub phone_number: String,
}

fn default_role() -> Role {
    Role::Courier
}

/// Creates a user; usernames are unique case-insensitively.
pub fn create_user(state: &AppState, new_user: NewUser) -> Result<User, AppError> {
    new_user.validate()?;

    let username = new_user.username.trim().to_string();
    let password_hash = hash_password(&new_user.password)?;
    let id = state.ids.users.next();

    match state.usernames.entry(username.to_lowercase()) {
        Entry::Occupied(_) => {
            return Err(AppError::Conflict(
                "A user with that username already exists.".to_string(),
            ));
        }
        Entry::Vacant(slot) => {
            slot.insert(id);
        }
    }

    let user = User {
        id,
        username,
        password_hash,
        role: new_user.role,
        first_name: new_user.first_name,
        last_name: new_user.last_name,
        phone_number: new_user.phone_number,
        date_joined: Utc::now(),
    };
    state.users.insert(id, user.clone());
    info!(user_id = id, role = %user.role, "user created");
    Ok(user)
}

pub fn authenticate(state: &AppState, username: &str, password: &str) -> Option<User> {
    let id = *state.usernames.get(&username.trim().to_lowercase())?.value();
    let user = state.users.get(&id)?.value().clone();
    verify_password(password, &user.password_hash).then_some(user)
}
