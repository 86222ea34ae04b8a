use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::user::{Role, User};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<u64, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("malformed token subject".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &Config) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            refresh: self.issue(user.id, user.role, TokenType::Refresh)?,
            access: self.issue(user.id, user.role, TokenType::Access)?,
        })
    }

    pub fn issue(&self, user_id: u64, role: Role, token_type: TokenType) -> Result<String, AppError> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Decodes and checks signature, expiry and the expected token type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.token_type != expected {
            return Err(AppError::Unauthorized(format!(
                "expected {expected:?} token"
            )));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::{JwtKeys, TokenType};
    use crate::config::Config;
    use crate::models::user::Role;

    #[test]
    fn access_token_round_trips_subject_and_role() {
        let keys = JwtKeys::from_config(&Config::default());
        let token = keys.issue(42, Role::CourierBoss, TokenType::Access).unwrap();

        let claims = keys.verify(&token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::CourierBoss);
    }

    #[test]
    fn refresh_token_is_not_accepted_as_access() {
        let keys = JwtKeys::from_config(&Config::default());
        let token = keys.issue(1, Role::Courier, TokenType::Refresh).unwrap();

        assert!(keys.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = Config {
            jwt_secret: "someone-else".to_string(),
            ..Config::default()
        };
        let token = JwtKeys::from_config(&other)
            .issue(1, Role::Admin, TokenType::Access)
            .unwrap();

        let keys = JwtKeys::from_config(&Config::default());
        assert!(keys.verify(&token, TokenType::Access).is_err());
    }
}
