use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub page_size: usize,
    pub max_upload_bytes: usize,
    /// When set, delivery confirmation is refused until the product has been received.
    pub require_receipt_before_delivery: bool,
    pub sms: Option<SmsConfig>,
    pub tracking_url_base: String,
    /// Admin account created at startup when both `ADMIN_USERNAME` and `ADMIN_PASSWORD` are set.
    pub bootstrap_admin: Option<AdminCredentials>,
}

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_url: String,
    pub username: String,
    pub secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| AppError::Internal("JWT_SECRET must be set".to_string()))?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            jwt_secret,
            access_token_ttl_minutes: parse_or_default("ACCESS_TOKEN_TTL_MINUTES", 30)?,
            refresh_token_ttl_days: parse_or_default("REFRESH_TOKEN_TTL_DAYS", 1)?,
            page_size: parse_or_default("PAGE_SIZE", 10)?,
            max_upload_bytes: parse_or_default("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            require_receipt_before_delivery: parse_or_default(
                "REQUIRE_RECEIPT_BEFORE_DELIVERY",
                false,
            )?,
            sms: sms_from_env(),
            tracking_url_base: env::var("TRACKING_URL_BASE")
                .unwrap_or_else(|_| "http://localhost:3000/track".to_string()),
            bootstrap_admin: admin_from_env(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8000,
            log_level: "info".to_string(),
            jwt_secret: "development-only-secret".to_string(),
            access_token_ttl_minutes: 30,
            refresh_token_ttl_days: 1,
            page_size: 10,
            max_upload_bytes: 10 * 1024 * 1024,
            require_receipt_before_delivery: false,
            sms: None,
            tracking_url_base: "http://localhost:3000/track".to_string(),
            bootstrap_admin: None,
        }
    }
}

fn sms_from_env() -> Option<SmsConfig> {
    let username = env::var("SMS_USERNAME").ok()?;
    let secret = env::var("SMS_SECRET").ok()?;
    if username.trim().is_empty() || secret.trim().is_empty() {
        return None;
    }

    Some(SmsConfig {
        api_url: env::var("SMS_API_URL")
            .unwrap_or_else(|_| "https://routee.sayqal.uz/sms/TransmitSMS".to_string()),
        username,
        secret,
    })
}

fn admin_from_env() -> Option<AdminCredentials> {
    let username = env::var("ADMIN_USERNAME").ok()?;
    let password = env::var("ADMIN_PASSWORD").ok()?;
    Some(AdminCredentials { username, password })
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
