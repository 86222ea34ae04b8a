use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SmsConfig;
use crate::notify::{SmsError, SmsGateway, SmsMessage};

const SERVICE_ID: u32 = 2;

/// Client for the TransmitSMS HTTP API.
pub struct HttpSmsGateway {
    client: reqwest::Client,
    config: SmsConfig,
}

#[derive(Serialize)]
struct TransmitRequest<'a> {
    utime: i64,
    username: &'a str,
    service: ServiceRef,
    message: MessageBody<'a>,
}

#[derive(Serialize)]
struct ServiceRef {
    service: u32,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    smsid: &'a str,
    phone: &'a str,
    text: &'a str,
}

impl HttpSmsGateway {
    pub fn new(config: SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, config })
    }
}

/// Hex MD5 of `"TransmitSMS {username} {secret} {utime}"`, sent as `X-Access-Token`.
pub fn access_token(username: &str, secret: &str, utime: i64) -> String {
    let digest = Md5::digest(format!("TransmitSMS {username} {secret} {utime}").as_bytes());
    format!("{digest:x}")
}

pub fn normalize_phone(phone: &str) -> &str {
    phone.strip_prefix('+').unwrap_or(phone)
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, message: &SmsMessage) -> Result<Value, SmsError> {
        let utime = Utc::now().timestamp();
        let token = access_token(&self.config.username, &self.config.secret, utime);

        let payload = TransmitRequest {
            utime,
            username: &self.config.username,
            service: ServiceRef {
                service: SERVICE_ID,
            },
            message: MessageBody {
                smsid: &message.sms_id,
                phone: normalize_phone(&message.phone),
                text: &message.text,
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("X-Access-Token", token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let body = serde_json::from_str(&raw).unwrap_or(Value::String(raw));

        if status == reqwest::StatusCode::OK {
            info!(sms_id = %message.sms_id, "sms accepted by gateway");
            Ok(body)
        } else {
            warn!(sms_id = %message.sms_id, status = status.as_u16(), "sms rejected by gateway");
            Err(SmsError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
