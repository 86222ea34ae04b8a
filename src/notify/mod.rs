//! Outbound recipient notifications.
//!
//! The import pipeline talks to an [`SmsGateway`] so the transport can be swapped
//! (HTTP in production, [`DisabledGateway`] when no credentials are configured,
//! recording fakes in tests).

pub mod sms;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use sms::HttpSmsGateway;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("sms gateway is not configured")]
    Disabled,

    #[error("sms request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sms gateway answered {status}: {body}")]
    Rejected { status: u16, body: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmsMessage {
    pub sms_id: String,
    pub phone: String,
    pub text: String,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Sends one message, returning the gateway's JSON acknowledgement.
    async fn send(&self, message: &SmsMessage) -> Result<Value, SmsError>;
}

pub struct DisabledGateway;

#[async_trait]
impl SmsGateway for DisabledGateway {
    async fn send(&self, _message: &SmsMessage) -> Result<Value, SmsError> {
        Err(SmsError::Disabled)
    }
}
