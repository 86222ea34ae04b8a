use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::engine::import::import_workbook;
use crate::error::AppError;
use crate::state::AppState;

pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload-excel", post(upload_excel))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

fn parse_flag(raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "send_sms: {other:?} is not a valid boolean."
        ))),
    }
}

async fn upload_excel(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut file: Option<Vec<u8>> = None;
    let mut send_sms = true;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("invalid multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(format!("file: {err}")))?;
                file = Some(bytes.to_vec());
            }
            "send_sms" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|err| AppError::BadRequest(format!("send_sms: {err}")))?;
                send_sms = parse_flag(&raw)?;
            }
            _ => {}
        }
    }

    let file = file
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("file: No file was submitted.".to_string()))?;

    info!(user_id = auth.user.id, bytes = file.len(), send_sms, "spreadsheet upload received");

    match import_workbook(&state, file, send_sms).await {
        Ok(report) => Ok((
            StatusCode::CREATED,
            Json(json!({ "messages": report.messages })),
        )),
        Err(err) => {
            warn!(error = %err, "spreadsheet could not be read");
            Err(AppError::BadRequest(format!(
                "Error processing Excel file: {err}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn form_flags_accept_common_spellings() {
        assert!(parse_flag("True").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(parse_flag("perhaps").is_err());
    }
}
