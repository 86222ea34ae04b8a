use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use courier_desk::api;
use courier_desk::auth::accounts::{create_user, NewUser};
use courier_desk::config::Config;
use courier_desk::error::AppError;
use courier_desk::models::user::Role;
use courier_desk::notify::{DisabledGateway, HttpSmsGateway, SmsGateway};
use courier_desk::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let sms: Arc<dyn SmsGateway> = match config.sms.clone() {
        Some(sms_config) => {
            tracing::info!(url = %sms_config.api_url, "sms gateway enabled");
            Arc::new(
                HttpSmsGateway::new(sms_config)
                    .map_err(|err| AppError::Internal(format!("sms client: {err}")))?,
            )
        }
        None => {
            tracing::warn!("SMS_USERNAME/SMS_SECRET not set; sms notifications disabled");
            Arc::new(DisabledGateway)
        }
    };

    let state = Arc::new(AppState::new(config.clone(), sms));
    bootstrap_admin(&state)?;

    let app = api::rest::router(state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn bootstrap_admin(state: &AppState) -> Result<(), AppError> {
    let Some(credentials) = state.config.bootstrap_admin.clone() else {
        return Ok(());
    };

    let admin = create_user(
        state,
        NewUser {
            username: credentials.username,
            password: credentials.password,
            role: Role::Admin,
            first_name: String::new(),
            last_name: String::new(),
            phone_number: String::new(),
        },
    )?;
    tracing::info!(user_id = admin.id, username = %admin.username, "admin account created");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
