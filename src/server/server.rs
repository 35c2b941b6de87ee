use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{error, info};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::{log_requests, state::*, ServerConfig};
use crate::config::AuthSettings;
use crate::updater::{RegionStatus, RunCoordinator, ServerRegion, UpdateRequest};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub running: bool,
    pub regions: Vec<ServerRegion>,
}

#[derive(Serialize, Debug)]
struct MessageResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<ServerRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl MessageResponse {
    fn new(message: &'static str) -> Self {
        Self {
            message,
            server: None,
            error: None,
        }
    }

    fn with_server(mut self, server: ServerRegion) -> Self {
        self.server = Some(server);
        self
    }

    fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        running: state.coordinator.is_running(),
        regions: state.updater.enabled_regions(),
    };
    Json(stats)
}

/// User-Agent prefix first, then the bearer token. Unset checks always pass.
fn check_authorization(auth: &AuthSettings, headers: &HeaderMap) -> Result<(), &'static str> {
    if !auth.enabled {
        return Ok(());
    }

    if let Some(prefix) = &auth.user_agent_prefix {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !user_agent.starts_with(prefix.as_str()) {
            return Err("Invalid User-Agent");
        }
    }

    if let Some(token) = &auth.token {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if authorization != format!("Bearer {}", token) {
            return Err("Invalid authorization token");
        }
    }

    Ok(())
}

async fn update_asset(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(reason) = check_authorization(&state.config.auth, &headers) {
        return MessageResponse::new(reason).into_response_with(StatusCode::UNAUTHORIZED);
    }

    let request: UpdateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return MessageResponse::new("Invalid request payload")
                .with_error(e.to_string())
                .into_response_with(StatusCode::BAD_REQUEST)
        }
    };
    let server = request.server;

    match state.updater.region_status(server) {
        RegionStatus::Enabled => {}
        RegionStatus::NotConfigured => {
            return MessageResponse::new("Server region not found in configuration")
                .into_response_with(StatusCode::BAD_REQUEST)
        }
        RegionStatus::Disabled => {
            return MessageResponse::new("Asset updater for this region is not enabled")
                .with_server(server)
                .into_response_with(StatusCode::SERVICE_UNAVAILABLE)
        }
    }

    let guard = match state.coordinator.try_acquire() {
        Some(guard) => guard,
        None => {
            return MessageResponse::new("Asset updater is running")
                .with_server(server)
                .into_response_with(StatusCode::CONFLICT)
        }
    };

    let updater = state.updater.clone();
    tokio::spawn(async move {
        let _guard = guard;
        if let Err(e) = updater
            .run(
                request.server,
                &request.asset_version,
                request.asset_hash.as_deref(),
            )
            .await
        {
            error!("{} server asset updater failed: {}", request.server, e);
        }
    });

    MessageResponse::new("Asset updater started running")
        .with_server(server)
        .into_response_with(StatusCode::OK)
}

pub fn make_app(
    config: ServerConfig,
    updater: SharedUpdater,
    coordinator: RunCoordinator,
) -> Router {
    let state = ServerState::new(config, updater, coordinator);

    Router::new()
        .route("/", get(home))
        .route("/update_asset", post(update_asset))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    config: ServerConfig,
    updater: SharedUpdater,
    coordinator: RunCoordinator,
) -> Result<()> {
    let address = format!("{}:{}", config.host, config.port);
    let app = make_app(config, updater, coordinator);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Ready to serve at {}!", address);

    Ok(axum::serve(listener, app).await?)
}
