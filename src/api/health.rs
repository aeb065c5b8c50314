use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub upstream_endpoint: String,
    pub accounts: usize,
    pub enabled_accounts: usize,
    pub client_keys: usize,
    pub log_level: String,
}

/// `GET /`: liveness plus a secret-free summary of the loaded config.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    let config = &state.config;
    Json(HealthReport {
        status: "streamgate-rs is running",
        upstream_endpoint: state.transport.endpoint().to_string(),
        accounts: config.accounts.len(),
        enabled_accounts: config.accounts.iter().filter(|a| a.enabled).count(),
        client_keys: config.client_authentication.allowed_keys.len(),
        log_level: config.features.log_level.clone(),
    })
}
