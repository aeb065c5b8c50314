use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::account::{AccountProvider, Credential, StaticAccountPool};
use crate::auth::{authenticate, ClientKeyIndex};
use crate::config::AppConfig;
use crate::error::{GatewayError, IngressApi};
use crate::protocol::model_map::ADVERTISED_MODELS;
use crate::transport::HttpTransport;

const MODEL_CREATED_AT: u64 = 1_727_740_800;
const MODEL_OWNER: &str = "anthropic";

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    accounts: Arc<dyn AccountProvider>,
    client_keys: ClientKeyIndex,
    models_response_body: Bytes,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        accounts: Arc<dyn AccountProvider>,
        client_keys: ClientKeyIndex,
    ) -> Self {
        Self {
            config,
            transport,
            accounts,
            client_keys,
            models_response_body: build_models_response_body(ADVERTISED_MODELS),
        }
    }

    /// State wired from config alone: static account pool and config client keys.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP transport cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, GatewayError> {
        let transport = HttpTransport::new(&config.server, &config.upstream)?;
        let accounts: Arc<dyn AccountProvider> = Arc::new(StaticAccountPool::new(&config.accounts));
        let client_keys = ClientKeyIndex::from_config(&config);
        Ok(Self::new(config, transport, accounts, client_keys))
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::Auth`] when the client key is missing or unknown.
    #[inline]
    pub fn authenticate(
        &self,
        ingress: IngressApi,
        headers: &http::HeaderMap,
    ) -> Result<(), GatewayError> {
        authenticate(ingress, headers, &self.client_keys)
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::Account`] when no account can serve the call.
    #[inline]
    pub fn acquire_credential(&self) -> Result<Credential, GatewayError> {
        self.accounts.acquire()
    }

    #[must_use]
    pub fn models_response_body(&self) -> Bytes {
        self.models_response_body.clone()
    }
}

fn build_models_response_body(model_ids: &[&str]) -> Bytes {
    let models: Vec<Value> = model_ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "object": "model",
                "created": MODEL_CREATED_AT,
                "owned_by": MODEL_OWNER,
            })
        })
        .collect();

    let payload = serde_json::json!({
        "object": "list",
        "data": models,
    });
    serde_json::to_vec(&payload).map_or_else(
        |_| Bytes::from_static(br#"{"object":"list","data":[]}"#),
        Bytes::from,
    )
}
