use std::process::ExitCode;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use streamgate_rs::config::{load_config, AppConfig, ConfigError, ServerConfig};
use streamgate_rs::error::GatewayError;
use streamgate_rs::observability::init_tracing;
use streamgate_rs::routing::{dispatch_request, normalize_base_path};
use streamgate_rs::state::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const CONFIG_PATH_ENV: &str = "STREAMGATE_CONFIG";

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Failed to load configuration from '{path}': {source}")]
    Config { path: String, source: ConfigError },
    #[error("Failed to initialize Tokio runtime: {0}")]
    Runtime(std::io::Error),
    #[error("Failed to initialize gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Config path: first CLI argument, then `STREAMGATE_CONFIG`, then `config.yaml`.
fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

fn main() -> ExitCode {
    match start() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            if matches!(err, StartupError::Config { .. }) {
                eprintln!("Copy 'config.example.yaml' to 'config.yaml' and adjust it.");
            }
            ExitCode::FAILURE
        }
    }
}

fn start() -> Result<(), StartupError> {
    let path = config_path();
    let config = load_config(&path).map_err(|source| StartupError::Config { path, source })?;
    init_tracing(&config.features);
    let runtime = build_runtime(&config.server).map_err(StartupError::Runtime)?;
    runtime.block_on(run(config))
}

fn build_runtime(server: &ServerConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = match server.runtime_worker_threads {
        Some(1) => tokio::runtime::Builder::new_current_thread(),
        threads => {
            let mut builder = tokio::runtime::Builder::new_multi_thread();
            if let Some(threads) = threads {
                builder.worker_threads(threads);
            }
            builder
        }
    };
    if let Some(max) = server.runtime_max_blocking_threads {
        builder.max_blocking_threads(max);
    }
    builder.enable_io().enable_time().build()
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let base_path: Arc<str> = Arc::from(normalize_base_path(&config.server.base_path).as_str());
    let state = Arc::new(AppState::from_config(config)?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(
        %addr,
        base_path = %base_path,
        endpoint = %state.transport.endpoint(),
        "streamgate-rs listening"
    );

    tokio::select! {
        () = accept_loop(listener, state, base_path) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}

async fn accept_loop(listener: tokio::net::TcpListener, state: Arc<AppState>, base_path: Arc<str>) {
    let conn_builder = AutoBuilder::new(TokioExecutor::new());
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                continue;
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %err, "TCP_NODELAY not set");
        }

        let conn_builder = conn_builder.clone();
        let state = Arc::clone(&state);
        let base_path = Arc::clone(&base_path);
        let service = service_fn(move |request: Request<Incoming>| {
            dispatch_request(
                Arc::clone(&state),
                Arc::clone(&base_path),
                request.map(Body::new),
            )
        });

        tokio::spawn(async move {
            if let Err(err) = conn_builder
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%peer, "connection closed with error: {err:#}");
            }
        });
    }
}
