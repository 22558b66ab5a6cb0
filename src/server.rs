//! The agent's HTTP server, run by launchd through `localrun-agent serve`.
//!
//! Once the listener is bound the server records its port, pid and version in the
//! config record so `status` has something to show.
use std::path::PathBuf;

use axum::{
    Json, Router,
    http::{Method, StatusCode},
    routing::get,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use sysinfo::{ProcessesToUpdate, System};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    constants::{AGENT_VERSION, DEFAULT_HOST, DEFAULT_PORT, SERVICE_NAME},
    error::{AgentError, HostError},
    host,
    status::AgentConfigRecord,
};

/// Where the server listens and where it records itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path of the config record written after binding.
    pub config_file: PathBuf,
}

impl ServerConfig {
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            config_file: config_file.into(),
        }
    }
}

/// Serves until SIGINT or SIGTERM, then shuts down gracefully.
pub async fn run(config: ServerConfig) -> Result<(), AgentError> {
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|err| {
            AgentError::Serve(format!(
                "failed to bind {}:{}: {err}",
                config.host, config.port
            ))
        })?;
    let bound = listener.local_addr()?;
    info!("LocalRun Agent listening on http://{bound}");

    let record = AgentConfigRecord {
        port: Some(bound.port()),
        pid: Some(std::process::id()),
        version: Some(AGENT_VERSION.to_string()),
        started_at: Some(Utc::now().to_rfc3339()),
    };
    if let Err(err) = record.save(&config.config_file) {
        warn!(
            "failed to write config record {}: {err}",
            config.config_file.display()
        );
    }

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AgentError::Serve(err.to_string()))?;

    info!("LocalRun Agent stopped");
    Ok(())
}

/// Routes exposed by the agent.
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/ping", get(ping_handler))
        .route("/api/host/info", get(host_info_handler))
        .route("/api/host/ports", get(ports_handler))
        .route("/api/host/processes", get(processes_handler))
        .route("/api/docker/containers", get(containers_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn ping_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": AGENT_VERSION,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn host_info_handler() -> Json<Value> {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_cpu_all();

    Json(json!({
        "hostname": System::host_name(),
        "os": System::name(),
        "os_version": System::os_version(),
        "kernel_version": System::kernel_version(),
        "arch": std::env::consts::ARCH,
        "cpus": system.cpus().len(),
        "total_memory": system.total_memory(),
        "used_memory": system.used_memory(),
        "uptime": System::uptime(),
    }))
}

async fn processes_handler() -> Json<Value> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut processes: Vec<Value> = system
        .processes()
        .values()
        .map(|process| {
            json!({
                "pid": process.pid().as_u32(),
                "name": process.name().to_string_lossy(),
                "cpu": process.cpu_usage(),
                "memory": process.memory(),
            })
        })
        .collect();
    processes.sort_by_key(|process| process["pid"].as_u64());

    Json(json!({ "processes": processes }))
}

async fn ports_handler() -> (StatusCode, Json<Value>) {
    envelope("ports", host::open_ports().await)
}

async fn containers_handler() -> (StatusCode, Json<Value>) {
    envelope("containers", host::docker_containers().await)
}

/// Wraps `result` as `{key: value}`, or a 500 with `{error}`.
fn envelope<T: Serialize>(
    key: &str,
    result: Result<T, HostError>,
) -> (StatusCode, Json<Value>) {
    match result {
        Ok(value) => (StatusCode::OK, Json(json!({ key: value }))),
        Err(err) => {
            warn!("{key} query failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("received shutdown signal");
}
