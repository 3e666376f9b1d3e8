//! HTTP boundary for the orchestration service.
//!
//! A thin axum layer over [`AppService`]: routes deserialize request bodies,
//! call one service operation, and serialize the typed response. All
//! messaging semantics live below this layer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::error::{ServerError, ServiceError};
use crate::service::AppService;

/// Configuration for the API server.
pub struct ApiServerConfig {
    /// Address to bind the server to.
    pub addr: SocketAddr,
}

/// HTTP server hosting the orchestration API.
pub struct ApiServer {
    config: ApiServerConfig,
    service: Arc<AppService>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Create a new API server for the given service.
    pub fn new(config: ApiServerConfig, service: Arc<AppService>) -> Self {
        Self {
            config,
            service,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind the listener and spawn the server task.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        let app = routes(self.service.clone());

        let listener = tokio::net::TcpListener::bind(self.config.addr)
            .await
            .map_err(|e| ServerError::StartupFailed {
                reason: format!("Failed to bind to {}: {}", self.config.addr, e),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::StartupFailed {
            reason: e.to_string(),
        })?;

        tracing::info!("API server listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                    tracing::info!("API server shutting down");
                })
                .await
            {
                tracing::error!("API server error: {}", e);
            }
        });

        self.handle = Some(handle);
        Ok(local_addr)
    }

    /// Signal graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Build the API route tree with its state applied.
pub fn routes(service: Arc<AppService>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/agents", post(create_agent))
        .route("/api/v1/agents/{name}/launch", post(launch_agent))
        .route("/api/v1/agents/{name}/messages", post(send_feedback))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Request body for agent creation.
#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub agent_name: String,
    #[serde(default)]
    pub goals: Vec<String>,
}

/// Request body for interacting with an agent.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_input: Option<String>,
}

/// Error body returned for failed requests.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn health() -> &'static str {
    "ok"
}

async fn create_agent(
    State(service): State<Arc<AppService>>,
    headers: HeaderMap,
    Json(body): Json<CreateAgentRequest>,
) -> Response {
    // Presence check only; real authentication is a collaborator concern.
    if !headers.contains_key("x-api-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "missing x-api-key header".to_string(),
            }),
        )
            .into_response();
    }

    let mut content: HashMap<String, serde_json::Value> = HashMap::new();
    content.insert(
        "agent_name".to_string(),
        serde_json::Value::String(body.agent_name),
    );
    content.insert(
        "goals".to_string(),
        serde_json::Value::Array(
            body.goals
                .into_iter()
                .map(serde_json::Value::String)
                .collect(),
        ),
    );

    match service.bootstrap_agent(content, HashMap::new()).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn launch_agent(
    State(service): State<Arc<AppService>>,
    Path(name): Path<String>,
) -> Response {
    let mut content: HashMap<String, serde_json::Value> = HashMap::new();
    content.insert("agent_name".to_string(), serde_json::Value::String(name));

    match service.launch_agent(content, HashMap::new()).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn send_feedback(
    State(service): State<Arc<AppService>>,
    Path(name): Path<String>,
    Json(body): Json<FeedbackRequest>,
) -> Response {
    let mut content: HashMap<String, serde_json::Value> = HashMap::new();
    content.insert("agent_name".to_string(), serde_json::Value::String(name));
    if let Some(input) = body.user_input {
        content.insert("user_input".to_string(), serde_json::Value::String(input));
    }

    match service.give_agent_feedback(content).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => service_error_response(e),
    }
}

fn service_error_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::ResponseTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::SendRejected { .. } | ServiceError::Broker(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}
