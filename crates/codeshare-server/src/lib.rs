//! HTTP and WebSocket front end for collaborative code sessions
//!
//! Routes:
//!
//! - `POST /create-room` hands out a fresh room code and records the host.
//! - `GET /ws/{room_code}?username=` joins a room over a WebSocket.
//! - `POST /execute` runs code in a sandbox and, given a room code, shares
//!   the result with everyone in that room.
//! - `GET /health` reports liveness and the number of rooms.

pub mod error;
pub mod room_code;
pub mod session;

pub use error::{Result, ServerError};
pub use session::{run_session, SessionSettings};

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{DefaultBodyLimit, Json as AxumJson, Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use codeshare_core::{CodeExecutor, CodeshareConfig, ExecutionBridge, RoomRegistry};
use codeshare_types::{
    CreateRoomRequest, CreateRoomResponse, ExecuteQuery, ExecuteRequest, ExecuteResponse,
    JoinQuery,
};
use futures_util::StreamExt;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub rooms: usize,
}

/// Configuration for the codeshare server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
    /// Largest WebSocket message accepted from a client
    pub max_frame_bytes: usize,
    pub session: SessionSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_cors: true,
            cors_origins: Some(vec!["http://localhost:3000".to_string()]),
            max_body_size: 1024 * 1024,
            enable_logging: true,
            max_frame_bytes: 64 * 1024,
            session: SessionSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a loaded configuration file.
    pub fn from_config(config: &CodeshareConfig) -> Result<Self> {
        let server = Self::new()
            .with_bind_addr_str(&config.server.bind_addr)?
            .with_cors_origins(config.server.cors_origins.clone())
            .with_max_body_size(config.server.max_body_size)
            .with_logging(config.server.enable_logging)
            .with_max_frame_bytes(config.hub.max_frame_bytes)
            .with_queue_capacity(config.hub.outbound_queue_capacity)
            .with_keepalive(config.hub.keepalive_interval());
        Ok(server)
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    /// Set allowed CORS origins. An empty list allows any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = (!origins.is_empty()).then_some(origins);
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.session.queue_capacity = capacity;
        self
    }

    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.session.keepalive_interval = interval;
        self
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub bridge: ExecutionBridge,
    pub config: ServerConfig,
}

/// Handler for the /create-room POST endpoint.
async fn create_room_handler(
    State(state): State<AppState>,
    payload: std::result::Result<AxumJson<CreateRoomRequest>, JsonRejection>,
) -> Result<Json<CreateRoomResponse>> {
    let AxumJson(request) = payload?;
    if request.username.trim().is_empty() {
        return Err(ServerError::missing_field("Username"));
    }

    let room = room_code::create_room(&state.registry, &request.username)
        .ok_or_else(|| ServerError::internal("Could not allocate a free room code"))?;

    Ok(Json(CreateRoomResponse {
        room_code: room.code().to_string(),
    }))
}

/// Handler for the /ws/{room_code} endpoint.
async fn ws_handler(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(query): Query<JoinQuery>,
    upgrade: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if query.username.trim().is_empty() {
        return ServerError::missing_field("Username").into_response();
    }
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            log::warn!("Rejected WebSocket request for room {}: {}", room_code, rejection);
            return rejection.into_response();
        }
    };

    let room = state.registry.get_or_create(&room_code);
    let username = query.username;
    let settings = state.config.session;
    log::info!("{} joining room {}", username, room_code);

    ws.max_message_size(state.config.max_frame_bytes)
        .max_frame_size(state.config.max_frame_bytes)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            run_session(sink, stream, room, username, settings).await;
        })
}

/// Handler for the /execute POST endpoint.
async fn execute_handler(
    State(state): State<AppState>,
    Query(query): Query<ExecuteQuery>,
    payload: std::result::Result<AxumJson<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>> {
    let AxumJson(request) = payload?;
    let room_code = query
        .room_code
        .or_else(|| request.room_code.clone())
        .filter(|code| !code.is_empty());
    log::info!(
        "Execution request: language={}, {} bytes, room={:?}",
        request.language,
        request.code.len(),
        room_code
    );

    let result = state.bridge.run(request, room_code.as_deref()).await?;
    Ok(Json(ExecuteResponse::success(result.output, result.error)))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rooms: state.registry.len(),
    })
}

/// The codeshare server: room hub plus execution endpoint.
pub struct CodeshareServer {
    registry: Arc<RoomRegistry>,
    bridge: ExecutionBridge,
    config: ServerConfig,
}

impl CodeshareServer {
    pub fn new(executor: Arc<dyn CodeExecutor>, config: ServerConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let bridge = ExecutionBridge::new(registry.clone(), executor);
        Self {
            registry,
            bridge,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            bridge: self.bridge.clone(),
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/create-room", post(create_room_handler))
            .route("/ws/{room_code}", get(ws_handler))
            .route("/execute", post(execute_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>,
                 next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    // Health probes are frequent; keep them out of info logs.
                    if uri.path() == "/health" {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();

                    log::debug!(
                        "Response {} {} completed in {:?}",
                        request_id,
                        response.status(),
                        duration
                    );
                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = if let Some(ref origins) = self.config.cors_origins {
                let origins: std::result::Result<Vec<_>, _> =
                    origins.iter().map(|s| s.parse()).collect();
                match origins {
                    Ok(origins) => CorsLayer::new()
                        .allow_origin(origins)
                        .allow_methods(Any)
                        .allow_headers(Any),
                    Err(_) => {
                        log::warn!("Invalid CORS origin in configuration, allowing any origin");
                        CorsLayer::permissive()
                    }
                }
            } else {
                CorsLayer::permissive()
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Start the server and run until `shutdown_signal` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("codeshare server starting on {}", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);
        log::info!("Create room: http://{}/create-room", self.config.bind_addr);
        log::info!("Execute: http://{}/execute", self.config.bind_addr);
        log::info!("WebSocket: ws://{}/ws/{{room_code}}", self.config.bind_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("codeshare server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use codeshare_core::hub::outbound_queue;
    use codeshare_core::{ExecutionRequest, ExecutionResult, Language, SandboxError};
    use codeshare_types::Event;
    use tower::ServiceExt; // for `oneshot`

    /// Prints the source back unless it is "loop", which times out.
    struct MockExecutor;

    #[async_trait]
    impl CodeExecutor for MockExecutor {
        fn default_timeout(&self) -> Duration {
            Duration::from_secs(30)
        }

        async fn execute(
            &self,
            request: ExecutionRequest,
        ) -> std::result::Result<ExecutionResult, SandboxError> {
            request.language.parse::<Language>()?;
            if request.source == "loop" {
                return Err(SandboxError::Timeout(request.timeout));
            }
            Ok(ExecutionResult {
                output: format!("{}\n", request.source),
                error: None,
                exit_code: 0,
            })
        }
    }

    fn server() -> CodeshareServer {
        CodeshareServer::new(Arc::new(MockExecutor), ServerConfig::new())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = server();
        server.registry().get_or_create("abc123");
        let response = server
            .build_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["rooms"], 1);
    }

    #[tokio::test]
    async fn test_create_room_requires_username() {
        let server = server();
        let response = server
            .build_router()
            .oneshot(post_json("/create-room", r#"{"username":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Username is required");
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_create_room_returns_code_and_records_host() {
        let server = server();
        let response = server
            .build_router()
            .oneshot(post_json("/create-room", r#"{"username":"alice"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let code = body["roomCode"].as_str().unwrap();
        assert_eq!(code.len(), 6);
        let room = server.registry().get(code).unwrap();
        assert_eq!(room.host().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_execute_broadcasts_to_room_from_query() {
        let server = server();
        let room = server.registry().get_or_create("abc123");
        let (outbox, mut inbox) = outbound_queue(8);
        room.register(uuid::Uuid::new_v4(), "bob", outbox);

        let response = server
            .build_router()
            .oneshot(post_json(
                "/execute?roomCode=abc123",
                r#"{"code":"hello","language":"python"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["output"], "hello\n");
        assert!(body.get("error").is_none());

        let frame = inbox.try_recv().unwrap();
        assert_eq!(
            Event::decode(&frame).unwrap(),
            Event::execution_result("hello\n", None)
        );
    }

    #[tokio::test]
    async fn test_execute_accepts_room_code_in_body() {
        let server = server();
        let room = server.registry().get_or_create("abc123");
        let (outbox, mut inbox) = outbound_queue(8);
        room.register(uuid::Uuid::new_v4(), "bob", outbox);

        let response = server
            .build_router()
            .oneshot(post_json(
                "/execute",
                r#"{"code":"hi","language":"javascript","roomCode":"abc123"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(inbox.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_execute_unsupported_language() {
        let server = server();
        let response = server
            .build_router()
            .oneshot(post_json("/execute", r#"{"code":"puts 1","language":"ruby"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["output"], "");
        assert_eq!(body["error"], "unsupported language: ruby");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let server = server();
        let response = server
            .build_router()
            .oneshot(post_json("/execute", r#"{"code":"print(1)""#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Invalid request:"), "{}", error);

        let response = server
            .build_router()
            .oneshot(post_json("/create-room", "alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_execute_timeout_is_gateway_timeout() {
        let server = server();
        let response = server
            .build_router()
            .oneshot(post_json(
                "/execute?roomCode=abc123",
                r#"{"code":"loop","language":"python"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json_body(response).await["error"], "execution timed out after 30s");
        // Unknown rooms are never created by an execution.
        assert!(server.registry().get("abc123").is_none());
    }

    #[tokio::test]
    async fn test_ws_requires_username() {
        let server = server();
        let response = server
            .build_router()
            .oneshot(Request::get("/ws/abc123").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Username is required");
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_ws_without_upgrade_is_rejected() {
        let server = server();
        let response = server
            .build_router()
            .oneshot(
                Request::get("/ws/abc123?username=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        assert!(server.registry().is_empty());
    }

    #[test]
    fn test_server_config_from_file_config() {
        let config = codeshare_core::ConfigLoader::from_str(
            "server:\n  bind_addr: \"127.0.0.1:9000\"\n  cors_origins: []\nhub:\n  outbound_queue_capacity: 4\n",
        )
        .unwrap();
        let server = ServerConfig::from_config(&config).unwrap();
        assert_eq!(server.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(server.cors_origins, None);
        assert_eq!(server.session.queue_capacity, 4);
        assert_eq!(server.session.keepalive_interval, Duration::from_secs(5));
    }
}
