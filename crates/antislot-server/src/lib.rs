//! AntiSlot Server - signed ruleset distribution API.
//!
//! A read-only HTTP surface over the rule store. Every ruleset response is
//! signed with HMAC-SHA256 and tagged with a content ETag so clients can
//! revalidate cheaply.
//!
//! ## Endpoints
//!
//! - `GET /v1/health` - Versions and counts of both rulesets (no-cache)
//! - `GET /v1/blocklist` - `{version, updatedAt, domains, signature}`
//! - `GET /v1/patterns` - `{version, updatedAt, patterns, signature}`
//!
//! Administrative mutations are not exposed here; they go through the CLI.
//!
//! ## Example
//!
//! ```no_run
//! use antislot_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default().with_port(8080)).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

mod cache;
pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::net::SocketAddr;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use antislot_core::signature::SignatureService;
use antislot_storage::{RuleStore, StoreConfig};

pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Development signing secret. Override it in any real deployment.
pub const DEFAULT_HMAC_SECRET: &str = "antislot-secret-key-change-in-production";

/// Cache-Control header values per endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheControl {
    pub health: String,
    pub blocklist: String,
    pub patterns: String,
}

impl Default for CacheControl {
    fn default() -> Self {
        Self {
            health: "no-cache".to_string(),
            blocklist: "public, max-age=3600, must-revalidate".to_string(),
            patterns: "public, max-age=7200, must-revalidate".to_string(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0).
    pub host: String,
    /// Port to bind to (default: 3000).
    pub port: u16,
    /// HMAC key for snapshot signatures.
    pub hmac_secret: String,
    /// Rule store location and policy.
    pub store: StoreConfig,
    pub cache_control: CacheControl,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            hmac_secret: DEFAULT_HMAC_SECRET.to_string(),
            store: StoreConfig::default(),
            cache_control: CacheControl::default(),
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the signing secret.
    pub fn with_hmac_secret(mut self, secret: impl Into<String>) -> Self {
        self.hmac_secret = secret.into();
        self
    }

    /// Sets the store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Returns true if the development secret is in use.
    pub fn uses_default_secret(&self) -> bool {
        self.hmac_secret == DEFAULT_HMAC_SECRET
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] antislot_storage::StorageError),

    /// Signing key error.
    #[error("signature error: {0}")]
    Signature(#[from] antislot_core::CoreError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Opens the rule store, creating default files if needed, and builds
    /// the server.
    pub fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        if config.uses_default_secret() {
            warn!("Using the built-in development HMAC secret; set HMAC_SECRET in production");
        }

        let store = RuleStore::open(&config.store);
        store.initialize()?;
        let signer = SignatureService::new(&config.hmac_secret)?;
        let state = AppState::with_cache_control(store, signer, config.cache_control.clone());

        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self {
            router: build_router(state),
            addr,
        })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until Ctrl-C.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting AntiSlot API server on {}", self.addr);

        // SO_REUSEADDR lets a restart bind while old sockets linger in TIME_WAIT.
        let socket = Socket::new(Domain::for_address(self.addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        info!("Health check: http://{}/v1/health", self.addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/v1/blocklist", get(handlers::get_blocklist))
        .route("/v1/patterns", get(handlers::get_patterns))
        .fallback(handlers::unknown_route)
        .layer(middleware::from_fn(cache::etag_layer))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use antislot_core::snapshot::{BlocklistSnapshot, PatternsSnapshot};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn create_test_app(dir: &TempDir) -> (Router, RuleStore) {
        let store = RuleStore::open(&StoreConfig::in_dir(dir.path()));
        store.initialize().unwrap();
        let state = AppState::new(store.clone(), SignatureService::new(SECRET).unwrap());
        (build_router(state), store)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let (app, store) = create_test_app(&dir);
        store.blocklist.add_domain("bet365.com", "test", None).unwrap();

        let response = app.oneshot(get("/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["timestamp"].is_number());
        assert_eq!(json["blocklistVersion"], 2);
        assert_eq!(json["blocklistCount"], 1);
        assert_eq!(json["patternsVersion"], 1);
        assert_eq!(json["patternsCount"], 7);
    }

    #[tokio::test]
    async fn test_blocklist_is_signed() {
        let dir = TempDir::new().unwrap();
        let (app, store) = create_test_app(&dir);
        store.blocklist.add_domain("casino.com", "test", None).unwrap();
        store.blocklist.add_domain("bet365.com", "test", None).unwrap();

        let response = app.oneshot(get("/v1/blocklist")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=3600, must-revalidate"
        );
        assert!(response.headers().contains_key(header::ETAG));

        let snapshot: BlocklistSnapshot = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(snapshot.domains, vec!["bet365.com", "casino.com"]);
        assert_eq!(snapshot.version, 3);
        assert!(snapshot.verify(&SignatureService::new(SECRET).unwrap()));
        assert!(!snapshot.verify(&SignatureService::new("other").unwrap()));
    }

    #[tokio::test]
    async fn test_patterns_is_signed() {
        let dir = TempDir::new().unwrap();
        let (app, _) = create_test_app(&dir);

        let response = app.oneshot(get("/v1/patterns")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=7200, must-revalidate"
        );

        let json = body_json(response).await;
        assert_eq!(json["patterns"][0]["type"], "contains");
        let snapshot: PatternsSnapshot = serde_json::from_value(json).unwrap();
        assert!(snapshot.verify(&SignatureService::new(SECRET).unwrap()));
    }

    #[tokio::test]
    async fn test_etag_stable_and_304() {
        let dir = TempDir::new().unwrap();
        let (app, _) = create_test_app(&dir);

        let first = app.clone().oneshot(get("/v1/blocklist")).await.unwrap();
        let second = app.clone().oneshot(get("/v1/blocklist")).await.unwrap();
        let tag = first.headers()[header::ETAG].clone();
        assert_eq!(tag, second.headers()[header::ETAG]);

        let request = Request::builder()
            .method("GET")
            .uri("/v1/blocklist")
            .header(header::IF_NONE_MATCH, tag.clone())
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[header::ETAG], tag);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_etag_changes_after_mutation() {
        let dir = TempDir::new().unwrap();
        let (app, store) = create_test_app(&dir);

        let before = app.clone().oneshot(get("/v1/blocklist")).await.unwrap();
        let stale = before.headers()[header::ETAG].clone();

        store.blocklist.add_domain("bet365.com", "test", None).unwrap();

        let request = Request::builder()
            .method("GET")
            .uri("/v1/blocklist")
            .header(header::IF_NONE_MATCH, stale.clone())
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(response.headers()[header::ETAG], stale);
    }

    #[tokio::test]
    async fn test_corrupt_store_is_server_error() {
        let dir = TempDir::new().unwrap();
        let (app, store) = create_test_app(&dir);
        std::fs::write(dir.path().join("blocklist.json"), b"{ broken").unwrap();
        store.blocklist.invalidate_cache();

        let response = app.clone().oneshot(get("/v1/blocklist")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.headers().contains_key(header::ETAG));
        let json = body_json(response).await;
        assert_eq!(json["code"], "ruleset_invalid");
        assert!(json["error"].as_str().unwrap().starts_with("blocklist is invalid"));

        let response = app.oneshot(get("/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unreadable_store_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let (app, store) = create_test_app(&dir);
        let path = dir.path().join("patterns.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        store.patterns.invalidate_cache();

        let response = app.oneshot(get("/v1/patterns")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["code"], "ruleset_unavailable");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let dir = TempDir::new().unwrap();
        let (app, _) = create_test_app(&dir);

        let response = app.oneshot(get("/v2/blocklist")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["code"], "unknown_route");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_reads_on_single_worker() {
        let dir = TempDir::new().unwrap();
        let (app, _store) = create_test_app(&dir);

        let requests = (0..16).map(|i| {
            let app = app.clone();
            let uri = ["/v1/health", "/v1/blocklist", "/v1/patterns"][i % 3];
            tokio::spawn(async move { app.oneshot(get(uri)).await.unwrap().status() })
        });
        for handle in requests.collect::<Vec<_>>() {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_no_write_routes() {
        let dir = TempDir::new().unwrap();
        let (app, _) = create_test_app(&dir);

        let request = Request::builder()
            .method("POST")
            .uri("/v1/blocklist")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.uses_default_secret());
        assert_eq!(config.cache_control.health, "no-cache");
    }

    #[tokio::test]
    async fn test_server_config_builders() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::default()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_hmac_secret("s3cret")
            .with_store(StoreConfig::in_dir(dir.path()));
        assert!(!config.uses_default_secret());

        let server = Server::new(config).unwrap();
        assert_eq!(server.addr().to_string(), "127.0.0.1:9000");
        assert!(dir.path().join("patterns.json").exists());
    }
}
