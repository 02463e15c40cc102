//! Transport layer for the context server.
//!
//! Supports two transports:
//! - stdio: Standard input/output (default, for agent hosts)
//! - http: MCP over HTTP/SSE plus the dashboard JSON API
//!
//! The HTTP transport is optional and requires the `http` feature flag.

use crate::constants::{DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT};

/// Transport configuration.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Transport type to use.
    pub transport_type: TransportType,

    /// HTTP server configuration (only used for HTTP transport).
    pub http: HttpConfig,
}

impl TransportConfig {
    /// Create configuration from environment variables.
    ///
    /// An unrecognized `CONTEXT_TRANSPORT` value is reported as an error
    /// instead of silently falling back to stdio.
    pub fn from_env() -> Result<Self, ParseTransportTypeError> {
        let transport_type = match std::env::var("CONTEXT_TRANSPORT") {
            Ok(value) => value.parse()?,
            Err(_) => TransportType::default(),
        };
        Ok(Self {
            transport_type,
            http: HttpConfig::from_env(),
        })
    }
}

/// Available transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportType {
    /// Standard input/output transport (default).
    #[default]
    Stdio,

    /// HTTP transport with SSE and the dashboard API.
    #[cfg(feature = "http")]
    Http,
}

/// Error returned when parsing a transport type fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTransportTypeError(String);

impl std::fmt::Display for ParseTransportTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transport type: '{}'", self.0)
    }
}

impl std::error::Error for ParseTransportTypeError {}

impl std::str::FromStr for TransportType {
    type Err = ParseTransportTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" | "standard" | "io" => Ok(TransportType::Stdio),
            #[cfg(feature = "http")]
            "http" | "sse" | "web" => Ok(TransportType::Http),
            _ => Err(ParseTransportTypeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Stdio => write!(f, "stdio"),
            #[cfg(feature = "http")]
            TransportType::Http => write!(f, "http"),
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Enable CORS.
    pub enable_cors: bool,

    /// Allowed origins for CORS (empty means all).
    pub cors_origins: Vec<String>,

    /// Enable request tracing via tower-http TraceLayer.
    pub enable_tracing: bool,

    /// Maximum number of HTTP requests handled at once, across all routes.
    pub max_concurrent_requests: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            enable_cors: true,
            cors_origins: Vec::new(),
            enable_tracing: true,
            max_concurrent_requests: 64,
        }
    }
}

fn env_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl HttpConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CONTEXT_HTTP_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("CONTEXT_HTTP_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        if let Ok(cors) = std::env::var("CONTEXT_HTTP_CORS") {
            config.enable_cors = env_flag(&cors);
        }

        if let Ok(origins) = std::env::var("CONTEXT_HTTP_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(tracing) = std::env::var("CONTEXT_HTTP_TRACING") {
            config.enable_tracing = env_flag(&tracing);
        }

        if let Ok(limit) = std::env::var("CONTEXT_HTTP_MAX_CONCURRENT") {
            if let Ok(n) = limit.parse::<usize>() {
                if n > 0 {
                    config.max_concurrent_requests = n;
                }
            }
        }

        config
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// HTTP server built on axum and mcpkit-axum (only available with `http` feature).
///
/// Routes:
/// - `/mcp` and `/mcp/sse`: MCP JSON-RPC and streaming
/// - `/api/context`: dashboard reads (`action=query|query_all|schema|info`)
/// - `/api/context/refresh`: reload one table
/// - `/health` and `/`: liveness with table count and metrics
#[cfg(feature = "http")]
pub mod http_server {
    use super::*;
    use crate::error::ServerError;
    use crate::server::FeedbackContextServer;
    use crate::shutdown::SharedShutdownController;
    use crate::tools::operations;
    use axum::extract::{Query, State};
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use mcpkit_axum::McpRouter;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use tower::limit::GlobalConcurrencyLimitLayer;
    use tower_http::cors::{AllowOrigin, CorsLayer};
    use tower_http::trace::TraceLayer;
    use tracing::{info, warn};

    /// Query parameters accepted by the dashboard endpoints.
    #[derive(Debug, Default, Deserialize)]
    pub struct ContextParams {
        pub action: Option<String>,
        pub table: Option<String>,
        pub key: Option<String>,
    }

    /// Failure body `{ success: false, error, code }` with a mapped status.
    #[derive(Debug)]
    pub struct ApiError(ServerError);

    impl From<ServerError> for ApiError {
        fn from(err: ServerError) -> Self {
            Self(err)
        }
    }

    fn status_for(err: &ServerError) -> StatusCode {
        match err {
            ServerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServerError::TableNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let status = status_for(&self.0);
            if status.is_server_error() {
                warn!("Dashboard request failed: {}", self.0);
            }
            let body = json!({
                "success": false,
                "error": self.0.to_string(),
                "code": self.0.code(),
            });
            (status, Json(body)).into_response()
        }
    }

    type ApiResult = Result<Json<Value>, ApiError>;

    fn param(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or_default()
    }

    async fn context_handler(
        State(server): State<FeedbackContextServer>,
        Query(params): Query<ContextParams>,
    ) -> ApiResult {
        let registry = server.registry();
        let table = param(&params.table);

        let body = match param(&params.action).trim() {
            "query" => {
                let key = param(&params.key);
                let data = operations::query_context(registry, table, key)?;
                json!({ "success": true, "data": data, "table": table, "key": key })
            }
            "query_all" => {
                let data = operations::query_all_context(registry, table, None)?;
                let count = data.as_array().map_or(0, Vec::len);
                json!({ "success": true, "data": data, "table": table, "count": count })
            }
            "schema" => {
                let data = operations::get_table_schema(registry, table)?;
                json!({ "success": true, "data": data, "table": table })
            }
            "info" => {
                let data = operations::get_tables_info(registry)?;
                json!({ "success": true, "data": data })
            }
            "" => return Err(ServerError::invalid_input("action is required").into()),
            other => {
                return Err(ServerError::invalid_input(format!(
                    "Invalid action '{other}', expected query, query_all, schema or info"
                ))
                .into())
            }
        };

        Ok(Json(body))
    }

    async fn refresh_handler(
        State(server): State<FeedbackContextServer>,
        Query(params): Query<ContextParams>,
    ) -> ApiResult {
        let data =
            operations::refresh_context_table(server.registry(), param(&params.table)).await?;
        Ok(Json(json!({ "success": true, "data": data })))
    }

    async fn health_handler(State(server): State<FeedbackContextServer>) -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "server": "feedback-context-server",
            "version": env!("CARGO_PKG_VERSION"),
            "tables": server.registry().len(),
            "uptimeSeconds": server.uptime_secs(),
            "metrics": server.metrics().snapshot(),
            "pool": server.pool_status(),
            "endpoints": {
                "mcp": "/mcp",
                "sse": "/mcp/sse",
                "context": "/api/context",
                "health": "/health"
            }
        }))
    }

    fn cors_layer(config: &HttpConfig) -> CorsLayer {
        if config.cors_origins.is_empty() {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
    }

    fn dashboard_routes(server: FeedbackContextServer) -> Router {
        Router::new()
            .route("/api/context", get(context_handler))
            .route("/api/context/refresh", post(refresh_handler))
            .route("/health", get(health_handler))
            .route("/", get(health_handler))
            .with_state(server)
    }

    /// Concurrency cap, CORS and tracing around every route of `router`.
    ///
    /// The cap is one semaphore shared by all routes.
    fn with_layers(router: Router, config: &HttpConfig) -> Router {
        let mut router = router.layer(GlobalConcurrencyLimitLayer::new(
            config.max_concurrent_requests,
        ));
        if config.enable_cors {
            router = router.layer(cors_layer(config));
        }
        if config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }
        router
    }

    /// Dashboard API and health routes, without the MCP endpoints.
    pub fn dashboard_router(server: FeedbackContextServer, config: &HttpConfig) -> Router {
        with_layers(dashboard_routes(server), config)
    }

    /// Full application: MCP endpoints merged with the dashboard routes.
    pub fn app(server: FeedbackContextServer, config: &HttpConfig) -> Router {
        let mcp_router = McpRouter::new(server.clone())
            .post_path("/mcp")
            .sse_path("/mcp/sse");

        with_layers(
            dashboard_routes(server).merge(mcp_router.into_router()),
            config,
        )
    }

    /// Start the HTTP server.
    pub async fn start_http_server(
        server: FeedbackContextServer,
        config: HttpConfig,
    ) -> Result<(), anyhow::Error> {
        start_http_server_with_shutdown(server, config, None).await
    }

    /// Start the HTTP server, stopping when the controller signals shutdown.
    pub async fn start_http_server_with_shutdown(
        server: FeedbackContextServer,
        config: HttpConfig,
        shutdown_controller: Option<SharedShutdownController>,
    ) -> Result<(), anyhow::Error> {
        let app = app(server, &config);

        let addr = config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("HTTP server listening on http://{}", addr);
        info!("MCP endpoint: http://{}/mcp", addr);
        info!("Dashboard API: http://{}/api/context", addr);
        info!("Health endpoint: http://{}/health", addr);

        if let Some(controller) = shutdown_controller {
            let mut shutdown_signal = controller.signal();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal.recv().await;
                    info!("HTTP server received shutdown signal");
                })
                .await?;
        } else {
            axum::serve(listener, app).await?;
        }

        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_transport_type_parsing() {
        assert_eq!("stdio".parse::<TransportType>(), Ok(TransportType::Stdio));
        assert_eq!(" STDIO ".parse::<TransportType>(), Ok(TransportType::Stdio));
        #[cfg(feature = "http")]
        assert_eq!("sse".parse::<TransportType>(), Ok(TransportType::Http));
        assert!("carrier-pigeon".parse::<TransportType>().is_err());
    }

    #[test]
    #[serial]
    fn test_http_config_from_env() {
        std::env::set_var("CONTEXT_HTTP_PORT", "8080");
        std::env::set_var("CONTEXT_HTTP_CORS", "false");
        std::env::set_var("CONTEXT_HTTP_CORS_ORIGINS", "http://a.test, ,http://b.test");
        let config = HttpConfig::from_env();
        assert_eq!(config.port, 8080);
        assert!(!config.enable_cors);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        std::env::remove_var("CONTEXT_HTTP_PORT");
        std::env::remove_var("CONTEXT_HTTP_CORS");
        std::env::remove_var("CONTEXT_HTTP_CORS_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_transport_config_rejects_unknown() {
        std::env::set_var("CONTEXT_TRANSPORT", "smoke");
        assert!(TransportConfig::from_env().is_err());
        std::env::remove_var("CONTEXT_TRANSPORT");
        assert_eq!(
            TransportConfig::from_env().unwrap().transport_type,
            TransportType::Stdio
        );
    }
}
