//! HTTP API.
//!
//! `POST /crewai` and `POST /query` answer marketing analytics queries.
//! `GET /health` reports whether the service is configured to answer them.

mod handlers;
mod middleware;
mod validation;

pub use handlers::{missing_env_vars, ApiError, QueryRequest, QueryResponse, REQUIRED_ENV_VARS};
pub use middleware::RateLimiter;
pub use validation::validate_query;

use crate::config::Settings;
use crate::error::Result;
use crate::pipeline::QueryPipeline;
use axum::{
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Shared application state.
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
    pub settings: Settings,
    pub limiter: RateLimiter,
    env: Box<EnvLookup>,
}

impl AppState {
    pub fn new(pipeline: Arc<QueryPipeline>, settings: Settings) -> Self {
        let limiter = RateLimiter::new(
            settings.security.rate_limit_requests,
            Duration::from_secs(settings.security.rate_limit_window_secs),
        );
        Self {
            pipeline,
            settings,
            limiter,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the environment lookup used by the health check.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Box::new(lookup);
        self
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if !settings.is_production() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .security
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    if origins.is_empty() {
        warn!("Production CORS has no allowed origins; cross-origin requests will be refused");
    }
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let queries = Router::new()
        .route("/crewai", post(handlers::query))
        .route("/query", post(handlers::query))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_api_key));

    let api = Router::new()
        .route("/health", get(handlers::health))
        .merge(queries);

    with_frontend(api, state.settings.server.static_dir.as_deref())
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(from_fn(middleware::log_requests))
        .layer(from_fn(middleware::security_headers))
        .layer(cors_layer(&state.settings))
        .with_state(state)
}

/// Mount the static frontend, if one is configured, behind the API routes.
///
/// Files are served from the directory root and from `/static`. Any other
/// unmatched path gets `index.html` so client-side routes resolve.
fn with_frontend(
    api: Router<Arc<AppState>>,
    static_dir: Option<&str>,
) -> Router<Arc<AppState>> {
    let dir = match static_dir.map(Settings::expand_path) {
        Some(dir) if dir.is_dir() => dir,
        Some(dir) => {
            warn!("Static directory {:?} not found; serving the API only", dir);
            return api.route("/", get(handlers::root));
        }
        None => return api.route("/", get(handlers::root)),
    };

    info!("Serving frontend from {:?}", dir);
    let index: PathBuf = dir.join("index.html");
    let api = api
        .route("/api", any(handlers::api_not_found))
        .route("/api/{*rest}", any(handlers::api_not_found))
        .nest_service("/static", ServeDir::new(&dir));

    if index.is_file() {
        api.route_service("/", ServeFile::new(&index))
            .fallback_service(ServeDir::new(&dir).fallback(ServeFile::new(&index)))
    } else {
        api.route("/", get(handlers::root))
            .fallback_service(ServeDir::new(&dir))
    }
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{
        AgentError, AgentFramework, AgentProfile, AgentRegistry, ExecutionResult, RetryPolicy,
        TaskExecutor,
    };
    use crate::config::TaskPrompts;
    use crate::error::MarketlensError;
    use crate::mcp::{SessionManager, ToolDescriptor, ToolOutput, ToolSession};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct EmptySession;

    #[async_trait]
    impl ToolSession for EmptySession {
        fn id(&self) -> &str {
            "empty"
        }
        fn tools(&self) -> &[ToolDescriptor] {
            &[]
        }
        async fn invoke(&self, _name: &str, _arguments: Value) -> crate::Result<ToolOutput> {
            Err(MarketlensError::Protocol("no tools".to_string()))
        }
        async fn close(&mut self) {}
        fn abort(&mut self) {}
    }

    struct Sessions {
        reachable: bool,
    }

    #[async_trait]
    impl SessionManager for Sessions {
        async fn open(&self) -> crate::Result<Box<dyn ToolSession>> {
            if self.reachable {
                Ok(Box::new(EmptySession))
            } else {
                Err(MarketlensError::ToolUnavailable("neo4j is down".to_string()))
            }
        }
    }

    struct Canned;

    #[async_trait]
    impl AgentFramework for Canned {
        async fn execute(
            &self,
            _profile: &AgentProfile,
            _task_description: &str,
            _tools: &dyn ToolSession,
            _timeout: Duration,
        ) -> std::result::Result<ExecutionResult, AgentError> {
            Ok(ExecutionResult::text(
                "## Executive Summary\nSteady.\n## Performance Metrics\nCTR 2.9%\n\
                 ## Optimization Opportunities\nTighten match types.\n## Action Plan\nReview weekly.",
            ))
        }
    }

    struct Failing;

    #[async_trait]
    impl AgentFramework for Failing {
        async fn execute(
            &self,
            _profile: &AgentProfile,
            _task_description: &str,
            _tools: &dyn ToolSession,
            _timeout: Duration,
        ) -> std::result::Result<ExecutionResult, AgentError> {
            Err(AgentError::Framework("model refused the task".to_string()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl AgentFramework for Hanging {
        async fn execute(
            &self,
            _profile: &AgentProfile,
            _task_description: &str,
            _tools: &dyn ToolSession,
            _timeout: Duration,
        ) -> std::result::Result<ExecutionResult, AgentError> {
            std::future::pending().await
        }
    }

    struct CancelledOnOpen;

    #[async_trait]
    impl SessionManager for CancelledOnOpen {
        async fn open(&self) -> crate::Result<Box<dyn ToolSession>> {
            Err(MarketlensError::Cancelled)
        }
    }

    fn pipeline_with(
        sessions: Arc<dyn SessionManager>,
        framework: Arc<dyn AgentFramework>,
        timeout: Duration,
    ) -> Arc<QueryPipeline> {
        Arc::new(QueryPipeline::with_components(
            Arc::new(AgentRegistry::builtin()),
            sessions,
            TaskExecutor::new(framework, RetryPolicy::default()),
            TaskPrompts::default(),
            timeout,
        ))
    }

    fn pipeline(reachable: bool) -> Arc<QueryPipeline> {
        pipeline_with(
            Arc::new(Sessions { reachable }),
            Arc::new(Canned),
            Duration::from_secs(5),
        )
    }

    fn all_env(_key: &str) -> Option<String> {
        Some("set".to_string())
    }

    async fn spawn(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(state), std::future::pending()));
        format!("http://{}", addr)
    }

    async fn spawn_default() -> String {
        spawn(AppState::new(pipeline(true), Settings::default()).with_env(all_env)).await
    }

    #[tokio::test]
    async fn test_root_and_security_headers() {
        let base = spawn_default().await;
        let response = reqwest::get(format!("{}/", base)).await.unwrap();

        assert_eq!(response.status(), 200);
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert!(headers.contains_key("strict-transport-security"));
        assert!(headers.contains_key("content-security-policy"));
        assert!(headers.contains_key("referrer-policy"));

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["health"], "/health");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_health_reports_missing_variables() {
        let state = AppState::new(pipeline(true), Settings::default())
            .with_env(|key| (key == "OPENAI_API_KEY").then(|| "sk-test".to_string()));
        let base = spawn(state).await;

        let response = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(response.status(), 503);
        let body: Value = response.json().await.unwrap();
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("NEO4J_URI"));
        assert!(!detail.contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_health_ok_when_configured() {
        let base = spawn_default().await;
        let response = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "development");
    }

    #[tokio::test]
    async fn test_query_returns_four_section_report() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();

        for path in ["/crewai", "/query"] {
            let response = client
                .post(format!("{}{}", base, path))
                .json(&json!({"query": "What are my top performing Google Ads campaigns?"}))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);

            let body: Value = response.json().await.unwrap();
            assert_eq!(body["status"], "success");
            assert_eq!(body["agent"], "ads");
            assert_eq!(body["report"]["performance_metrics"], "CTR 2.9%");
            assert_eq!(body["report"]["action_plan"], "Review weekly.");
            assert_eq!(body["sections"].as_array().unwrap().len(), 4);
            assert_eq!(body["sections"][0]["title"], "Executive Summary");
            assert!(body["request_id"].as_str().is_some());
        }
    }

    #[tokio::test]
    async fn test_invalid_input_is_422() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();

        for payload in [
            json!({"query": "   "}),
            json!({"query": "x".repeat(1001)}),
            json!({"query": "<script>alert(1)</script>"}),
            json!({"question": "wrong field"}),
        ] {
            let response = client
                .post(format!("{}/query", base))
                .json(&payload)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 422, "{}", payload);
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["status"], "error");
            assert_eq!(body["error"], "InvalidInput");
            assert_eq!(body["retryable"], false);
        }

        let malformed = client
            .post(format!("{}/query", base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(malformed.status(), 422);
    }

    #[tokio::test]
    async fn test_tool_unavailable_is_503_and_retryable() {
        let base = spawn(AppState::new(pipeline(false), Settings::default()).with_env(all_env)).await;
        let response = reqwest::Client::new()
            .post(format!("{}/crewai", base))
            .json(&json!({"query": "bounce rate this week"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 503);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "ToolUnavailable");
        assert_eq!(body["retryable"], true);
        assert!(body.get("report").is_none());
    }

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let mut settings = Settings::default();
        settings.security.api_keys = vec!["secret".to_string()];
        let base = spawn(AppState::new(pipeline(true), settings).with_env(all_env)).await;
        let client = reqwest::Client::new();
        let url = format!("{}/query", base);
        let body = json!({"query": "seo"});

        let anonymous = client.post(&url).json(&body).send().await.unwrap();
        assert_eq!(anonymous.status(), 401);

        let wrong = client
            .post(&url)
            .header("x-api-key", "guess")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), 401);

        let with_header = client
            .post(&url)
            .header("x-api-key", "secret")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(with_header.status(), 200);

        let with_bearer = client.post(&url).bearer_auth("secret").json(&body).send().await.unwrap();
        assert_eq!(with_bearer.status(), 200);

        let health = client.get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(health.status(), 200);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut settings = Settings::default();
        settings.security.rate_limit_requests = 2;
        let base = spawn(AppState::new(pipeline(true), settings).with_env(all_env)).await;
        let url = format!("{}/", base);

        assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
        assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);

        let limited = reqwest::get(&url).await.unwrap();
        assert_eq!(limited.status(), 429);
        assert_eq!(limited.headers()["x-frame-options"], "DENY");
        let body: Value = limited.json().await.unwrap();
        assert_eq!(body["error"], "Rate limit exceeded");
    }

    async fn post_query(pipeline: Arc<QueryPipeline>) -> (reqwest::StatusCode, Value) {
        let base = spawn(AppState::new(pipeline, Settings::default()).with_env(all_env)).await;
        let response = reqwest::Client::new()
            .post(format!("{}/query", base))
            .json(&json!({"query": "google ads cost per lead"}))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_agent_timeout_is_504_and_retryable() {
        let pipeline = pipeline_with(
            Arc::new(Sessions { reachable: true }),
            Arc::new(Hanging),
            Duration::from_millis(100),
        );
        let (status, body) = post_query(pipeline).await;

        assert_eq!(status, 504);
        assert_eq!(body["error"], "AgentExecutionTimeout");
        assert_eq!(body["retryable"], true);
        assert!(body.get("report").is_none());
    }

    #[tokio::test]
    async fn test_agent_failure_is_500_and_not_retryable() {
        let pipeline = pipeline_with(
            Arc::new(Sessions { reachable: true }),
            Arc::new(Failing),
            Duration::from_secs(5),
        );
        let (status, body) = post_query(pipeline).await;

        assert_eq!(status, 500);
        assert_eq!(body["error"], "AgentExecutionError");
        assert_eq!(body["retryable"], false);
        assert!(body["detail"].as_str().unwrap().contains("model refused"));
    }

    #[tokio::test]
    async fn test_cancelled_query_is_503_and_retryable() {
        let pipeline = pipeline_with(
            Arc::new(CancelledOnOpen),
            Arc::new(Canned),
            Duration::from_secs(5),
        );
        let (status, body) = post_query(pipeline).await;

        assert_eq!(status, 503);
        assert_eq!(body["error"], "Cancelled");
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn test_frontend_served_with_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>dashboard</html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();

        let mut settings = Settings::default();
        settings.server.static_dir = Some(dir.path().to_string_lossy().into_owned());
        let base = spawn(AppState::new(pipeline(true), settings).with_env(all_env)).await;
        let client = reqwest::Client::new();
        let text = |path: &'static str| {
            let client = client.clone();
            let url = format!("{}{}", base, path);
            async move {
                let response = client.get(url).send().await.unwrap();
                (response.status(), response.text().await.unwrap())
            }
        };

        assert_eq!(text("/").await, (reqwest::StatusCode::OK, "<html>dashboard</html>".to_string()));
        assert_eq!(text("/app.js").await.1, "console.log(1)");
        assert_eq!(text("/static/app.js").await.1, "console.log(1)");
        assert_eq!(text("/campaigns/42").await, (reqwest::StatusCode::OK, "<html>dashboard</html>".to_string()));

        let (status, body) = text("/api/reports").await;
        assert_eq!(status, 404);
        assert!(body.contains("Not found"));

        let (status, body) = text("/health").await;
        assert_eq!(status, 200);
        assert!(body.contains("healthy"));

        let response = client
            .post(format!("{}/crewai", base))
            .json(&json!({"query": "seo"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_missing_static_dir_serves_api_root() {
        let mut settings = Settings::default();
        settings.server.static_dir = Some("/nonexistent/marketlens-frontend".to_string());
        let base = spawn(AppState::new(pipeline(true), settings).with_env(all_env)).await;

        let body: Value = reqwest::get(format!("{}/", base)).await.unwrap().json().await.unwrap();
        assert_eq!(body["health"], "/health");
    }
}
