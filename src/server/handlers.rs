//! HTTP handlers and response bodies.

use super::validation::validate_query;
use super::AppState;
use crate::agent::AgentKind;
use crate::error::{FailureKind, MarketlensError};
use crate::pipeline::QueryOutcome;
use crate::report::{Report, ReportSection};
use crate::routing::Query;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Variables the service cannot answer queries without.
pub const REQUIRED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "NEO4J_URI",
    "NEO4J_USERNAME",
    "NEO4J_PASSWORD",
];

// === Request/Response Types ===

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct QueryResponse {
    status: &'static str,
    request_id: String,
    agent: AgentKind,
    report: Report,
    sections: Vec<ReportSection>,
    tool_calls: usize,
    elapsed_ms: u64,
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            status: "success",
            request_id: outcome.request_id.to_string(),
            agent: outcome.agent,
            sections: outcome.report.sections().to_vec(),
            report: outcome.report,
            tool_calls: outcome.tool_calls,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp: String,
    environment: String,
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    error: String,
    detail: String,
    retryable: bool,
    timestamp: String,
}

/// A failed request, rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    detail: String,
    retryable: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &str, detail: impl Into<String>) -> Self {
        Self {
            status,
            error: error.to_string(),
            detail: detail.into(),
            retryable: false,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Invalid or missing API key",
        )
    }
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::ToolUnavailable | FailureKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::AgentExecutionTimeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::AgentExecutionError | FailureKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<MarketlensError> for ApiError {
    fn from(e: MarketlensError) -> Self {
        let kind = e.kind();
        Self {
            status: status_for(kind),
            error: kind.to_string(),
            detail: e.to_string(),
            retryable: kind.is_retryable(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            FailureKind::InvalidInput.as_str(),
            rejection.body_text(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            error: self.error,
            detail: self.detail,
            retryable: self.retryable,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (self.status, Json(body)).into_response()
    }
}

// === Handlers ===

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Marketlens marketing analytics API",
        "docs": "/",
        "health": "/health",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Unknown `/api/...` paths, kept out of the frontend fallback.
pub async fn api_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found", "No such API route")
}

/// Names of required variables the lookup cannot find (or finds empty).
pub fn missing_env_vars(lookup: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|&name| lookup(name).map_or(true, |v| v.trim().is_empty()))
        .collect()
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let missing = missing_env_vars(state.env.as_ref());
    if !missing.is_empty() {
        warn!("Health check failed, missing environment variables: {:?}", missing);
        return ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Unavailable",
            format!(
                "Service unavailable - missing environment variables: {}",
                missing.join(", ")
            ),
        )
        .into_response();
    }

    Json(HealthResponse {
        status: "healthy",
        message: "Server is running and ready to process marketing analytics queries",
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state.settings.general.environment.clone(),
    })
    .into_response()
}

/// Answer a marketing analytics query.
pub async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload?;
    let text = validate_query(&request.query, state.settings.security.max_query_length)?;

    let outcome = state.pipeline.run(&Query::new(text)).await?;
    Ok(Json(outcome.into()))
}
