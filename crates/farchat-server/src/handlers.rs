//! HTTP Handlers

use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use farchat_accounts::{AccountError, ContactSubmission, TimeLeft, today};
use farchat_core::{
    ChatRequest, Identity, UsageSnapshot,
    regulation::{catalog::REGULATIONS, citation_url, Regulation},
};
use farchat_runtime::{
    DocumentMatch, EmailRequest, RegulationStats, documents::MIN_QUERY_CHARS,
    upstream::DEFAULT_CONTEXT,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub upstream_configured: bool,
    pub auth_configured: bool,
    pub email_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    #[serde(flatten)]
    pub usage: UsageSnapshot,

    /// Countdown to the next UTC midnight, e.g. `03:12:09`
    pub resets_in: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CitationQuery {
    pub regulation: String,
    #[serde(default)]
    pub section: String,
}

#[derive(Debug, Serialize)]
pub struct CitationResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

/// Search results; failures still carry an (empty) `results` list
#[derive(Debug, Default, Serialize)]
pub struct SearchResponse {
    pub results: Vec<DocumentMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl SearchResponse {
    fn failed(status: StatusCode, error: impl Into<String>, code: &'static str) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                results: Vec::new(),
                error: Some(error.into()),
                code: Some(code),
            }),
        )
    }
}

#[derive(Serialize)]
pub struct CatalogResponse {
    pub regulations: &'static [Regulation],
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: &'static str,
    pub id: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Request helpers
// ============================================================================

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// First `x-forwarded-for` hop, then `x-real-ip`
fn client_ip(headers: &HeaderMap) -> String {
    let header_value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header_value("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .or_else(|| header_value("x-real-ip"))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn limiter_error(e: AccountError) -> ApiError {
    match e {
        AccountError::RateLimited => {
            api_error(StatusCode::TOO_MANY_REQUESTS, e.user_message(), "RATE_LIMITED")
        }
        _ => {
            tracing::error!("Contact limiter error: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "LIMITER_ERROR")
        }
    }
}

/// Signed-in user for this request; verification failures count as signed out
async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    let token = bearer_token(headers)?;
    let verifier = state.verifier.as_ref()?;

    match verifier.verify(token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("Token verification failed: {}", e);
            None
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        upstream_configured: state.upstream.is_some(),
        auth_configured: state.verifier.is_some(),
        email_configured: state.mailer.is_some(),
    })
}

/// Streaming chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if payload.latest_content().is_none() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "No message provided",
            "EMPTY_MESSAGE",
        ));
    }

    let upstream = state.upstream.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "LLM API key (OpenRouter or DeepSeek) not configured",
            "UPSTREAM_NOT_CONFIGURED",
        )
    })?;

    let charged_on = today();
    let identity = resolve_identity(&state, &headers).await;

    if let Some(identity) = &identity {
        let decision = state.ledger.check_and_increment_on(&identity.id, charged_on).map_err(|e| {
            tracing::error!("Usage ledger error: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "LEDGER_ERROR")
        })?;

        if !decision.allowed {
            tracing::info!(user_id = %identity.id, tier = %decision.tier, "Daily limit reached");
            return Err(api_error(
                StatusCode::TOO_MANY_REQUESTS,
                AccountError::LimitReached.user_message(),
                "LIMIT_REACHED",
            ));
        }

        tracing::debug!(user_id = %identity.id, remaining = %decision.remaining, "Query charged");
    }

    let stream = upstream
        .stream(&payload.messages, DEFAULT_CONTEXT)
        .await
        .map_err(|e| {
            tracing::error!("Chat API error: {}", e);
            // No answer was produced, so the query is not charged
            if let Some(identity) = &identity {
                if let Err(refund) = state.ledger.refund_on(&identity.id, charged_on) {
                    tracing::error!(user_id = %identity.id, "Usage refund failed: {}", refund);
                }
            }
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "UPSTREAM_ERROR")
        })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Daily usage for the signed-in caller
pub async fn usage_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UsageResponse>, ApiError> {
    let identity = resolve_identity(&state, &headers)
        .await
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Unauthorized", "UNAUTHORIZED"))?;

    let usage = state.ledger.usage_state(&identity.id).map_err(|e| {
        tracing::error!("Usage ledger error: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "LEDGER_ERROR")
    })?;

    Ok(Json(UsageResponse {
        usage,
        resets_in: TimeLeft::until_reset(chrono::Utc::now()).map(|left| left.to_string()),
    }))
}

/// Resolve a regulation citation to its acquisition.gov page
pub async fn citation_handler(
    Query(query): Query<CitationQuery>,
) -> Result<Json<CitationResponse>, ApiError> {
    citation_url(&query.regulation, &query.section)
        .map(|url| Json(CitationResponse { url }))
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Unknown regulation: {}", query.regulation),
                "UNKNOWN_REGULATION",
            )
        })
}

/// Static regulation catalog
pub async fn catalog_handler() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        regulations: REGULATIONS,
        total: REGULATIONS.len(),
    })
}

/// Ingested document counts per regulation
pub async fn regulations_handler(
    State(state): State<AppState>,
) -> Result<Json<RegulationStats>, ApiError> {
    let index = state.index.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Document index not configured",
            "INDEX_NOT_CONFIGURED",
        )
    })?;

    index.stats().await.map(Json).map_err(|e| {
        tracing::error!("Error fetching regulation stats: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch regulation stats",
            "STATS_ERROR",
        )
    })
}

/// Semantic search over regulation text; charged like a chat query
pub async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SearchRequest>,
) -> (StatusCode, Json<SearchResponse>) {
    let query = payload.query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return (StatusCode::OK, Json(SearchResponse::default()));
    }

    let Some(index) = state.index.as_ref() else {
        return SearchResponse::failed(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Document index not configured",
            "INDEX_NOT_CONFIGURED",
        );
    };

    let Some(identity) = resolve_identity(&state, &headers).await else {
        return SearchResponse::failed(StatusCode::UNAUTHORIZED, "Unauthorized", "UNAUTHORIZED");
    };

    let charged_on = today();
    match state.ledger.check_and_increment_on(&identity.id, charged_on) {
        Ok(decision) if decision.allowed => {}
        Ok(_) => {
            return SearchResponse::failed(
                StatusCode::TOO_MANY_REQUESTS,
                AccountError::LimitReached.user_message(),
                "LIMIT_REACHED",
            );
        }
        Err(e) => {
            tracing::error!("Usage ledger error: {}", e);
            return SearchResponse::failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.user_message(),
                "LEDGER_ERROR",
            );
        }
    }

    match index.search(query).await {
        Ok(results) => (
            StatusCode::OK,
            Json(SearchResponse {
                results,
                ..SearchResponse::default()
            }),
        ),
        Err(e) => {
            tracing::error!("Search error: {}", e);
            if let Err(refund) = state.ledger.refund_on(&identity.id, charged_on) {
                tracing::error!(user_id = %identity.id, "Usage refund failed: {}", refund);
            }
            SearchResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "SEARCH_ERROR")
        }
    }
}

/// Contact form intake
pub async fn contact_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ContactSubmission>,
) -> Result<Json<ContactResponse>, ApiError> {
    let ip = client_ip(&headers);

    state.contact_limiter.check(&ip).map_err(limiter_error)?;

    let receipt = payload.accept().map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, e.user_message(), "INVALID_SUBMISSION")
    })?;

    if let (Some(mailer), Some(inbox)) = (&state.mailer, &state.contact_inbox) {
        let email = EmailRequest::new(
            inbox.as_str(),
            format!("[Contact] {}", payload.subject),
            payload.to_html(),
        );
        if let Err(e) = mailer.send(&email).await {
            tracing::warn!(submission_id = %receipt.id, "Contact forward failed: {}", e);
        }
    }

    Ok(Json(ContactResponse {
        success: true,
        message: "Message sent successfully",
        id: receipt.id.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn test_search_failure_keeps_results_field() {
        let (status, Json(body)) =
            SearchResponse::failed(StatusCode::UNAUTHORIZED, "Unauthorized", "UNAUTHORIZED");
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["results"], serde_json::json!([]));
        assert_eq!(json["error"], "Unauthorized");

        let ok = serde_json::to_value(SearchResponse::default()).unwrap();
        assert!(ok.get("error").is_none());
    }

    #[test]
    fn test_limiter_error_codes() {
        let (status, Json(body)) = limiter_error(AccountError::RateLimited);
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.code, "RATE_LIMITED");

        let (status, Json(body)) = limiter_error(AccountError::Storage("lock poisoned".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "LIMITER_ERROR");
        assert_eq!(body.error, "An error occurred processing your request.");
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers), "10.0.0.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "203.0.113.5");
    }
}
