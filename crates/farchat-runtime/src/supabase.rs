//! Supabase Auth Integration
//!
//! Client factories for the three Supabase access levels, an
//! [`IdentityProvider`] backed by the auth API, and the PostgREST calls the
//! regulation search runs on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use farchat_core::{FarchatError, Identity, IdentityProvider, Result, UserRole};

/// Supabase project configuration
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,

    /// Public anonymous key
    pub anon_key: String,

    /// Service-role key; server only
    pub service_role_key: Option<String>,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            service_role_key: None,
        }
    }

    pub fn with_service_role_key(mut self, key: impl Into<String>) -> Self {
        self.service_role_key = Some(key.into());
        self
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| FarchatError::Config("SUPABASE_URL not set".into()))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| FarchatError::Config("SUPABASE_ANON_KEY not set".into()))?;
        let service_role_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("SUPABASE_KEY"))
            .ok();

        Ok(Self {
            url,
            anon_key,
            service_role_key,
        })
    }
}

/// Access level a client was created with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientRole {
    /// Anon key acting for a signed-in user
    Browser,
    /// Anon key on the server
    Server,
    /// Service-role key, bypasses row-level security
    Admin,
}

#[derive(Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    role: Option<String>,
}

impl From<AuthUser> for Identity {
    fn from(user: AuthUser) -> Self {
        let role = match user.app_metadata.role.as_deref() {
            Some("admin") => UserRole::Admin,
            _ => UserRole::User,
        };

        Self {
            id: user.id,
            email: user.email,
            role,
            created_at: user.created_at,
            last_sign_in_at: user.last_sign_in_at,
        }
    }
}

/// PostgREST error body
#[derive(Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Minimal Supabase REST client
#[derive(Clone, Debug)]
pub struct SupabaseClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    access_token: Option<String>,
    role: ClientRole,
}

impl SupabaseClient {
    /// Client acting on behalf of the user holding `access_token`
    pub fn browser(config: &SupabaseConfig, access_token: Option<String>) -> Self {
        Self::build(config, config.anon_key.clone(), access_token, ClientRole::Browser)
    }

    /// Anonymous server-side client
    pub fn server(config: &SupabaseConfig) -> Self {
        Self::build(config, config.anon_key.clone(), None, ClientRole::Server)
    }

    /// Superuser client; fails without a service-role key
    pub fn admin(config: &SupabaseConfig) -> Result<Self> {
        let key = config.service_role_key.clone().ok_or_else(|| {
            FarchatError::Config("SUPABASE_SERVICE_ROLE_KEY not set".into())
        })?;
        Ok(Self::build(config, key, None, ClientRole::Admin))
    }

    fn build(
        config: &SupabaseConfig,
        api_key: String,
        access_token: Option<String>,
        role: ClientRole,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            api_key,
            access_token,
            role,
        }
    }

    pub const fn role(&self) -> ClientRole {
        self.role
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path.trim_start_matches('/'))
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.url, path.trim_start_matches('/'))
    }

    /// Bearer for PostgREST: the user's token when acting for one, else the key
    fn rest_bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }

    /// Call a Postgres function through `POST /rest/v1/rpc/{function}`
    pub async fn rpc<P, T>(&self, function: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(function, "Supabase rpc");

        let response = self
            .http
            .post(self.rest_url(&format!("rpc/{function}")))
            .header("apikey", &self.api_key)
            .bearer_auth(self.rest_bearer())
            .json(params)
            .send()
            .await
            .map_err(|e| FarchatError::Http(e.to_string()))?;

        Self::rest_body(response).await
    }

    /// Read rows through `GET /rest/v1/{table}?select={columns}`
    pub async fn select<T: DeserializeOwned>(&self, table: &str, columns: &str) -> Result<Vec<T>> {
        tracing::debug!(table, columns, "Supabase select");

        let response = self
            .http
            .get(self.rest_url(table))
            .query(&[("select", columns)])
            .header("apikey", &self.api_key)
            .bearer_auth(self.rest_bearer())
            .send()
            .await
            .map_err(|e| FarchatError::Http(e.to_string()))?;

        Self::rest_body(response).await
    }

    async fn rest_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| FarchatError::Database {
                code: None,
                message: e.to_string(),
            });
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<PostgrestError>(&text) {
            Ok(err) => (err.code, err.message.unwrap_or(text)),
            Err(_) => (None, format!("{status}: {text}")),
        };
        tracing::warn!(status = status.as_u16(), code = ?code, "Supabase request failed");
        Err(FarchatError::Database { code, message })
    }

    /// Resolve the user owning `access_token`.
    ///
    /// An expired or unknown token is `Ok(None)`.
    pub async fn get_user(&self, access_token: &str) -> Result<Option<Identity>> {
        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| FarchatError::Identity(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user: AuthUser = response
                    .json()
                    .await
                    .map_err(|e| FarchatError::Identity(e.to_string()))?;
                Ok(Some(user.into()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), "Supabase getUser failed");
                Err(FarchatError::Identity(format!("{status}: {body}")))
            }
        }
    }

    /// The user behind this client's own access token
    pub async fn current_user(&self) -> Result<Option<Identity>> {
        match &self.access_token {
            Some(token) => self.get_user(token).await,
            None => Ok(None),
        }
    }
}

/// Identity provider over a browser-level Supabase client
#[derive(Clone, Debug)]
pub struct SupabaseIdentityProvider {
    client: SupabaseClient,
}

impl SupabaseIdentityProvider {
    pub fn new(config: &SupabaseConfig, access_token: Option<String>) -> Self {
        Self {
            client: SupabaseClient::browser(config, access_token),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn current_identity(&self) -> Result<Option<Identity>> {
        self.client.current_user().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SupabaseConfig {
        SupabaseConfig::new("https://proj.supabase.co/", "anon")
    }

    #[test]
    fn test_client_roles() {
        let cfg = config();
        assert_eq!(SupabaseClient::server(&cfg).role(), ClientRole::Server);
        assert_eq!(
            SupabaseClient::browser(&cfg, Some("tok".into())).access_token(),
            Some("tok")
        );
        assert!(matches!(SupabaseClient::admin(&cfg), Err(FarchatError::Config(_))));

        let admin = SupabaseClient::admin(&cfg.with_service_role_key("service")).unwrap();
        assert_eq!(admin.role(), ClientRole::Admin);
    }

    #[test]
    fn test_auth_url_trims_slashes() {
        let client = SupabaseClient::server(&config());
        assert_eq!(client.auth_url("/user"), "https://proj.supabase.co/auth/v1/user");
    }

    #[test]
    fn test_auth_user_maps_to_identity() {
        let user: AuthUser = serde_json::from_value(serde_json::json!({
            "id": "u-1",
            "email": "co@agency.gov",
            "role": "authenticated",
            "created_at": "2025-01-02T03:04:05Z",
            "app_metadata": { "provider": "email", "role": "admin" }
        }))
        .unwrap();

        let identity = Identity::from(user);
        assert_eq!(identity.id, "u-1");
        assert!(identity.is_admin());
        assert!(identity.last_sign_in_at.is_none());
    }

    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode as AxumStatus, header},
        response::IntoResponse,
        routing::{get, post},
    };
    use serde_json::{Value, json};

    use crate::test_support::serve;

    fn bearer(headers: &HeaderMap) -> String {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default()
            .to_string()
    }

    async fn auth_user(headers: HeaderMap) -> axum::response::Response {
        if headers.get("apikey").is_none() {
            return (AxumStatus::BAD_REQUEST, "missing apikey").into_response();
        }
        match bearer(&headers).as_str() {
            "good" => Json(json!({
                "id": "u-7",
                "email": "buyer@agency.gov",
                "last_sign_in_at": "2025-06-01T12:00:00Z",
                "app_metadata": {}
            }))
            .into_response(),
            "expired" => (AxumStatus::UNAUTHORIZED, "expired").into_response(),
            "banned" => (AxumStatus::FORBIDDEN, "forbidden").into_response(),
            _ => (AxumStatus::INTERNAL_SERVER_ERROR, "auth down").into_response(),
        }
    }

    async fn project() -> SupabaseConfig {
        let app = Router::new()
            .route("/auth/v1/user", get(auth_user))
            .route(
                "/rest/v1/rpc/echo_count",
                post(|Json(params): Json<Value>| async move {
                    Json(json!([{ "n": params["n"] }]))
                }),
            )
            .route(
                "/rest/v1/rpc/missing_fn",
                post(|| async {
                    (
                        AxumStatus::NOT_FOUND,
                        Json(json!({
                            "code": "42883",
                            "message": "function missing_fn() does not exist"
                        })),
                    )
                }),
            )
            .route(
                "/rest/v1/document_chunks",
                get(|Query(q): Query<std::collections::HashMap<String, String>>| async move {
                    Json(json!([{ "selected": q.get("select") }]))
                }),
            );
        SupabaseConfig::new(serve(app).await, "anon")
    }

    #[tokio::test]
    async fn test_get_user_resolves_identity() {
        let client = SupabaseClient::server(&project().await);
        let identity = client.get_user("good").await.unwrap().unwrap();
        assert_eq!(identity.id, "u-7");
        assert_eq!(identity.email.as_deref(), Some("buyer@agency.gov"));
        assert!(!identity.is_admin());
        assert!(identity.last_sign_in_at.is_some());
    }

    #[tokio::test]
    async fn test_get_user_rejected_token_is_signed_out() {
        let client = SupabaseClient::server(&project().await);
        assert!(client.get_user("expired").await.unwrap().is_none());
        assert!(client.get_user("banned").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_user_server_error_is_identity_error() {
        let client = SupabaseClient::server(&project().await);
        match client.get_user("other").await {
            Err(FarchatError::Identity(msg)) => assert!(msg.contains("auth down"), "{msg}"),
            other => panic!("expected identity error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_provider_uses_its_own_token() {
        let provider = SupabaseIdentityProvider::new(&project().await, Some("good".into()));
        let identity = provider.current_identity().await.unwrap().unwrap();
        assert_eq!(identity.id, "u-7");
    }

    #[tokio::test]
    async fn test_rpc_round_trips_params() {
        let client = SupabaseClient::server(&project().await);
        let rows: Vec<Value> = client.rpc("echo_count", &json!({ "n": 3 })).await.unwrap();
        assert_eq!(rows, vec![json!({ "n": 3 })]);
    }

    #[tokio::test]
    async fn test_rpc_error_carries_postgres_code() {
        let client = SupabaseClient::server(&project().await);
        match client.rpc::<_, Value>("missing_fn", &json!({})).await {
            Err(FarchatError::Database { code, message }) => {
                assert_eq!(code.as_deref(), Some("42883"));
                assert!(message.contains("does not exist"));
            }
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_select_sends_columns() {
        let client = SupabaseClient::server(&project().await);
        let rows: Vec<Value> = client.select("document_chunks", "metadata").await.unwrap();
        assert_eq!(rows[0]["selected"], "metadata");
    }

    #[tokio::test]
    async fn test_provider_without_token_is_signed_out() {
        let provider = SupabaseIdentityProvider::new(&config(), None);
        assert!(provider.current_identity().await.unwrap().is_none());
    }
}
