//! Query Embeddings
//!
//! OpenAI-compatible `/embeddings` calls, through OpenRouter when its key is
//! present and OpenAI otherwise.

use serde::{Deserialize, Serialize};

use farchat_core::{FarchatError, Result};

use crate::upstream::OPENROUTER_BASE_URL;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIM: u32 = 1536;

/// Embedding provider configuration
#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,

    /// Requested vector size; only sent to OpenAI models
    pub dimensions: u32,

    pub referer: Option<String>,
    pub title: Option<String>,
}

impl EmbeddingConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: OPENAI_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIM,
            referer: None,
            title: None,
        }
    }

    pub fn openrouter(
        api_key: impl Into<String>,
        site_url: impl Into<String>,
        site_name: impl Into<String>,
    ) -> Self {
        Self {
            base_url: OPENROUTER_BASE_URL.into(),
            referer: Some(site_url.into()),
            title: Some(site_name.into()),
            ..Self::openai(api_key)
        }
    }

    /// `OPENROUTER_API_KEY` wins over `OPENAI_API_KEY`.
    ///
    /// `EMBEDDING_MODEL` and `EMBEDDING_DIM` override the defaults.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut config = if let Some(key) = var("OPENROUTER_API_KEY") {
            let site_url = var("SITE_URL").unwrap_or_else(|| "http://localhost:3000".into());
            let site_name = var("SITE_NAME").unwrap_or_else(|| "FARchat".into());
            Self::openrouter(key, site_url, site_name)
        } else if let Some(key) = var("OPENAI_API_KEY") {
            Self::openai(key)
        } else {
            return Err(FarchatError::Config(
                "LLM API key (OpenRouter or OpenAI) not configured for embeddings".into(),
            ));
        };

        if let Some(model) = var("EMBEDDING_MODEL") {
            config.model = model;
        }
        if let Some(dim) = var("EMBEDDING_DIM") {
            config.dimensions = dim
                .parse()
                .map_err(|_| FarchatError::Config(format!("EMBEDDING_DIM is not a number: {dim}")))?;
        }

        Ok(config)
    }

    fn sends_dimensions(&self) -> bool {
        self.model.to_lowercase().contains("openai")
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeds search queries
#[derive(Clone, Debug)]
pub struct Embedder {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl Embedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        EmbeddingConfig::from_env().map(Self::new)
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Embedding vector for `text`; newlines are flattened to spaces first
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = text.replace('\n', " ");
        let body = EmbeddingRequest {
            model: &self.config.model,
            input: &input,
            dimensions: self.config.sends_dimensions().then_some(self.config.dimensions),
        };

        let mut request = self
            .http
            .post(format!("{}/embeddings", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&body);

        if let Some(referer) = &self.config.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            request = request.header("X-Title", title);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FarchatError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Embedding request failed");
            return Err(FarchatError::Provider(format!("{status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| FarchatError::Provider(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| FarchatError::Provider("No valid embedding returned from API".into()))
    }
}
