//! Usage Oracle over HTTP

use async_trait::async_trait;
use reqwest::StatusCode;

use farchat_core::{FarchatError, Result, UsageOracle, UsageSnapshot};

/// Queries `GET {base}/api/usage` with the caller's bearer token
#[derive(Clone, Debug)]
pub struct HttpUsageOracle {
    http: reqwest::Client,
    url: String,
    access_token: Option<String>,
}

impl HttpUsageOracle {
    pub fn new(base_url: &str, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}/api/usage", base_url.trim_end_matches('/')),
            access_token,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl UsageOracle for HttpUsageOracle {
    async fn usage(&self) -> Result<Option<UsageSnapshot>> {
        let Some(token) = &self.access_token else {
            return Ok(None);
        };

        let response = self
            .http
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FarchatError::Oracle(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<Option<UsageSnapshot>>()
                .await
                .map_err(|e| FarchatError::Oracle(e.to_string())),
            StatusCode::UNAUTHORIZED => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(FarchatError::Oracle(format!("{status}: {body}")))
            }
        }
    }
}
