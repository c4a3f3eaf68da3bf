//! Chat Backend Client
//!
//! Posts a conversation to the FARchat `/api/chat` endpoint and exposes the
//! reply as a stream of text chunks.

use futures::StreamExt;

use farchat_core::{ChatMessage, ChatRequest, FarchatError, Result};

use crate::decode::{TextStream, decode_utf8};

/// Default endpoint for a locally running server
pub const DEFAULT_CHAT_URL: &str = "http://localhost:3000/api/chat";

/// Client for the streaming chat endpoint
#[derive(Clone, Debug)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_URL)
    }
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Share an existing connection pool
    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the conversation and stream the reply.
    ///
    /// A non-2xx response yields [`FarchatError::Backend`] with the response
    /// body and is not retried.
    pub async fn send(&self, messages: &[ChatMessage]) -> Result<TextStream> {
        let request = ChatRequest::new(messages.to_vec());

        tracing::debug!(endpoint = %self.endpoint, messages = messages.len(), "Sending chat request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| FarchatError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Chat backend rejected request");
            return Err(FarchatError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_utf8(response.bytes_stream()))
    }

    /// Send the conversation and collect the full reply
    pub async fn ask(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut stream = self.send(messages).await?;
        let mut reply = String::new();

        while let Some(chunk) = stream.next().await {
            reply.push_str(&chunk?);
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{Json, Router, http::StatusCode, routing::post};

    use crate::test_support::serve;

    #[test]
    fn test_default_endpoint() {
        assert_eq!(ChatClient::default().endpoint(), DEFAULT_CHAT_URL);
    }

    async fn chat_backend() -> String {
        let app = Router::new()
            .route(
                "/api/chat",
                post(|Json(request): Json<ChatRequest>| async move {
                    let question = request.latest_content().unwrap_or_default().to_string();
                    format!("You asked: {question}")
                }),
            )
            .route(
                "/api/broken",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
            );
        serve(app).await
    }

    #[tokio::test]
    async fn test_ask_collects_streamed_reply() {
        let base = chat_backend().await;
        let client = ChatClient::new(format!("{base}/api/chat"));

        let reply = client.ask(&[ChatMessage::user("What is FAR 15.404?")]).await.unwrap();
        assert_eq!(reply, "You asked: What is FAR 15.404?");
    }

    #[tokio::test]
    async fn test_non_success_status_is_backend_error() {
        let base = chat_backend().await;
        let client = ChatClient::new(format!("{base}/api/broken"));

        match client.send(&[ChatMessage::user("hi")]).await {
            Err(FarchatError::Backend { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            Err(other) => panic!("expected backend error, got {other:?}"),
            Ok(_) => panic!("expected backend error, got a stream"),
        }
    }
}
