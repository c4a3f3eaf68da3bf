//! Upstream LLM Provider
//!
//! OpenAI-compatible streaming chat completions against DeepSeek directly or
//! through OpenRouter.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt, future};
use serde::{Deserialize, Serialize};

use farchat_core::{ChatMessage, FarchatError, Result};

use crate::decode::TextStream;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_MODEL: &str = "deepseek-chat";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENROUTER_MODEL: &str = "deepseek/deepseek-chat";

/// Retrieval context used until vector search is wired in
pub const DEFAULT_CONTEXT: &str =
    "FAR 1.102 Statement of guiding principles for the Federal Acquisition System...";

const SYSTEM_PROMPT: &str = "You are FARchat, a professional federal contracting assistant. \
     Use the provided context to answer questions accurately and with citations. Context: ";

/// Upstream provider configuration
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,

    /// `HTTP-Referer` header (OpenRouter attribution)
    pub referer: Option<String>,

    /// `X-Title` header (OpenRouter attribution)
    pub title: Option<String>,
}

impl UpstreamConfig {
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEEPSEEK_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEEPSEEK_MODEL.into(),
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
            api_key: api_key.into(),
            model: OPENROUTER_MODEL.into(),
            referer: Some(site_url.into()),
            title: Some(site_name.into()),
        }
    }

    /// `DEEPSEEK_API_KEY` wins over `OPENROUTER_API_KEY`
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = var("DEEPSEEK_API_KEY") {
            return Ok(Self::deepseek(key));
        }

        if let Some(key) = var("OPENROUTER_API_KEY") {
            let site_url = var("SITE_URL").unwrap_or_else(|| "http://localhost:3000".into());
            let site_name = var("SITE_NAME").unwrap_or_else(|| "FARchat".into());
            return Ok(Self::openrouter(key, site_url, site_name));
        }

        Err(FarchatError::Config(
            "LLM API key (OpenRouter or DeepSeek) not configured".into(),
        ))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Mid-stream provider failure (OpenRouter reports these after a 200)
#[derive(Deserialize)]
struct ChunkError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match &self.code {
            Some(code) => write!(f, "upstream error {code}: {message}"),
            None => write!(f, "upstream error: {message}"),
        }
    }
}

/// Streaming chat completions client
#[derive(Clone, Debug)]
pub struct UpstreamChat {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamChat {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        UpstreamConfig::from_env().map(Self::new)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// System prompt carrying `context`, followed by the conversation
    pub fn build_messages(context: &str, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::system(format!("{SYSTEM_PROMPT}{context}")));
        all.extend_from_slice(messages);
        all
    }

    /// Stream the completion's text deltas
    pub async fn stream(&self, messages: &[ChatMessage], context: &str) -> Result<TextStream> {
        let messages = Self::build_messages(context, messages);
        let body = CompletionRequest {
            model: &self.config.model,
            messages: &messages,
            stream: true,
        };

        let mut request = self
            .http
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);

        if let Some(referer) = &self.config.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            request = request.header("X-Title", title);
        }

        tracing::debug!(model = %self.config.model, "Starting upstream completion");

        let response = request
            .send()
            .await
            .map_err(|e| FarchatError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Upstream completion failed");
            return Err(FarchatError::Provider(format!(
                "upstream returned {status}: {body}"
            )));
        }

        Ok(completion_deltas(response.bytes_stream()))
    }
}

/// What one `data:` payload means for the reply
enum Step {
    Text(String),
    Skip,
    Done,
    Fail(FarchatError),
}

fn classify(data: &str) -> Step {
    if data.trim() == "[DONE]" {
        return Step::Done;
    }

    let chunk = match serde_json::from_str::<CompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed completion chunk");
            return Step::Skip;
        }
    };

    if let Some(error) = chunk.error {
        tracing::error!(error = %error, "Upstream failed mid-stream");
        return Step::Fail(FarchatError::Provider(error.to_string()));
    }

    let mut choices = chunk.choices.into_iter();
    let Some(choice) = choices.next() else {
        return Step::Skip;
    };

    if choice.finish_reason.as_deref() == Some("error") {
        tracing::error!("Upstream finished with an error");
        return Step::Fail(FarchatError::Provider("upstream finished with an error".into()));
    }

    match choice.delta.content {
        Some(text) if !text.is_empty() => Step::Text(text),
        _ => Step::Skip,
    }
}

/// Text deltas from a raw completion byte stream.
///
/// Ends at `[DONE]`. A transport failure or an error event is yielded once
/// as `Err` and ends the stream.
pub fn completion_deltas<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let steps = bytes.eventsource().map(|event| match event {
        Ok(event) => classify(&event.data),
        Err(e) => Step::Fail(FarchatError::Provider(e.to_string())),
    });

    Box::pin(
        steps
            .scan(false, |failed, step| {
                let next = if *failed {
                    None
                } else {
                    match step {
                        Step::Text(text) => Some(Some(Ok(text))),
                        Step::Skip => Some(None),
                        Step::Done => None,
                        Step::Fail(e) => {
                            *failed = true;
                            Some(Some(Err(e)))
                        }
                    }
                };
                future::ready(next)
            })
            .filter_map(future::ready),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    fn byte_chunks(body: &str, split_at: usize) -> Vec<std::result::Result<Vec<u8>, String>> {
        let bytes = body.as_bytes();
        let (a, b) = bytes.split_at(split_at.min(bytes.len()));
        vec![Ok(a.to_vec()), Ok(b.to_vec())]
    }

    async fn collect(body: &str, split_at: usize) -> Vec<Result<String>> {
        completion_deltas(futures::stream::iter(byte_chunks(body, split_at)))
            .collect()
            .await
    }

    #[test]
    fn test_system_prompt_carries_context() {
        let messages = UpstreamChat::build_messages("FAR 15.404", &[ChatMessage::user("hi")]);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("You are FARchat"));
        assert!(messages[0].content.ends_with("Context: FAR 15.404"));
        assert_eq!(messages[1].content, "hi");
    }

    #[tokio::test]
    async fn test_deltas_stop_at_done() {
        let body = format!(
            "{}{}data: [DONE]\n\n{}",
            chunk("FAR "),
            chunk("Part 15"),
            chunk("ignored")
        );
        let text: Vec<String> = collect(&body, 17).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text.concat(), "FAR Part 15");
    }

    #[tokio::test]
    async fn test_split_multibyte_character_in_event() {
        let body = format!("{}data: [DONE]\n\n", chunk("\u{a7} 52.212"));
        // Split inside the two-byte section sign
        let at = body.find('\u{a7}').unwrap() + 1;
        let text: Vec<String> = collect(&body, at).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text.concat(), "\u{a7} 52.212");
    }

    #[tokio::test]
    async fn test_comments_and_role_chunks_are_skipped() {
        let body = format!(
            ": OPENROUTER PROCESSING\n\n\
             data: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n\
             data: not json\n\n{}data: [DONE]\n\n",
            chunk("ok")
        );
        let text: Vec<String> = collect(&body, 5).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text, vec!["ok".to_string()]);
    }

    #[tokio::test]
    async fn test_midstream_error_event_fails_the_stream() {
        let body = format!(
            "{}data: {}\n\n{}",
            chunk("FAR 15"),
            serde_json::json!({
                "error": {"code": 502, "message": "Provider returned error"},
                "choices": [{"delta": {"content": ""}, "finish_reason": "error"}]
            }),
            chunk("never")
        );

        let items = collect(&body, 10).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "FAR 15");
        match &items[1] {
            Err(FarchatError::Provider(msg)) => {
                assert!(msg.contains("502"), "{msg}");
                assert!(msg.contains("Provider returned error"), "{msg}");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_finish_reason_fails_the_stream() {
        let body = format!(
            "{}data: {}\n\n",
            chunk("partial"),
            serde_json::json!({"choices": [{"delta": {}, "finish_reason": "error"}]})
        );
        let items = collect(&body, 3).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(FarchatError::Provider(_))));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(chunk("a").into_bytes()),
            Err("connection reset".into()),
            Ok(chunk("b").into_bytes()),
        ];
        let items: Vec<Result<String>> = completion_deltas(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(FarchatError::Provider(_))));
    }

    #[test]
    fn test_completions_url() {
        let config = UpstreamConfig::openrouter("k", "https://farchat.app", "FARchat");
        assert_eq!(config.completions_url(), "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(config.referer.as_deref(), Some("https://farchat.app"));
        assert_eq!(
            UpstreamConfig::deepseek("k").completions_url(),
            "https://api.deepseek.com/chat/completions"
        );
    }
}
