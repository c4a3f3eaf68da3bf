//! Application State

use std::sync::Arc;

use async_trait::async_trait;

use farchat_accounts::{ContactRateLimiter, UsageLedger};
use farchat_core::{ChatMessage, Identity, Result};
use farchat_runtime::{
    DocumentMatch, Mailer, RegulationIndex, RegulationStats, SupabaseClient, TextStream,
    UpstreamChat,
};

/// Resolves a bearer token to the user it was issued for
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Option<Identity>>;
}

#[async_trait]
impl TokenVerifier for SupabaseClient {
    async fn verify(&self, token: &str) -> Result<Option<Identity>> {
        self.get_user(token).await
    }
}

/// Source of streamed assistant replies
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    async fn stream(&self, messages: &[ChatMessage], context: &str) -> Result<TextStream>;
}

#[async_trait]
impl ChatUpstream for UpstreamChat {
    async fn stream(&self, messages: &[ChatMessage], context: &str) -> Result<TextStream> {
        Self::stream(self, messages, context).await
    }
}

/// Ingested regulation documents
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<DocumentMatch>>;

    async fn stats(&self) -> Result<RegulationStats>;
}

#[async_trait]
impl DocumentIndex for RegulationIndex {
    async fn search(&self, query: &str) -> Result<Vec<DocumentMatch>> {
        Self::search(self, query).await
    }

    async fn stats(&self) -> Result<RegulationStats> {
        Self::stats(self).await
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Daily usage ledger for signed-in users
    pub ledger: Arc<dyn UsageLedger>,

    /// Auth token verification (None if Supabase is not configured)
    pub verifier: Option<Arc<dyn TokenVerifier>>,

    /// LLM upstream (None if no API key is configured)
    pub upstream: Option<Arc<dyn ChatUpstream>>,

    /// Regulation search and counts (None if Supabase is not configured)
    pub index: Option<Arc<dyn DocumentIndex>>,

    /// Per-client contact form throttle
    pub contact_limiter: Arc<ContactRateLimiter>,

    /// Transactional email (None if Resend is not configured)
    pub mailer: Option<Arc<Mailer>>,

    /// Where contact submissions are forwarded
    pub contact_inbox: Option<String>,
}
