//! # farchat-runtime
//!
//! HTTP integrations for FARchat.
//!
//! ## Clients
//!
//! - **`ChatClient`**: streams replies from the FARchat `/api/chat` endpoint
//! - **`UpstreamChat`**: OpenAI-compatible completions (DeepSeek or OpenRouter)
//! - **`SupabaseClient`**: auth lookups and PostgREST calls at browser, server or admin level
//! - **`Embedder`**: query embeddings through OpenRouter or OpenAI
//! - **`RegulationIndex`**: vector search and per-regulation counts over `document_chunks`
//! - **`HttpUsageOracle`**: daily usage over `/api/usage`
//! - **`Mailer`**: transactional email through Resend
//!
//! ## Usage
//!
//! ```rust,ignore
//! use farchat_runtime::ChatClient;
//!
//! let client = ChatClient::new("http://localhost:3000/api/chat");
//! let reply = client.ask(&[ChatMessage::user("What is FAR Part 15?")]).await?;
//! ```

pub mod chat;
pub mod decode;
pub mod documents;
pub mod embeddings;
pub mod mailer;
pub mod oracle;
pub mod supabase;
pub mod upstream;

#[cfg(test)]
mod test_support;

pub use chat::ChatClient;
pub use decode::{TextStream, Utf8Decoder};
pub use documents::{DocumentMatch, RegulationIndex, RegulationStat, RegulationStats};
pub use embeddings::{Embedder, EmbeddingConfig};
pub use mailer::{EmailRequest, Mailer};
pub use oracle::HttpUsageOracle;
pub use supabase::{ClientRole, SupabaseClient, SupabaseConfig, SupabaseIdentityProvider};
pub use upstream::{UpstreamChat, UpstreamConfig};

// Re-export core types for convenience
pub use farchat_core::{ChatMessage, FarchatError, Result, Role};
