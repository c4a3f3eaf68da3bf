//! FARchat HTTP Server
//!
//! Axum server for the streaming chat endpoint, daily usage, regulation
//! search and citations, and the contact form.

mod handlers;
mod maintenance;
mod routes;
mod state;

use std::sync::Arc;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farchat_accounts::{ContactRateLimiter, MemoryUsageLedger};
use farchat_runtime::{
    Embedder, Mailer, RegulationIndex, SupabaseClient, SupabaseConfig, UpstreamChat,
};

use crate::state::{AppState, ChatUpstream, DocumentIndex, TokenVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // LLM upstream
    let upstream: Option<Arc<dyn ChatUpstream>> = match UpstreamChat::from_env() {
        Ok(upstream) => {
            tracing::info!("✓ LLM upstream configured (model: {})", upstream.model());
            Some(Arc::new(upstream))
        }
        Err(e) => {
            tracing::warn!("⚠ {} - /api/chat will return 500", e);
            tracing::warn!("  Set DEEPSEEK_API_KEY or OPENROUTER_API_KEY in .env");
            None
        }
    };

    // Auth and document index
    let (verifier, index): (Option<Arc<dyn TokenVerifier>>, Option<Arc<dyn DocumentIndex>>) =
        match SupabaseConfig::from_env() {
            Ok(config) => {
                tracing::info!("✓ Supabase auth configured");
                let client = SupabaseClient::server(&config);

                let embedder = match Embedder::from_env() {
                    Ok(embedder) => {
                        tracing::info!("✓ Embeddings configured (model: {})", embedder.config().model);
                        Some(embedder)
                    }
                    Err(e) => {
                        tracing::warn!("⚠ {} - /api/search will return 500", e);
                        None
                    }
                };

                let verifier: Arc<dyn TokenVerifier> = Arc::new(client.clone());
                let index: Arc<dyn DocumentIndex> =
                    Arc::new(RegulationIndex::new(client, embedder));
                (Some(verifier), Some(index))
            }
            Err(e) => {
                tracing::warn!("⚠ {} - all callers treated as guests, no document index", e);
                (None, None)
            }
        };

    // Email
    let mailer = Mailer::from_env().ok().map(Arc::new);
    let contact_inbox = std::env::var("CONTACT_INBOX").ok();
    if mailer.is_some() && contact_inbox.is_some() {
        tracing::info!("✓ Contact submissions forwarded by email");
    }

    // Usage ledger, pruned of past days in the background
    let ledger = Arc::new(MemoryUsageLedger::new());
    maintenance::spawn_ledger_pruning(ledger.clone(), maintenance::LEDGER_PRUNE_EVERY);

    // Build application state
    let state = AppState {
        ledger,
        verifier,
        upstream,
        index,
        contact_limiter: Arc::new(ContactRateLimiter::default()),
        mailer,
        contact_inbox,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 FARchat server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  POST /api/chat         - Streaming chat");
    tracing::info!("  GET  /api/usage        - Daily usage");
    tracing::info!("  GET  /api/regulations  - Document counts per regulation");
    tracing::info!("  GET  /api/regulations/catalog - Regulation catalog");
    tracing::info!("  GET  /api/citations    - Citation URL lookup");
    tracing::info!("  POST /api/search       - Regulation search");
    tracing::info!("  POST /api/contact      - Contact form");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
