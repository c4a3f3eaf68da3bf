//! Send one question to a running FARchat server and print the streamed reply.
//!
//! Questions are gated the way the web client gates them: guests get a few
//! free questions counted in `FARCHAT_DATA_DIR`, signed-in users are checked
//! against the server's daily usage.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farchat_core::{
    ChatMessage, DismissalStore, FarchatError, IdentityProvider, JsonFileStore, KeyValueStore,
    MemoryStore, QueryLimiter, Remaining, UsageLimiter, identity::AnonymousIdentity,
};
use farchat_runtime::{
    ChatClient, HttpUsageOracle, SupabaseConfig, SupabaseIdentityProvider, chat::DEFAULT_CHAT_URL,
};

/// Smoke test for the streaming chat endpoint.
#[derive(Parser)]
#[command(name = "chat-probe")]
#[command(about = "Ask the FARchat chat endpoint a question", long_about = None)]
struct Cli {
    /// Question to send
    #[arg(default_value = "What is the purpose of the Federal Acquisition Regulation (FAR)?")]
    question: String,

    /// Chat endpoint URL
    #[arg(long, env = "FARCHAT_CHAT_URL", default_value = DEFAULT_CHAT_URL)]
    url: String,

    /// Supabase access token of a signed-in user
    #[arg(long, env = "FARCHAT_ACCESS_TOKEN")]
    token: Option<String>,

    /// Do not print the sign-in hint for guests
    #[arg(long)]
    no_hint: bool,
}

/// Server origin for a chat endpoint URL
fn server_base(chat_url: &str) -> &str {
    chat_url
        .trim_end_matches('/')
        .trim_end_matches("/api/chat")
}

/// Per-user daily usage limiter, or `None` for guests
async fn signed_in_limiter(cli: &Cli, guest_limit: &QueryLimiter) -> Option<UsageLimiter> {
    guest_limit.identity()?;
    let oracle = HttpUsageOracle::new(server_base(&cli.url), cli.token.clone());
    let limiter = UsageLimiter::new(Arc::new(oracle));
    limiter.check_usage().await;
    Some(limiter)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::from_env()?);
    let identity_provider: Arc<dyn IdentityProvider> =
        match (SupabaseConfig::from_env(), &cli.token) {
            (Ok(config), Some(token)) => {
                Arc::new(SupabaseIdentityProvider::new(&config, Some(token.clone())))
            }
            _ => Arc::new(AnonymousIdentity),
        };

    // One run is one session
    let hint = DismissalStore::new(Arc::new(MemoryStore::new()));
    if cli.no_hint {
        hint.dismiss();
    }

    let guest_limit = QueryLimiter::new(identity_provider, store);
    guest_limit.refresh().await;
    let usage_limit = signed_in_limiter(&cli, &guest_limit).await;

    match &usage_limit {
        Some(limiter) if !limiter.usage_state().is_allowed => {
            eprintln!("Daily limit reached. Upgrade your plan or try again after midnight UTC.");
            return Ok(());
        }
        None if guest_limit.is_blocked() => {
            eprintln!("You have used all free questions. Sign in to keep asking.");
            return Ok(());
        }
        _ => {}
    }

    let client = ChatClient::new(&cli.url);
    println!("Testing chat at {} ...", client.endpoint());

    let mut stream = match client.send(&[ChatMessage::user(&cli.question)]).await {
        Ok(stream) => stream,
        Err(FarchatError::Backend { status, body }) => {
            eprintln!("API Error ({status}): {body}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("--- Chat Response ---");
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        stdout.write_all(chunk?.as_bytes())?;
        stdout.flush()?;
    }
    println!("\n--- End of Response ---");

    match &usage_limit {
        Some(limiter) => {
            limiter.record_usage();
            if let Remaining::Limited(left) = limiter.usage_state().remaining {
                println!("{left} questions left today.");
            }
        }
        None => {
            guest_limit.increment_query();
            if !hint.is_dismissed() {
                println!(
                    "{} free questions left. Sign in to keep asking.",
                    guest_limit.remaining()
                );
            }
        }
    }

    Ok(())
}
