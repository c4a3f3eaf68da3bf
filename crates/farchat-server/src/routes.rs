//! Router

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{
    catalog_handler, chat_handler, citation_handler, contact_handler, health_check,
    regulations_handler, search_handler, usage_handler,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_check))

        // Chat
        .route("/api/chat", post(chat_handler))
        .route("/api/usage", get(usage_handler))

        // Regulations
        .route("/api/regulations", get(regulations_handler))
        .route("/api/regulations/catalog", get(catalog_handler))
        .route("/api/citations", get(citation_handler))
        .route("/api/search", post(search_handler))

        // Contact
        .route("/api/contact", post(contact_handler))

        .with_state(state)
}
