//! Query Gating
//!
//! Exactly one path governs a request:
//!
//! ```text
//!            identity present?
//!              │          │
//!             no         yes
//!              │          │
//!   ┌──────────▼───┐  ┌───▼────────────┐
//!   │ QueryLimiter │  │  UsageLimiter  │
//!   │ guest counter│  │  usage oracle  │
//!   └──────────────┘  └────────────────┘
//! ```
//!
//! Both limiters publish their state through a `tokio::sync::watch` channel
//! so observers see every intermediate resolution. Background work holds
//! only a weak reference, so dropping a limiter silences late callbacks.

mod query_limit;
mod usage_limit;

pub use query_limit::{MAX_FREE_QUERIES, QueryLimitState, QueryLimiter};
pub use usage_limit::UsageLimiter;
