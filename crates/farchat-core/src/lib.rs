//! # farchat-core
//!
//! Client-side core of FARchat: deciding whether a visitor may ask another
//! question, and turning regulation citations into links.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           gate                               │
//! │  ┌──────────────┐                      ┌──────────────────┐  │
//! │  │ QueryLimiter │                      │   UsageLimiter   │  │
//! │  └──────┬───────┘                      └────────┬─────────┘  │
//! │         │                                       │            │
//! │  ┌──────▼────────┐ ┌───────────────────┐ ┌──────▼─────────┐  │
//! │  │ KeyValueStore │ │ IdentityProvider  │ │  UsageOracle   │  │
//! │  │    (port)     │ │      (port)       │ │    (port)      │  │
//! │  └───────────────┘ └───────────────────┘ └────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ports are traits so the gating logic runs against in-memory fakes in
//! tests and against real HTTP integrations (`farchat-runtime`) in the app.

pub mod error;
pub mod gate;
pub mod identity;
pub mod message;
pub mod regulation;
pub mod storage;
pub mod usage;

pub use error::{FarchatError, Result};
pub use gate::{MAX_FREE_QUERIES, QueryLimitState, QueryLimiter, UsageLimiter};
pub use identity::{Identity, IdentityProvider, UserRole};
pub use message::{ChatMessage, ChatRequest, Role};
pub use storage::{DismissalStore, GuestCounterStore, JsonFileStore, KeyValueStore, MemoryStore};
pub use usage::{Remaining, Tier, UsageOracle, UsageSnapshot, UsageState};
