//! # farchat-accounts
//!
//! Server-side account concerns for FARchat.
//!
//! ## Daily usage
//!
//! Every signed-in query is charged against the user's tier for the current
//! UTC day:
//!
//! ```text
//! ┌──────────┬─────────────┐
//! │  Tier    │ Queries/day │
//! ├──────────┼─────────────┤
//! │ free     │          25 │
//! │ basic    │         100 │
//! │ pro      │         500 │
//! │ unlimited│   unbounded │
//! │enterprise│   unbounded │
//! └──────────┴─────────────┘
//! ```
//!
//! The [`UsageLedger`] is the authority; [`LedgerOracle`] exposes it through
//! the `UsageOracle` port the client-side limiter consumes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use farchat_accounts::{MemoryUsageLedger, UsageLedger};
//!
//! let ledger = MemoryUsageLedger::new();
//! let decision = ledger.check_and_increment(&user.id)?;
//! if !decision.allowed {
//!     // 429: Daily limit reached.
//! }
//! ```

mod contact;
mod error;
mod ledger;
mod reset;

pub use contact::{ContactRateLimiter, ContactReceipt, ContactSubmission};
pub use error::{AccountError, Result};
pub use ledger::{LedgerOracle, MemoryUsageLedger, UsageDecision, UsageLedger, today};
pub use reset::{TimeLeft, next_reset};
