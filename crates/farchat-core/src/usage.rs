//! Usage Oracle Port
//!
//! Types shared by the client-side usage hook and the server-side ledger:
//! subscription tiers, remaining-query counts and the oracle trait.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// Subscription tiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Pro,
    Unlimited,
    Enterprise,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Unlimited => "unlimited",
            Self::Enterprise => "enterprise",
        }
    }

    /// Lenient parse; anything unrecognised is the free tier
    pub fn from_name(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "basic" => Self::Basic,
            "pro" => Self::Pro,
            "unlimited" => Self::Unlimited,
            "enterprise" => Self::Enterprise,
            _ => Self::Free,
        }
    }

    /// Queries per UTC day; `None` means unbounded
    pub const fn daily_limit(self) -> Option<u32> {
        match self {
            Self::Free => Some(25),
            Self::Basic => Some(100),
            Self::Pro => Some(500),
            Self::Unlimited | Self::Enterprise => None,
        }
    }

    /// Display label for badges
    pub const fn label(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Basic => "Basic",
            Self::Pro => "Pro",
            Self::Unlimited => "Unlimited",
            Self::Enterprise => "Enterprise",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_name(&raw))
    }
}

/// Queries left. Serialized as a number, or `null` when unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum Remaining {
    Limited(u32),
    Unbounded,
}

impl Remaining {
    /// One fewer, floored at zero; unbounded stays unbounded
    #[must_use]
    pub const fn decremented(self) -> Self {
        match self {
            Self::Limited(n) => Self::Limited(n.saturating_sub(1)),
            Self::Unbounded => Self::Unbounded,
        }
    }

    /// Whether more than one query is left
    pub const fn more_than_one(self) -> bool {
        match self {
            Self::Limited(n) => n > 1,
            Self::Unbounded => true,
        }
    }

    pub const fn as_limited(self) -> Option<u32> {
        match self {
            Self::Limited(n) => Some(n),
            Self::Unbounded => None,
        }
    }
}

impl From<Option<u32>> for Remaining {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Self::Unbounded, Self::Limited)
    }
}

impl From<Remaining> for Option<u32> {
    fn from(value: Remaining) -> Self {
        value.as_limited()
    }
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unlimited"),
        }
    }
}

/// Authoritative usage answer for the signed-in user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub is_allowed: bool,
    pub remaining: Remaining,
    pub tier: Tier,
    /// Daily limit; `None` for unbounded tiers
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Remote usage check for the server-resolved identity
#[async_trait]
pub trait UsageOracle: Send + Sync {
    /// `Ok(None)` when usage cannot be determined (e.g. not signed in)
    async fn usage(&self) -> Result<Option<UsageSnapshot>>;
}

/// Client-side view of the signed-in user's usage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageState {
    pub is_allowed: bool,
    pub remaining: Remaining,
    pub tier: Tier,
    pub is_loading: bool,
}

impl Default for UsageState {
    /// Optimistic state shown before the first oracle answer
    fn default() -> Self {
        Self {
            is_allowed: true,
            remaining: Remaining::Unbounded,
            tier: Tier::Free,
            is_loading: true,
        }
    }
}

impl From<UsageSnapshot> for UsageState {
    fn from(snapshot: UsageSnapshot) -> Self {
        Self {
            is_allowed: snapshot.is_allowed,
            remaining: snapshot.remaining,
            tier: snapshot.tier,
            is_loading: false,
        }
    }
}
