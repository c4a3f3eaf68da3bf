//! Usage Ledger
//!
//! Counts queries per user per UTC day and enforces each tier's daily limit.
//! This is the authority behind the client-side usage oracle.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use farchat_core::usage::{Remaining, Tier, UsageOracle, UsageSnapshot};
use farchat_core::FarchatError;

use crate::error::{AccountError, Result};

/// Outcome of charging one query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDecision {
    pub allowed: bool,
    pub remaining: Remaining,
    pub tier: Tier,
    pub limit: Option<u32>,
}

/// Current UTC calendar day
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Read-only view for a user who has used `count` queries today
fn snapshot(tier: Tier, count: u32) -> UsageSnapshot {
    let limit = tier.daily_limit();
    match limit {
        Some(limit) => UsageSnapshot {
            is_allowed: count < limit,
            remaining: Remaining::Limited(limit.saturating_sub(count)),
            tier,
            limit: Some(limit),
        },
        None => UsageSnapshot {
            is_allowed: true,
            remaining: Remaining::Unbounded,
            tier,
            limit: None,
        },
    }
}

/// Decision for charging one more query; `Some(new_count)` when charged
fn charge(tier: Tier, count: u32) -> (UsageDecision, Option<u32>) {
    let limit = tier.daily_limit();
    match limit {
        Some(limit) if count >= limit => (
            UsageDecision {
                allowed: false,
                remaining: Remaining::Limited(0),
                tier,
                limit: Some(limit),
            },
            None,
        ),
        Some(limit) => {
            let next = count + 1;
            (
                UsageDecision {
                    allowed: true,
                    remaining: Remaining::Limited(limit - next),
                    tier,
                    limit: Some(limit),
                },
                Some(next),
            )
        }
        None => (
            UsageDecision {
                allowed: true,
                remaining: Remaining::Unbounded,
                tier,
                limit: None,
            },
            Some(count.saturating_add(1)),
        ),
    }
}

/// Usage storage trait
pub trait UsageLedger: Send + Sync {
    /// Subscription tier; users without a profile are on the free tier
    fn tier_of(&self, user_id: &str) -> Result<Tier>;

    fn set_tier(&self, user_id: &str, tier: Tier) -> Result<()>;

    /// Queries charged to `user_id` on `date`
    fn usage_on(&self, user_id: &str, date: NaiveDate) -> Result<u32>;

    /// Usage view for `date` without charging anything
    fn usage_state_on(&self, user_id: &str, date: NaiveDate) -> Result<UsageSnapshot>;

    /// Check the limit and charge one query on `date` (atomic check + increment)
    fn check_and_increment_on(&self, user_id: &str, date: NaiveDate) -> Result<UsageDecision>;

    /// Return one query charged on `date`, e.g. when the answer never started
    fn refund_on(&self, user_id: &str, date: NaiveDate) -> Result<()>;

    fn usage_state(&self, user_id: &str) -> Result<UsageSnapshot> {
        self.usage_state_on(user_id, today())
    }

    fn check_and_increment(&self, user_id: &str) -> Result<UsageDecision> {
        self.check_and_increment_on(user_id, today())
    }
}

/// In-memory usage ledger (for development)
#[derive(Default)]
pub struct MemoryUsageLedger {
    tiers: RwLock<HashMap<String, Tier>>,
    counts: RwLock<HashMap<(String, NaiveDate), u32>>,
}

impl MemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters for days before `date`
    pub fn prune_before(&self, date: NaiveDate) -> Result<usize> {
        let mut counts = self.counts.write().map_err(poisoned)?;
        let before = counts.len();
        counts.retain(|(_, day), _| *day >= date);
        Ok(before - counts.len())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> AccountError {
    AccountError::Storage("usage ledger lock poisoned".into())
}

impl UsageLedger for MemoryUsageLedger {
    fn tier_of(&self, user_id: &str) -> Result<Tier> {
        let tiers = self.tiers.read().map_err(poisoned)?;
        Ok(tiers.get(user_id).copied().unwrap_or_default())
    }

    fn set_tier(&self, user_id: &str, tier: Tier) -> Result<()> {
        let mut tiers = self.tiers.write().map_err(poisoned)?;
        tiers.insert(user_id.to_string(), tier);
        tracing::info!(user_id = %user_id, tier = %tier, "Updated subscription tier");
        Ok(())
    }

    fn usage_on(&self, user_id: &str, date: NaiveDate) -> Result<u32> {
        let counts = self.counts.read().map_err(poisoned)?;
        Ok(counts
            .get(&(user_id.to_string(), date))
            .copied()
            .unwrap_or(0))
    }

    fn usage_state_on(&self, user_id: &str, date: NaiveDate) -> Result<UsageSnapshot> {
        let tier = self.tier_of(user_id)?;
        let count = self.usage_on(user_id, date)?;
        Ok(snapshot(tier, count))
    }

    fn check_and_increment_on(&self, user_id: &str, date: NaiveDate) -> Result<UsageDecision> {
        let tier = self.tier_of(user_id)?;
        let mut counts = self.counts.write().map_err(poisoned)?;

        let entry = counts.entry((user_id.to_string(), date)).or_insert(0);
        let (decision, charged) = charge(tier, *entry);

        match charged {
            Some(next) => *entry = next,
            None => tracing::info!(user_id = %user_id, tier = %tier, "Daily query limit reached"),
        }

        Ok(decision)
    }

    fn refund_on(&self, user_id: &str, date: NaiveDate) -> Result<()> {
        let mut counts = self.counts.write().map_err(poisoned)?;
        let key = (user_id.to_string(), date);

        match counts.get(&key).copied() {
            Some(0 | 1) => {
                counts.remove(&key);
            }
            Some(count) => {
                counts.insert(key, count - 1);
            }
            None => return Ok(()),
        }

        tracing::debug!(user_id = %user_id, %date, "Refunded query");
        Ok(())
    }
}

/// Usage oracle answering from a ledger for one (optional) user
pub struct LedgerOracle<L: UsageLedger> {
    ledger: Arc<L>,
    user_id: Option<String>,
}

impl<L: UsageLedger> LedgerOracle<L> {
    pub fn new(ledger: Arc<L>, user_id: Option<String>) -> Self {
        Self { ledger, user_id }
    }
}

#[async_trait]
impl<L: UsageLedger> UsageOracle for LedgerOracle<L> {
    async fn usage(&self) -> farchat_core::Result<Option<UsageSnapshot>> {
        let Some(user_id) = self.user_id.as_deref() else {
            return Ok(None);
        };

        self.ledger
            .usage_state(user_id)
            .map(Some)
            .map_err(|e| FarchatError::Oracle(e.to_string()))
    }
}
