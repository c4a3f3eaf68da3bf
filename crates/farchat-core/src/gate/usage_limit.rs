//! Authenticated Usage Limit
//!
//! Wraps the usage oracle with an optimistic local decrement so the UI can
//! react before the next authoritative check. Any doubt about usage (no
//! answer, failed call) resolves to "not allowed".

use std::sync::Arc;

use tokio::sync::watch;

use crate::usage::{UsageOracle, UsageSnapshot, UsageState};

struct Inner {
    oracle: Arc<dyn UsageOracle>,
    state: watch::Sender<UsageState>,
}

impl Inner {
    fn apply(&self, snapshot: Option<UsageSnapshot>) -> bool {
        match snapshot {
            Some(snapshot) => {
                let allowed = snapshot.is_allowed;
                self.state.send_replace(snapshot.into());
                allowed
            }
            None => {
                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.is_allowed = false;
                });
                false
            }
        }
    }
}

/// Usage limiter for signed-in users
pub struct UsageLimiter {
    inner: Arc<Inner>,
}

impl UsageLimiter {
    /// Create in the optimistic loading state without contacting the oracle
    pub fn new(oracle: Arc<dyn UsageOracle>) -> Self {
        let (state, _) = watch::channel(UsageState::default());
        Self {
            inner: Arc::new(Inner { oracle, state }),
        }
    }

    /// Create and run exactly one background usage check.
    ///
    /// Must be called within a tokio runtime.
    pub fn mount(oracle: Arc<dyn UsageOracle>) -> Self {
        let limiter = Self::new(oracle);

        let oracle = limiter.inner.oracle.clone();
        let weak = Arc::downgrade(&limiter.inner);
        tokio::spawn(async move {
            let snapshot = fetch(oracle.as_ref()).await;
            match weak.upgrade() {
                Some(inner) => {
                    inner.apply(snapshot);
                }
                None => tracing::debug!("Usage limiter dropped before usage check completed"),
            }
        });

        limiter
    }

    /// Ask the oracle and replace local state with its answer.
    ///
    /// Returns whether another query is allowed.
    pub async fn check_usage(&self) -> bool {
        let snapshot = fetch(self.inner.oracle.as_ref()).await;
        self.inner.apply(snapshot)
    }

    /// Optimistically count one query locally.
    ///
    /// Never contacts the oracle; call [`Self::check_usage`] for the
    /// authoritative count.
    pub fn record_usage(&self) {
        self.inner.state.send_modify(|state| {
            let before = state.remaining;
            state.remaining = before.decremented();
            state.is_allowed = before.more_than_one();
        });
    }

    pub fn usage_state(&self) -> UsageState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UsageState> {
        self.inner.state.subscribe()
    }
}

async fn fetch(oracle: &dyn UsageOracle) -> Option<UsageSnapshot> {
    match oracle.usage().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(error = %e, "Usage check failed, denying further queries");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FarchatError, Result};
    use crate::usage::{Remaining, Tier};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingOracle {
        answer: Option<UsageSnapshot>,
        calls: AtomicUsize,
    }

    impl CountingOracle {
        fn new(answer: Option<UsageSnapshot>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl UsageOracle for CountingOracle {
        async fn usage(&self) -> Result<Option<UsageSnapshot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl UsageOracle for FailingOracle {
        async fn usage(&self) -> Result<Option<UsageSnapshot>> {
            Err(FarchatError::Oracle("connection reset".into()))
        }
    }

    struct GatedOracle {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl UsageOracle for GatedOracle {
        async fn usage(&self) -> Result<Option<UsageSnapshot>> {
            self.gate.notified().await;
            Ok(Some(snapshot(10, true)))
        }
    }

    fn snapshot(remaining: u32, is_allowed: bool) -> UsageSnapshot {
        UsageSnapshot {
            is_allowed,
            remaining: Remaining::Limited(remaining),
            tier: Tier::Pro,
            limit: Some(500),
        }
    }

    #[tokio::test]
    async fn test_mount_checks_exactly_once() {
        let oracle = CountingOracle::new(Some(snapshot(3, true)));
        let limiter = UsageLimiter::mount(oracle.clone());

        let state = limiter
            .subscribe()
            .wait_for(|s| !s.is_loading)
            .await
            .unwrap()
            .clone();

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert!(state.is_allowed);
        assert_eq!(state.remaining, Remaining::Limited(3));
        assert_eq!(state.tier, Tier::Pro);
    }

    #[tokio::test]
    async fn test_check_replaces_state_and_returns_allowed() {
        let limiter = UsageLimiter::new(CountingOracle::new(Some(snapshot(0, false))));
        assert!(limiter.usage_state().is_loading);

        assert!(!limiter.check_usage().await);
        let state = limiter.usage_state();
        assert!(!state.is_allowed);
        assert!(!state.is_loading);
        assert_eq!(state.remaining, Remaining::Limited(0));
    }

    #[tokio::test]
    async fn test_record_usage_counts_down_to_denial() {
        let limiter = UsageLimiter::new(CountingOracle::new(Some(snapshot(3, true))));
        assert!(limiter.check_usage().await);

        let mut seen = Vec::new();
        for _ in 0..3 {
            limiter.record_usage();
            let state = limiter.usage_state();
            seen.push((state.remaining, state.is_allowed));
        }

        assert_eq!(
            seen,
            vec![
                (Remaining::Limited(2), true),
                (Remaining::Limited(1), true),
                (Remaining::Limited(0), false),
            ]
        );

        // Floors at zero
        limiter.record_usage();
        assert_eq!(limiter.usage_state().remaining, Remaining::Limited(0));
    }

    #[tokio::test]
    async fn test_record_usage_keeps_unbounded() {
        let limiter = UsageLimiter::new(CountingOracle::new(None));
        limiter.record_usage();
        let state = limiter.usage_state();
        assert_eq!(state.remaining, Remaining::Unbounded);
        assert!(state.is_allowed);
    }

    #[tokio::test]
    async fn test_absent_answer_fails_closed() {
        let limiter = UsageLimiter::new(CountingOracle::new(None));
        assert!(!limiter.check_usage().await);

        let state = limiter.usage_state();
        assert!(!state.is_allowed);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_oracle_error_fails_closed() {
        let limiter = UsageLimiter::new(Arc::new(FailingOracle));
        assert!(!limiter.check_usage().await);

        let state = limiter.usage_state();
        assert!(!state.is_allowed);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_record_does_not_call_oracle() {
        let oracle = CountingOracle::new(Some(snapshot(5, true)));
        let limiter = UsageLimiter::new(oracle.clone());
        limiter.check_usage().await;
        limiter.record_usage();
        limiter.record_usage();
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_limiter_ignores_late_answer() {
        let gate = Arc::new(Notify::new());
        let limiter = UsageLimiter::mount(Arc::new(GatedOracle { gate: gate.clone() }));
        let mut rx = limiter.subscribe();

        drop(limiter);
        gate.notify_one();
        tokio::task::yield_now().await;

        assert!(rx.changed().await.is_err());
        assert!(rx.borrow().is_loading);
    }
}
