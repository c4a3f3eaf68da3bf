//! Guest Query Limit
//!
//! Anonymous visitors get a fixed number of free queries, counted in
//! persistent client storage. Any signed-in identity lifts the limit.

use std::sync::Arc;

use tokio::sync::watch;

use crate::identity::{Identity, IdentityProvider};
use crate::storage::{GuestCounterStore, KeyValueStore};

/// Free anonymous queries before sign-in is required
pub const MAX_FREE_QUERIES: u32 = 5;

/// Observable guest-limit state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryLimitState {
    pub count: u32,
    pub remaining: u32,
    pub is_blocked: bool,
    pub identity: Option<Identity>,
    /// True until the identity provider has answered
    pub loading: bool,
}

impl QueryLimitState {
    fn new(count: u32, identity: Option<Identity>, loading: bool) -> Self {
        let mut state = Self {
            count,
            remaining: 0,
            is_blocked: false,
            identity,
            loading,
        };
        state.recompute();
        state
    }

    fn recompute(&mut self) {
        self.remaining = MAX_FREE_QUERIES.saturating_sub(self.count);
        self.is_blocked = self.identity.is_none() && self.count >= MAX_FREE_QUERIES;
    }
}

struct Inner {
    identity_provider: Arc<dyn IdentityProvider>,
    counter: GuestCounterStore,
    state: watch::Sender<QueryLimitState>,
}

impl Inner {
    fn apply(&self, identity: Option<Identity>, count: u32) {
        self.state.send_modify(|state| {
            state.identity = identity;
            state.count = count;
            state.loading = false;
            state.recompute();
        });
    }
}

/// Guest query limiter
pub struct QueryLimiter {
    inner: Arc<Inner>,
}

impl QueryLimiter {
    /// Create with the stored count loaded but identity unresolved
    pub fn new(identity_provider: Arc<dyn IdentityProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        let counter = GuestCounterStore::new(store);
        let (state, _) = watch::channel(QueryLimitState::new(counter.read(), None, true));

        Self {
            inner: Arc::new(Inner {
                identity_provider,
                counter,
                state,
            }),
        }
    }

    /// Create and start resolving the identity in the background.
    ///
    /// Must be called within a tokio runtime.
    pub fn mount(identity_provider: Arc<dyn IdentityProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        let limiter = Self::new(identity_provider, store);

        let provider = limiter.inner.identity_provider.clone();
        let weak = Arc::downgrade(&limiter.inner);
        tokio::spawn(async move {
            let identity = resolve_identity(provider.as_ref()).await;
            match weak.upgrade() {
                Some(inner) => {
                    let count = inner.counter.read();
                    inner.apply(identity, count);
                }
                None => tracing::debug!("Query limiter dropped before identity resolved"),
            }
        });

        limiter
    }

    /// Re-resolve identity and re-read the stored count, then recompute
    pub async fn refresh(&self) {
        let counter = self.inner.counter.clone();
        let (identity, count) = tokio::join!(
            resolve_identity(self.inner.identity_provider.as_ref()),
            async move { counter.read() },
        );
        self.inner.apply(identity, count);
    }

    /// Identity changed (sign-in or sign-out). Takes effect immediately.
    pub fn set_identity(&self, identity: Option<Identity>) {
        let count = self.inner.counter.read();
        self.inner.apply(identity, count);
    }

    /// Count one anonymous query. No-op while signed in.
    ///
    /// There is no cap: counts past the limit keep increasing.
    pub fn increment_query(&self) {
        let mut persisted = None;
        self.inner.state.send_if_modified(|state| {
            if state.identity.is_some() {
                return false;
            }
            state.count = state.count.saturating_add(1);
            state.recompute();
            persisted = Some(state.count);
            true
        });

        if let Some(count) = persisted {
            self.inner.counter.write(count);
            if count >= MAX_FREE_QUERIES {
                tracing::debug!(count, "Guest query limit reached");
            }
        }
    }

    pub fn state(&self) -> QueryLimitState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryLimitState> {
        self.inner.state.subscribe()
    }

    pub fn count(&self) -> u32 {
        self.inner.state.borrow().count
    }

    pub fn remaining(&self) -> u32 {
        self.inner.state.borrow().remaining
    }

    pub fn is_blocked(&self) -> bool {
        self.inner.state.borrow().is_blocked
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }
}

/// Provider failures fall back to the guest path
async fn resolve_identity(provider: &dyn IdentityProvider) -> Option<Identity> {
    match provider.current_identity().await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Identity lookup failed, applying guest limits");
            None
        }
    }
}
