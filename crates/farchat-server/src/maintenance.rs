//! Background Maintenance

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use farchat_accounts::{MemoryUsageLedger, today};

/// How often past days' usage counters are dropped
pub const LEDGER_PRUNE_EVERY: Duration = Duration::from_secs(60 * 60);

/// Periodically drop ledger counters for days before the current UTC day
pub fn spawn_ledger_pruning(ledger: Arc<MemoryUsageLedger>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match ledger.prune_before(today()) {
                Ok(0) => {}
                Ok(pruned) => tracing::info!(pruned, "Pruned past usage counters"),
                Err(e) => tracing::error!("Usage ledger prune failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Days;
    use farchat_accounts::UsageLedger;

    #[tokio::test]
    async fn test_pruning_drops_yesterday() {
        let ledger = Arc::new(MemoryUsageLedger::new());
        let yesterday = today() - Days::new(1);
        ledger.check_and_increment_on("u1", yesterday).unwrap();
        ledger.check_and_increment_on("u1", today()).unwrap();

        let handle = spawn_ledger_pruning(ledger.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(ledger.usage_on("u1", yesterday).unwrap(), 0);
        assert_eq!(ledger.usage_on("u1", today()).unwrap(), 1);
        // Nothing left to prune
        assert_eq!(ledger.prune_before(today()).unwrap(), 0);
    }
}
