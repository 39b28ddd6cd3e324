//! Background sweep of expired reservations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::ledger::InventoryLedger;

/// Default interval between sweep passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically releases Reserved holds past their TTL.
///
/// The sweep goes through the ledger's own per-SKU serialization, so it
/// never races a live checkout touching the same SKU.
pub struct ReservationSweeper<L: InventoryLedger> {
    ledger: Arc<L>,
    interval: Duration,
}

impl<L: InventoryLedger + 'static> ReservationSweeper<L> {
    /// Creates a sweeper with the default interval.
    pub fn new(ledger: Arc<L>) -> Self {
        Self::with_interval(ledger, DEFAULT_SWEEP_INTERVAL)
    }

    /// Creates a sweeper with a custom interval.
    pub fn with_interval(ledger: Arc<L>, interval: Duration) -> Self {
        Self { ledger, interval }
    }

    /// Runs a single sweep pass, returning how many holds were released.
    pub async fn sweep_once(&self) -> usize {
        let released = self.ledger.sweep_expired(Utc::now()).await;
        if !released.is_empty() {
            tracing::info!(count = released.len(), "swept expired reservations");
        }
        released.len()
    }

    /// Spawns the periodic sweep loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // First tick fires immediately; skip it so a fresh start
            // doesn't sweep before anything can have expired.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryInventoryLedger;
    use common::{ReservationId, Sku};

    #[tokio::test]
    async fn test_sweep_once_releases_expired() {
        let ledger = Arc::new(InMemoryInventoryLedger::with_ttl(Duration::ZERO));
        let sku = Sku::new("SKU-001");
        ledger.set_stock(sku.clone(), 5).await;
        ledger
            .reserve(sku.clone(), 5, ReservationId::new())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let sweeper = ReservationSweeper::new(ledger.clone());
        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(ledger.available(&sku).await, 5);
    }

    #[tokio::test]
    async fn test_sweep_once_is_a_noop_for_live_holds() {
        let ledger = Arc::new(InMemoryInventoryLedger::new());
        let sku = Sku::new("SKU-001");
        ledger.set_stock(sku.clone(), 5).await;
        ledger
            .reserve(sku.clone(), 2, ReservationId::new())
            .await
            .unwrap();

        let sweeper = ReservationSweeper::new(ledger.clone());
        assert_eq!(sweeper.sweep_once().await, 0);
        assert_eq!(ledger.available(&sku).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_sweeps_on_interval() {
        let ledger = Arc::new(InMemoryInventoryLedger::with_ttl(Duration::ZERO));
        let sku = Sku::new("SKU-001");
        ledger.set_stock(sku.clone(), 5).await;
        ledger
            .reserve(sku.clone(), 5, ReservationId::new())
            .await
            .unwrap();

        let handle =
            ReservationSweeper::with_interval(ledger.clone(), Duration::from_secs(1)).spawn();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ledger.available(&sku).await, 5);
        handle.abort();
    }
}
