//! Inventory ledger trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ReservationId, Sku};

use crate::error::InventoryError;
use crate::reservation::{Reservation, ReservationStatus};

/// Default time a Reserved hold stays live before the sweep reclaims it.
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(600);

/// Trait for inventory ledger operations.
///
/// Implementations must serialize the availability check and reservation
/// write per SKU, so that two concurrent reserves can never jointly exceed
/// the available count.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Places a hold of `quantity` units against `sku`.
    ///
    /// Idempotent on `reservation_id`: a repeat call returns the existing
    /// reservation unchanged and never double-decrements availability.
    async fn reserve(
        &self,
        sku: Sku,
        quantity: u32,
        reservation_id: ReservationId,
    ) -> Result<Reservation, InventoryError>;

    /// Converts a Reserved hold into a stock decrement.
    ///
    /// Terminal and not reversible by the ledger. Committing an
    /// already-Committed reservation is a no-op success, so a retry after
    /// an ambiguous timeout converges; committing a Released reservation
    /// fails with [`InventoryError::AlreadyTerminal`].
    async fn commit(&self, reservation_id: ReservationId) -> Result<(), InventoryError>;

    /// Returns a hold to the available pool.
    ///
    /// Never fails: releasing a missing, already-Released or Committed
    /// reservation is a no-op. Compensation paths depend on this.
    async fn release(&self, reservation_id: ReservationId) -> Result<(), InventoryError>;

    /// Looks up a reservation by ID.
    async fn get_reservation(&self, reservation_id: ReservationId) -> Option<Reservation>;

    /// Units available to reserve right now (on-hand minus live holds).
    async fn available(&self, sku: &Sku) -> u32;

    /// Total owned units, including those under live holds.
    async fn on_hand(&self, sku: &Sku) -> u32;

    /// Sets the owned stock level for a SKU.
    async fn set_stock(&self, sku: Sku, quantity: u32);

    /// Releases every Reserved hold past its TTL, returning the released IDs.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<ReservationId>;
}

/// Per-SKU ledger entry. One mutex per shelf is the serialization point
/// for every availability check and write touching that SKU.
#[derive(Debug, Default)]
struct SkuShelf {
    on_hand: u32,
    reservations: HashMap<ReservationId, Reservation>,
}

impl SkuShelf {
    fn available(&self, now: DateTime<Utc>) -> u32 {
        let held: u32 = self
            .reservations
            .values()
            .filter(|r| r.status.holds_stock() && !r.is_expired(now))
            .map(|r| r.quantity)
            .sum();
        self.on_hand.saturating_sub(held)
    }
}

/// In-memory inventory ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryLedger {
    shelves: Arc<RwLock<HashMap<Sku, Arc<Mutex<SkuShelf>>>>>,
    /// Reservation → SKU index so commit/release can find the right shelf.
    index: Arc<RwLock<HashMap<ReservationId, Sku>>>,
    ttl: Duration,
}

impl InMemoryInventoryLedger {
    /// Creates a ledger with the default reservation TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_RESERVATION_TTL)
    }

    /// Creates a ledger with a custom reservation TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            shelves: Arc::new(RwLock::new(HashMap::new())),
            index: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    fn shelf(&self, sku: &Sku) -> Option<Arc<Mutex<SkuShelf>>> {
        self.shelves.read().unwrap().get(sku).cloned()
    }

    fn shelf_or_create(&self, sku: &Sku) -> Arc<Mutex<SkuShelf>> {
        if let Some(shelf) = self.shelf(sku) {
            return shelf;
        }
        let mut shelves = self.shelves.write().unwrap();
        shelves.entry(sku.clone()).or_default().clone()
    }

    fn shelf_for_reservation(&self, reservation_id: ReservationId) -> Option<Arc<Mutex<SkuShelf>>> {
        let sku = self.index.read().unwrap().get(&reservation_id).cloned()?;
        self.shelf(&sku)
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventoryLedger {
    async fn reserve(
        &self,
        sku: Sku,
        quantity: u32,
        reservation_id: ReservationId,
    ) -> Result<Reservation, InventoryError> {
        let shelf = self.shelf_or_create(&sku);
        let mut shelf = shelf.lock().unwrap();
        let now = Utc::now();

        // Idempotent replay: same key, same reservation, no second hold.
        if let Some(existing) = shelf.reservations.get(&reservation_id) {
            return Ok(existing.clone());
        }

        let available = shelf.available(now);
        if available < quantity {
            metrics::counter!("inventory_oversell_rejections_total").increment(1);
            return Err(InventoryError::InsufficientStock {
                sku,
                requested: quantity,
                available,
            });
        }

        let reservation = Reservation {
            id: reservation_id,
            sku: sku.clone(),
            quantity,
            status: ReservationStatus::Reserved,
            created_at: now,
            expires_at: now + self.ttl,
        };
        shelf.reservations.insert(reservation_id, reservation.clone());
        drop(shelf);

        self.index.write().unwrap().insert(reservation_id, sku);
        metrics::counter!("inventory_reservations_total").increment(1);
        tracing::debug!(%reservation_id, sku = %reservation.sku, quantity, "reserved stock");

        Ok(reservation)
    }

    async fn commit(&self, reservation_id: ReservationId) -> Result<(), InventoryError> {
        let shelf = self
            .shelf_for_reservation(reservation_id)
            .ok_or(InventoryError::NotFound(reservation_id))?;
        let mut shelf = shelf.lock().unwrap();
        let now = Utc::now();

        let reservation = shelf
            .reservations
            .get_mut(&reservation_id)
            .ok_or(InventoryError::NotFound(reservation_id))?;

        match reservation.status {
            ReservationStatus::Reserved if reservation.is_expired(now) => {
                // An expired hold is as good as Released even before the
                // sweep runs; committing it could oversell.
                reservation.status = ReservationStatus::Released;
                Err(InventoryError::AlreadyTerminal {
                    reservation_id,
                    status: ReservationStatus::Released,
                })
            }
            ReservationStatus::Reserved => {
                let quantity = reservation.quantity;
                reservation.status = ReservationStatus::Committed;
                shelf.on_hand = shelf.on_hand.saturating_sub(quantity);
                tracing::debug!(%reservation_id, quantity, "committed reservation");
                Ok(())
            }
            // Idempotent commit retry.
            ReservationStatus::Committed => Ok(()),
            ReservationStatus::Released => Err(InventoryError::AlreadyTerminal {
                reservation_id,
                status: ReservationStatus::Released,
            }),
        }
    }

    async fn release(&self, reservation_id: ReservationId) -> Result<(), InventoryError> {
        let Some(shelf) = self.shelf_for_reservation(reservation_id) else {
            return Ok(());
        };
        let mut shelf = shelf.lock().unwrap();

        if let Some(reservation) = shelf.reservations.get_mut(&reservation_id)
            && reservation.status == ReservationStatus::Reserved
        {
            reservation.status = ReservationStatus::Released;
            tracing::debug!(%reservation_id, "released reservation");
        }
        Ok(())
    }

    async fn get_reservation(&self, reservation_id: ReservationId) -> Option<Reservation> {
        let shelf = self.shelf_for_reservation(reservation_id)?;
        let shelf = shelf.lock().unwrap();
        shelf.reservations.get(&reservation_id).cloned()
    }

    async fn available(&self, sku: &Sku) -> u32 {
        match self.shelf(sku) {
            Some(shelf) => shelf.lock().unwrap().available(Utc::now()),
            None => 0,
        }
    }

    async fn on_hand(&self, sku: &Sku) -> u32 {
        match self.shelf(sku) {
            Some(shelf) => shelf.lock().unwrap().on_hand,
            None => 0,
        }
    }

    async fn set_stock(&self, sku: Sku, quantity: u32) {
        let shelf = self.shelf_or_create(&sku);
        shelf.lock().unwrap().on_hand = quantity;
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<ReservationId> {
        let shelves: Vec<Arc<Mutex<SkuShelf>>> =
            self.shelves.read().unwrap().values().cloned().collect();

        let mut released = Vec::new();
        for shelf in shelves {
            let mut shelf = shelf.lock().unwrap();
            for reservation in shelf.reservations.values_mut() {
                if reservation.is_expired(now) {
                    reservation.status = ReservationStatus::Released;
                    released.push(reservation.id);
                }
            }
        }

        if !released.is_empty() {
            metrics::counter!("reservations_swept_total").increment(released.len() as u64);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku() -> Sku {
        Sku::new("SKU-001")
    }

    async fn ledger_with_stock(quantity: u32) -> InMemoryInventoryLedger {
        let ledger = InMemoryInventoryLedger::new();
        ledger.set_stock(sku(), quantity).await;
        ledger
    }

    #[tokio::test]
    async fn test_reserve_decrements_available_not_on_hand() {
        let ledger = ledger_with_stock(10).await;

        let reservation = ledger.reserve(sku(), 4, ReservationId::new()).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Reserved);
        assert_eq!(ledger.available(&sku()).await, 6);
        assert_eq!(ledger.on_hand(&sku()).await, 10);
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent_per_id() {
        let ledger = ledger_with_stock(10).await;
        let id = ReservationId::new();

        let first = ledger.reserve(sku(), 4, id).await.unwrap();
        let second = ledger.reserve(sku(), 4, id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.available(&sku()).await, 6);
    }

    #[tokio::test]
    async fn test_insufficient_stock() {
        let ledger = ledger_with_stock(3).await;

        let err = ledger
            .reserve(sku(), 5, ReservationId::new())
            .await
            .unwrap_err();

        match err {
            InventoryError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.available(&sku()).await, 3);
    }

    #[tokio::test]
    async fn test_reserve_unknown_sku_is_insufficient() {
        let ledger = InMemoryInventoryLedger::new();
        let result = ledger.reserve(sku(), 1, ReservationId::new()).await;
        assert!(matches!(
            result,
            Err(InventoryError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_decrements_on_hand() {
        let ledger = ledger_with_stock(10).await;
        let id = ReservationId::new();
        ledger.reserve(sku(), 4, id).await.unwrap();

        ledger.commit(id).await.unwrap();

        assert_eq!(ledger.on_hand(&sku()).await, 6);
        assert_eq!(ledger.available(&sku()).await, 6);
        let reservation = ledger.get_reservation(id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Committed);
    }

    #[tokio::test]
    async fn test_commit_is_idempotent() {
        let ledger = ledger_with_stock(10).await;
        let id = ReservationId::new();
        ledger.reserve(sku(), 4, id).await.unwrap();

        ledger.commit(id).await.unwrap();
        ledger.commit(id).await.unwrap();

        // Second commit must not decrement again.
        assert_eq!(ledger.on_hand(&sku()).await, 6);
    }

    #[tokio::test]
    async fn test_commit_released_is_terminal_error() {
        let ledger = ledger_with_stock(10).await;
        let id = ReservationId::new();
        ledger.reserve(sku(), 4, id).await.unwrap();
        ledger.release(id).await.unwrap();

        let err = ledger.commit(id).await.unwrap_err();
        assert!(matches!(err, InventoryError::AlreadyTerminal { .. }));
        assert_eq!(ledger.on_hand(&sku()).await, 10);
    }

    #[tokio::test]
    async fn test_commit_unknown_reservation() {
        let ledger = ledger_with_stock(10).await;
        let err = ledger.commit(ReservationId::new()).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_release_restores_available_exactly() {
        let ledger = ledger_with_stock(10).await;
        let id = ReservationId::new();
        ledger.reserve(sku(), 7, id).await.unwrap();
        assert_eq!(ledger.available(&sku()).await, 3);

        ledger.release(id).await.unwrap();

        assert_eq!(ledger.available(&sku()).await, 10);
        assert_eq!(ledger.on_hand(&sku()).await, 10);
    }

    #[tokio::test]
    async fn test_release_never_fails() {
        let ledger = ledger_with_stock(10).await;
        let id = ReservationId::new();

        // Unknown reservation: no-op.
        ledger.release(ReservationId::new()).await.unwrap();

        // Already released: no-op.
        ledger.reserve(sku(), 2, id).await.unwrap();
        ledger.release(id).await.unwrap();
        ledger.release(id).await.unwrap();

        // Committed: no-op, stock stays decremented.
        let committed = ReservationId::new();
        ledger.reserve(sku(), 3, committed).await.unwrap();
        ledger.commit(committed).await.unwrap();
        ledger.release(committed).await.unwrap();
        assert_eq!(ledger.on_hand(&sku()).await, 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_reserves_never_oversell() {
        let ledger = ledger_with_stock(10).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(sku(), 1, ReservationId::new()).await.is_ok()
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(ledger.available(&sku()).await, 0);
        assert_eq!(ledger.on_hand(&sku()).await, 10);
    }

    #[tokio::test]
    async fn test_sweep_returns_expired_holds_to_pool() {
        let ledger = InMemoryInventoryLedger::with_ttl(Duration::ZERO);
        ledger.set_stock(sku(), 10).await;
        let id = ReservationId::new();
        ledger.reserve(sku(), 4, id).await.unwrap();

        let swept = ledger
            .sweep_expired(Utc::now() + chrono::Duration::seconds(1))
            .await;

        assert_eq!(swept, vec![id]);
        assert_eq!(ledger.available(&sku()).await, 10);
        let reservation = ledger.get_reservation(id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Released);
    }

    #[tokio::test]
    async fn test_sweep_leaves_live_holds_alone() {
        let ledger = ledger_with_stock(10).await;
        let id = ReservationId::new();
        ledger.reserve(sku(), 4, id).await.unwrap();

        let swept = ledger.sweep_expired(Utc::now()).await;

        assert!(swept.is_empty());
        assert_eq!(ledger.available(&sku()).await, 6);
    }

    #[tokio::test]
    async fn test_expired_hold_cannot_be_committed() {
        let ledger = InMemoryInventoryLedger::with_ttl(Duration::ZERO);
        ledger.set_stock(sku(), 10).await;
        let id = ReservationId::new();
        ledger.reserve(sku(), 4, id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let err = ledger.commit(id).await.unwrap_err();
        assert!(matches!(err, InventoryError::AlreadyTerminal { .. }));
        assert_eq!(ledger.on_hand(&sku()).await, 10);
    }
}
