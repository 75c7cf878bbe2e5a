use crate::domain::ids::SessionId;
use crate::error::{GymError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug)]
struct SeatCell {
    count: u32,
    max: u32,
}

/// Per-session seat counter, the atomic unit of the admission protocol.
///
/// Each session gets its own mutex-guarded cell, so reservation and release
/// for one session are serialized while different sessions proceed fully in
/// parallel. The registry map is locked only to look cells up, never across
/// a reservation.
#[derive(Default)]
pub struct CapacityLedger {
    cells: Mutex<HashMap<SessionId, Arc<Mutex<SeatCell>>>>,
}

impl CapacityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session's cell. Re-opening an existing cell is a no-op so
    /// replays and restarts stay idempotent.
    pub async fn open(&self, session_id: SessionId, max_capacity: u32) {
        self.open_at(session_id, max_capacity, 0).await;
    }

    /// Registers a cell with a pre-existing seat count, used when rebuilding
    /// the ledger from persisted confirmed bookings after a restart.
    pub async fn open_at(&self, session_id: SessionId, max_capacity: u32, count: u32) {
        let mut cells = self.cells.lock().await;
        cells.entry(session_id).or_insert_with(|| {
            Arc::new(Mutex::new(SeatCell {
                count,
                max: max_capacity,
            }))
        });
    }

    async fn cell(&self, session_id: SessionId) -> Result<Arc<Mutex<SeatCell>>> {
        let cells = self.cells.lock().await;
        cells
            .get(&session_id)
            .cloned()
            .ok_or_else(|| GymError::not_found("session", session_id))
    }

    /// Takes one seat if any remain. Evaluate-and-commit happens under the
    /// cell's lock, so two racing callers never both observe the last seat.
    /// Rejection does not mutate the count.
    pub async fn try_reserve(&self, session_id: SessionId) -> Result<()> {
        let cell = self.cell(session_id).await?;
        let mut seat = cell.lock().await;
        if seat.count == seat.max {
            return Err(GymError::CapacityExceeded(session_id));
        }
        seat.count += 1;
        Ok(())
    }

    /// Frees one seat. Always succeeds; the count saturates at zero.
    pub async fn release(&self, session_id: SessionId) -> Result<()> {
        let cell = self.cell(session_id).await?;
        let mut seat = cell.lock().await;
        seat.count = seat.count.saturating_sub(1);
        Ok(())
    }

    pub async fn current_count(&self, session_id: SessionId) -> Result<u32> {
        let cell = self.cell(session_id).await?;
        let seat = cell.lock().await;
        Ok(seat.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session_id() -> SessionId {
        SessionId::from_uuid(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_reserve_until_full() {
        let ledger = CapacityLedger::new();
        let id = session_id();
        ledger.open(id, 2).await;

        ledger.try_reserve(id).await.unwrap();
        ledger.try_reserve(id).await.unwrap();

        let err = ledger.try_reserve(id).await.unwrap_err();
        assert!(matches!(err, GymError::CapacityExceeded(s) if s == id));
        assert_eq!(ledger.current_count(id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_release_frees_exactly_one_seat() {
        let ledger = CapacityLedger::new();
        let id = session_id();
        ledger.open(id, 1).await;

        ledger.try_reserve(id).await.unwrap();
        ledger.release(id).await.unwrap();
        assert_eq!(ledger.current_count(id).await.unwrap(), 0);

        ledger.try_reserve(id).await.unwrap();
        assert!(ledger.try_reserve(id).await.is_err());
    }

    #[tokio::test]
    async fn test_release_saturates_at_zero() {
        let ledger = CapacityLedger::new();
        let id = session_id();
        ledger.open(id, 1).await;

        ledger.release(id).await.unwrap();
        assert_eq!(ledger.current_count(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_session_is_not_found() {
        let ledger = CapacityLedger::new();
        assert!(matches!(
            ledger.try_reserve(session_id()).await,
            Err(GymError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_reopen_keeps_existing_count() {
        let ledger = CapacityLedger::new();
        let id = session_id();
        ledger.open(id, 3).await;
        ledger.try_reserve(id).await.unwrap();

        ledger.open(id, 3).await;
        assert_eq!(ledger.current_count(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_respect_capacity() {
        let ledger = Arc::new(CapacityLedger::new());
        let id = session_id();
        ledger.open(id, 5).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(
                async move { ledger.try_reserve(id).await.is_ok() },
            ));
        }

        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap() {
                reserved += 1;
            }
        }

        assert_eq!(reserved, 5);
        assert_eq!(ledger.current_count(id).await.unwrap(), 5);
    }
}
