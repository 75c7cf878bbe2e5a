use crate::domain::booking::{Booking, BookingStatus, WaitlistEntry, WaitlistStatus};
use crate::domain::ids::{BookingId, ExternalRef, MemberId, MembershipId, PaymentId, SessionId};
use crate::domain::membership::Membership;
use crate::domain::payment::{PaymentProof, PaymentTransaction, PaymentTransition};
use crate::domain::ports::{
    BookingStore, Cas, MembershipStore, PaymentStore, SessionStore, WaitlistStore,
};
use crate::domain::session::ScheduledSession;
use crate::error::{GymError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for scheduled sessions.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, ScheduledSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store(&self, session: ScheduledSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<ScheduledSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned())
    }

    async fn all_sessions(&self) -> Result<Vec<ScheduledSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().cloned().collect())
    }
}

#[derive(Default)]
struct BookingState {
    bookings: HashMap<BookingId, Booking>,
    /// Unique index over active (confirmed) bookings.
    active: HashMap<(MemberId, SessionId), BookingId>,
}

/// A thread-safe in-memory store for bookings.
///
/// Maintains a unique index over (member, session) for confirmed bookings,
/// the in-memory analogue of a partial unique index in a relational store.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    state: Arc<RwLock<BookingState>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert_active(&self, booking: Booking) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (booking.member_id, booking.session_id);
        if state.active.contains_key(&key) {
            return Err(GymError::AlreadyBooked {
                member: booking.member_id,
                session: booking.session_id,
            });
        }
        if booking.status == BookingStatus::Confirmed {
            state.active.insert(key, booking.id);
        }
        state.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state.bookings.get(&id).cloned())
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (booking.member_id, booking.session_id);
        match booking.status {
            BookingStatus::Confirmed => {
                state.active.insert(key, booking.id);
            }
            _ => {
                if state.active.get(&key) == Some(&booking.id) {
                    state.active.remove(&key);
                }
            }
        }
        state.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn find_active(
        &self,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .active
            .get(&(member_id, session_id))
            .and_then(|id| state.bookings.get(id))
            .cloned())
    }

    async fn confirmed_count(&self, session_id: SessionId) -> Result<u32> {
        let state = self.state.read().await;
        Ok(state
            .active
            .keys()
            .filter(|(_, s)| *s == session_id)
            .count() as u32)
    }
}

/// A thread-safe in-memory waitlist.
///
/// Entries are kept in insertion order; the FIFO head is the earliest
/// `joined_at` still waiting, insertion order breaking ties.
#[derive(Default, Clone)]
pub struct InMemoryWaitlistStore {
    entries: Arc<RwLock<Vec<WaitlistEntry>>>,
}

impl InMemoryWaitlistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WaitlistStore for InMemoryWaitlistStore {
    async fn append(&self, entry: WaitlistEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn update(&self, entry: WaitlistEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(stored) => {
                *stored = entry;
                Ok(())
            }
            None => Err(GymError::not_found("waitlist entry", entry.id)),
        }
    }

    async fn find_waiting(
        &self,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<Option<WaitlistEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|e| {
                e.member_id == member_id
                    && e.session_id == session_id
                    && e.status == WaitlistStatus::Waiting
            })
            .cloned())
    }

    async fn earliest_waiting(&self, session_id: SessionId) -> Result<Option<WaitlistEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.session_id == session_id && e.status == WaitlistStatus::Waiting)
            .min_by_key(|e| e.joined_at)
            .cloned())
    }

    async fn waiting_count(&self, session_id: SessionId) -> Result<u32> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.session_id == session_id && e.status == WaitlistStatus::Waiting)
            .count() as u32)
    }
}

#[derive(Default)]
struct PaymentState {
    payments: HashMap<PaymentId, PaymentTransaction>,
    by_ref: HashMap<ExternalRef, PaymentId>,
}

/// A thread-safe in-memory store for payment transactions.
///
/// `transition` performs the status compare-and-set under the store's write
/// lock, the in-memory analogue of a row lock: concurrent channels racing on
/// the same transaction observe a serializable ordering.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    state: Arc<RwLock<PaymentState>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, tx: PaymentTransaction) -> Result<()> {
        let mut state = self.state.write().await;
        state.by_ref.insert(tx.external_ref.clone(), tx.id);
        state.payments.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentTransaction>> {
        let state = self.state.read().await;
        Ok(state.payments.get(&id).cloned())
    }

    async fn get_by_external_ref(
        &self,
        external_ref: &ExternalRef,
    ) -> Result<Option<PaymentTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .by_ref
            .get(external_ref)
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn transition(&self, id: PaymentId, transition: PaymentTransition) -> Result<Cas> {
        let mut state = self.state.write().await;
        let tx = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| GymError::not_found("payment", id))?;
        if tx.is_terminal() {
            return Ok(Cas::AlreadyTerminal(tx.clone()));
        }
        tx.finalize(transition)?;
        Ok(Cas::Applied(tx.clone()))
    }

    async fn set_gateway_data(
        &self,
        id: PaymentId,
        data: serde_json::Value,
    ) -> Result<PaymentTransaction> {
        let mut state = self.state.write().await;
        let tx = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| GymError::not_found("payment", id))?;
        tx.gateway_data = Some(data);
        Ok(tx.clone())
    }

    async fn set_proof(&self, id: PaymentId, proof: PaymentProof) -> Result<PaymentTransaction> {
        let mut state = self.state.write().await;
        let tx = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| GymError::not_found("payment", id))?;
        tx.proof = Some(proof);
        Ok(tx.clone())
    }

    async fn all_payments(&self) -> Result<Vec<PaymentTransaction>> {
        let state = self.state.read().await;
        Ok(state.payments.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for memberships.
#[derive(Default, Clone)]
pub struct InMemoryMembershipStore {
    memberships: Arc<RwLock<HashMap<MembershipId, Membership>>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn store(&self, membership: Membership) -> Result<()> {
        let mut memberships = self.memberships.write().await;
        memberships.insert(membership.id, membership);
        Ok(())
    }

    async fn get(&self, id: MembershipId) -> Result<Option<Membership>> {
        let memberships = self.memberships.read().await;
        Ok(memberships.get(&id).cloned())
    }
}
