use super::booking::{Booking, WaitlistEntry};
use super::ids::{BookingId, ExternalRef, MemberId, MembershipId, PaymentId, SessionId};
use super::membership::Membership;
use super::payment::{
    Amount, PaymentMethod, PaymentProof, PaymentTransaction, PaymentTransition, Receipt,
};
use super::session::ScheduledSession;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, session: ScheduledSession) -> Result<()>;
    async fn get(&self, id: SessionId) -> Result<Option<ScheduledSession>>;
    async fn all_sessions(&self) -> Result<Vec<ScheduledSession>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking, enforcing at most one active (confirmed)
    /// booking per (member, session) pair. Fails with `AlreadyBooked` when
    /// that unique-index constraint is violated.
    async fn insert_active(&self, booking: Booking) -> Result<()>;
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;
    async fn update(&self, booking: Booking) -> Result<()>;
    async fn find_active(
        &self,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<Option<Booking>>;
    async fn confirmed_count(&self, session_id: SessionId) -> Result<u32>;
}

#[async_trait]
pub trait WaitlistStore: Send + Sync {
    async fn append(&self, entry: WaitlistEntry) -> Result<()>;
    async fn update(&self, entry: WaitlistEntry) -> Result<()>;
    async fn find_waiting(
        &self,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<Option<WaitlistEntry>>;
    /// The head of the FIFO queue: earliest `joined_at` still waiting,
    /// insertion order breaking ties.
    async fn earliest_waiting(&self, session_id: SessionId) -> Result<Option<WaitlistEntry>>;
    async fn waiting_count(&self, session_id: SessionId) -> Result<u32>;
}

/// Outcome of the payment store's compare-and-set.
#[derive(Debug, Clone)]
pub enum Cas {
    /// This call observed `pending` and performed the transition.
    Applied(PaymentTransaction),
    /// The record was already terminal; returned unchanged.
    AlreadyTerminal(PaymentTransaction),
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, tx: PaymentTransaction) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<PaymentTransaction>>;
    async fn get_by_external_ref(
        &self,
        external_ref: &ExternalRef,
    ) -> Result<Option<PaymentTransaction>>;
    /// Applies a terminal transition if and only if the stored status is
    /// still `pending`, under the store's per-record write guard. This is
    /// the linearization point for the three entry channels.
    async fn transition(&self, id: PaymentId, transition: PaymentTransition) -> Result<Cas>;
    /// Attaches the gateway's payment object to a freshly initiated
    /// transaction. Does not touch status.
    async fn set_gateway_data(
        &self,
        id: PaymentId,
        data: serde_json::Value,
    ) -> Result<PaymentTransaction>;
    /// Attaches proof-of-payment metadata. Does not touch status.
    async fn set_proof(&self, id: PaymentId, proof: PaymentProof) -> Result<PaymentTransaction>;
    async fn all_payments(&self) -> Result<Vec<PaymentTransaction>>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn store(&self, membership: Membership) -> Result<()>;
    async fn get(&self, id: MembershipId) -> Result<Option<Membership>>;
}

/// Current-time source, injected so tests can control the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Unique-id source, injected so tests can get deterministic ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// A method-specific payment object created on the gateway at initiation.
///
/// This is what the member actually pays against; it travels back to the
/// caller and is retained on the transaction as gateway metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GatewayPaymentObject {
    Invoice { invoice_url: String },
    VirtualAccount { bank: String, account_number: String },
    Qris { qr_string: String },
    Ewallet { checkout_url: String },
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Whether this gateway can create payment objects for the method.
    fn supports(&self, method: PaymentMethod) -> bool;
    /// Creates the gateway-side payment object for a new transaction.
    async fn create_payment_object(
        &self,
        external_ref: &ExternalRef,
        method: PaymentMethod,
        amount: Amount,
    ) -> Result<GatewayPaymentObject>;
}

/// Fire-and-forget notification sender. Failures are logged by the caller,
/// never retried by this core.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_receipt(&self, receipt: Receipt) -> Result<()>;
}

pub type SessionStoreBox = Box<dyn SessionStore>;
pub type BookingStoreBox = Box<dyn BookingStore>;
pub type WaitlistStoreBox = Box<dyn WaitlistStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type MembershipStoreBox = Box<dyn MembershipStore>;
pub type ClockBox = Box<dyn Clock>;
pub type IdGeneratorBox = Box<dyn IdGenerator>;
pub type GatewayClientBox = Box<dyn GatewayClient>;
pub type NotifierBox = Box<dyn Notifier>;
