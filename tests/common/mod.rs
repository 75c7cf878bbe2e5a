#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use gymcore::application::admission::AdmissionController;
use gymcore::application::linkage::MembershipLinkage;
use gymcore::application::payments::PaymentProcessor;
use gymcore::domain::ids::{ExternalRef, MemberId, MembershipId};
use gymcore::domain::membership::Membership;
use gymcore::domain::payment::GatewayEvent;
use gymcore::domain::ports::{Clock, MembershipStore};
use gymcore::domain::session::ScheduledSession;
use gymcore::infrastructure::gateway::SimulatedGateway;
use gymcore::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryMembershipStore, InMemoryPaymentStore, InMemorySessionStore,
    InMemoryWaitlistStore,
};
use gymcore::infrastructure::notify::RecordingNotifier;
use gymcore::infrastructure::system::{ManualClock, SequentialIds};
use gymcore::interfaces::webhook::WebhookDecoder;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "test-secret";

/// Both cores wired against shared in-memory stores, with handles kept for
/// assertions.
pub struct TestCore {
    pub admission: AdmissionController,
    pub payments: PaymentProcessor,
    pub clock: ManualClock,
    pub ids: SequentialIds,
    pub notifier: RecordingNotifier,
    pub gateway: SimulatedGateway,
    pub booking_store: InMemoryBookingStore,
    pub waitlist_store: InMemoryWaitlistStore,
    pub payment_store: InMemoryPaymentStore,
    pub membership_store: InMemoryMembershipStore,
    pub decoder: WebhookDecoder,
}

pub fn core() -> TestCore {
    core_at(Utc::now())
}

pub fn core_at(now: DateTime<Utc>) -> TestCore {
    let clock = ManualClock::at(now);
    let ids = SequentialIds::new();
    let notifier = RecordingNotifier::new();
    let gateway = SimulatedGateway::new();
    let booking_store = InMemoryBookingStore::new();
    let waitlist_store = InMemoryWaitlistStore::new();
    let payment_store = InMemoryPaymentStore::new();
    let membership_store = InMemoryMembershipStore::new();

    let admission = AdmissionController::new(
        Box::new(InMemorySessionStore::new()),
        Box::new(booking_store.clone()),
        Box::new(waitlist_store.clone()),
        Box::new(clock.clone()),
        Box::new(ids.clone()),
    );
    let payments = PaymentProcessor::new(
        Box::new(payment_store.clone()),
        MembershipLinkage::new(Box::new(membership_store.clone())),
        Box::new(gateway.clone()),
        Box::new(notifier.clone()),
        Box::new(clock.clone()),
        Box::new(ids.clone()),
    );

    TestCore {
        admission,
        payments,
        clock,
        ids,
        notifier,
        gateway,
        booking_store,
        waitlist_store,
        payment_store,
        membership_store,
        decoder: WebhookDecoder::new(WEBHOOK_SECRET.as_bytes().to_vec()),
    }
}

impl TestCore {
    /// Schedules a one-hour session starting 24 hours from the test clock.
    pub async fn schedule(&self, name: &str, capacity: u32) -> ScheduledSession {
        let starts_at = self.clock.now() + TimeDelta::hours(24);
        self.admission
            .schedule_session(name, "coach", starts_at, starts_at + TimeDelta::hours(1), capacity)
            .await
            .unwrap()
    }

    /// Creates a pending 30-day membership for the member.
    pub async fn pending_membership(&self, member_id: MemberId) -> MembershipId {
        let id = MembershipId::from_uuid(Uuid::new_v4());
        self.membership_store
            .store(Membership::pending(id, member_id, "standard", 30))
            .await
            .unwrap();
        id
    }

    /// A signed-and-decoded gateway callback, the way a real delivery would
    /// arrive through the webhook boundary.
    pub fn gateway_event(&self, external_ref: &ExternalRef, status: &str) -> GatewayEvent {
        let body = serde_json::to_vec(&serde_json::json!({
            "external_id": external_ref.as_str(),
            "status": status,
        }))
        .unwrap();
        let signature = self.decoder.sign(&body).unwrap();
        self.decoder.decode(&body, &signature).unwrap()
    }
}

pub fn member(n: u128) -> MemberId {
    MemberId::from_uuid(Uuid::from_u128(0xA000 + n))
}
