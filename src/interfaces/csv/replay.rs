use super::ops_reader::{OpKind, OpRecord};
use super::report::{OccupancyRow, PaymentRow};
use crate::application::admission::AdmissionController;
use crate::application::payments::PaymentProcessor;
use crate::domain::ids::{
    Actor, BookingId, ExternalRef, MemberId, MembershipId, PaymentId, SessionId,
};
use crate::domain::membership::Membership;
use crate::domain::payment::{Amount, PaymentKind, PaymentMethod};
use crate::domain::ports::{
    Clock, ClockBox, IdGenerator, IdGeneratorBox, MembershipStore, MembershipStoreBox,
};
use crate::error::{GymError, Result};
use crate::interfaces::webhook::WebhookDecoder;
use chrono::TimeDelta;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Sessions scheduled through the replay start this far in the future, so
/// member cancellations land comfortably outside the deadline window.
fn replay_lead() -> TimeDelta {
    TimeDelta::hours(24)
}

/// Drives the booking and payment cores from an operations file.
///
/// The replay is a demo and ops surface: it maps human-readable member and
/// session labels onto ids, feeds each row into the controllers, and renders
/// the closing occupancy and payment reports. Gateway callbacks go through
/// the webhook decoder, signature and all, exactly as a delivery from the
/// real gateway would.
pub struct Replay {
    admission: AdmissionController,
    payments: PaymentProcessor,
    memberships: MembershipStoreBox,
    decoder: WebhookDecoder,
    clock: ClockBox,
    ids: IdGeneratorBox,
    staff: Actor,
    members: HashMap<String, MemberId>,
    sessions: HashMap<String, SessionId>,
    member_memberships: HashMap<String, MembershipId>,
    bookings: HashMap<(String, String), BookingId>,
    last_payment: HashMap<String, (PaymentId, ExternalRef)>,
}

impl Replay {
    pub fn new(
        admission: AdmissionController,
        payments: PaymentProcessor,
        memberships: MembershipStoreBox,
        webhook_secret: &str,
        clock: ClockBox,
        ids: IdGeneratorBox,
    ) -> Self {
        let staff = Actor::staff(MemberId::from_uuid(ids.next_id()));
        Self {
            admission,
            payments,
            memberships,
            decoder: WebhookDecoder::new(webhook_secret.as_bytes().to_vec()),
            clock,
            ids,
            staff,
            members: HashMap::new(),
            sessions: HashMap::new(),
            member_memberships: HashMap::new(),
            bookings: HashMap::new(),
            last_payment: HashMap::new(),
        }
    }

    /// Rebuilds the capacity ledger and the session label map from persisted
    /// state. Run once before replaying against a store that outlived a
    /// previous process.
    pub async fn restore(&mut self) -> Result<()> {
        self.admission.restore_ledger().await?;
        for occupancy in self.admission.occupancy().await? {
            self.sessions
                .insert(occupancy.session.name.clone(), occupancy.session.id);
        }
        Ok(())
    }

    /// Applies one operation row. Errors identify the offending row's
    /// labels; the caller reports them and keeps replaying.
    pub async fn apply(&mut self, op: OpRecord) -> Result<()> {
        match op.op {
            OpKind::Schedule => self.schedule(&op).await,
            OpKind::Book => self.book(&op).await,
            OpKind::Cancel => self.cancel(&op).await,
            OpKind::Join => self.join(&op).await,
            OpKind::Pay => self.pay(&op).await,
            OpKind::Callback => self.callback(&op).await,
            OpKind::Confirm => self.manual(&op, true).await,
            OpKind::Reject => self.manual(&op, false).await,
        }
    }

    async fn schedule(&mut self, op: &OpRecord) -> Result<()> {
        let label = require(&op.session, "schedule needs a session label")?;
        let capacity: u32 = op
            .arg
            .as_deref()
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| GymError::Validation("schedule needs a numeric capacity".into()))?;
        let instructor = if op.member.is_empty() {
            "staff"
        } else {
            op.member.as_str()
        };

        let starts_at = self.clock.now() + replay_lead();
        let session = self
            .admission
            .schedule_session(
                label,
                instructor,
                starts_at,
                starts_at + TimeDelta::hours(1),
                capacity,
            )
            .await?;
        self.sessions.insert(label.to_string(), session.id);
        Ok(())
    }

    async fn book(&mut self, op: &OpRecord) -> Result<()> {
        let member = self.member(&op.member)?;
        let session = self.session(&op.session)?;
        let booking = self.admission.book_class(member, session).await?;
        self.bookings
            .insert((op.member.clone(), op.session.clone()), booking.id);
        Ok(())
    }

    async fn cancel(&mut self, op: &OpRecord) -> Result<()> {
        let member = self.member(&op.member)?;
        let booking_id = self
            .bookings
            .get(&(op.member.clone(), op.session.clone()))
            .copied()
            .ok_or_else(|| {
                GymError::Validation(format!(
                    "no booking on record for {} in {}",
                    op.member, op.session
                ))
            })?;
        let reason = op.arg.as_deref().unwrap_or("member cancellation");
        self.admission
            .cancel_booking(booking_id, Actor::member(member), reason)
            .await?;
        Ok(())
    }

    async fn join(&mut self, op: &OpRecord) -> Result<()> {
        let member = self.member(&op.member)?;
        let session = self.session(&op.session)?;
        self.admission.join_waitlist(member, session).await?;
        Ok(())
    }

    async fn pay(&mut self, op: &OpRecord) -> Result<()> {
        let member = self.member(&op.member)?;
        let amount = op
            .arg
            .as_deref()
            .and_then(|a| Decimal::from_str(a).ok())
            .ok_or_else(|| GymError::Validation("pay needs a numeric amount".into()))?;
        let membership_id = self.membership_for(&op.member, member).await?;

        let tx = self
            .payments
            .initiate(
                member,
                Some(membership_id),
                Amount::new(amount)?,
                PaymentMethod::Invoice,
                PaymentKind::Membership,
            )
            .await?;
        self.last_payment
            .insert(op.member.clone(), (tx.id, tx.external_ref.clone()));
        Ok(())
    }

    async fn callback(&mut self, op: &OpRecord) -> Result<()> {
        let (_, external_ref) = self.require_payment(&op.member)?;
        let status = op.arg.as_deref().unwrap_or("PAID");
        let body = serde_json::to_vec(&serde_json::json!({
            "external_id": external_ref.as_str(),
            "status": status,
        }))?;
        let signature = self.decoder.sign(&body)?;
        let event = self.decoder.decode(&body, &signature)?;
        self.payments.apply_gateway_event(event).await?;
        Ok(())
    }

    async fn manual(&mut self, op: &OpRecord, confirm: bool) -> Result<()> {
        let (payment_id, _) = self.require_payment(&op.member)?;
        if confirm {
            let notes = op.arg.as_deref().unwrap_or("confirmed at front desk");
            self.payments
                .manual_confirm(payment_id, self.staff, notes)
                .await?;
        } else {
            let reason = op.arg.as_deref().unwrap_or("rejected at front desk");
            self.payments
                .manual_reject(payment_id, self.staff, reason)
                .await?;
        }
        Ok(())
    }

    /// Per-session occupancy, sorted by session label.
    pub async fn occupancy_rows(&self) -> Result<Vec<OccupancyRow>> {
        let labels: HashMap<_, _> = self
            .sessions
            .iter()
            .map(|(label, id)| (*id, label.clone()))
            .collect();

        let mut rows = Vec::new();
        for occupancy in self.admission.occupancy().await? {
            let label = labels
                .get(&occupancy.session.id)
                .cloned()
                .unwrap_or_else(|| occupancy.session.name.clone());
            rows.push(OccupancyRow {
                session: label,
                confirmed: occupancy.confirmed,
                waiting: occupancy.waiting,
                capacity: occupancy.session.max_capacity,
            });
        }
        rows.sort_by(|a, b| a.session.cmp(&b.session));
        Ok(rows)
    }

    /// Per-transaction payment statement, oldest first.
    pub async fn payment_rows(&self) -> Result<Vec<PaymentRow>> {
        let labels: HashMap<_, _> = self
            .members
            .iter()
            .map(|(label, id)| (*id, label.clone()))
            .collect();

        let mut rows = Vec::new();
        for tx in self.payments.statement().await? {
            let member = labels
                .get(&tx.member_id)
                .cloned()
                .unwrap_or_else(|| tx.member_id.to_string());
            let membership = match tx.membership_id {
                Some(id) => match self.payments.membership(id).await? {
                    Some(m) => m.status.to_string(),
                    None => "-".to_string(),
                },
                None => "-".to_string(),
            };
            rows.push(PaymentRow {
                member,
                status: tx.status.to_string(),
                amount: tx.amount.value(),
                membership,
            });
        }
        Ok(rows)
    }

    fn member(&mut self, label: &str) -> Result<MemberId> {
        let label = require(label, "operation needs a member label")?;
        if let Some(id) = self.members.get(label) {
            return Ok(*id);
        }
        let id = MemberId::from_uuid(self.ids.next_id());
        self.members.insert(label.to_string(), id);
        Ok(id)
    }

    fn session(&self, label: &str) -> Result<SessionId> {
        let label = require(label, "operation needs a session label")?;
        self.sessions
            .get(label)
            .copied()
            .ok_or_else(|| GymError::Validation(format!("unknown session {label}")))
    }

    async fn membership_for(&mut self, label: &str, member: MemberId) -> Result<MembershipId> {
        if let Some(id) = self.member_memberships.get(label) {
            return Ok(*id);
        }
        let id = MembershipId::from_uuid(self.ids.next_id());
        self.memberships
            .store(Membership::pending(id, member, "standard", 30))
            .await?;
        self.member_memberships.insert(label.to_string(), id);
        Ok(id)
    }

    fn require_payment(&self, label: &str) -> Result<(PaymentId, ExternalRef)> {
        self.last_payment
            .get(label)
            .cloned()
            .ok_or_else(|| GymError::Validation(format!("no payment on record for {label}")))
    }
}

fn require<'a>(value: &'a str, message: &str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(GymError::Validation(message.to_string()));
    }
    Ok(value)
}
