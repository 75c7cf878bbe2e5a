use super::linkage::MembershipLinkage;
use crate::domain::ids::{Actor, ExternalRef, MemberId, MembershipId, PaymentId};
use crate::domain::membership::Membership;
use crate::domain::payment::{
    Amount, GatewayEvent, GatewayEventKind, ManualAction, PaymentKind, PaymentMethod,
    PaymentProof, PaymentStatus, PaymentTransaction, PaymentTransition, Receipt,
};
use crate::domain::ports::{
    Cas, Clock, ClockBox, GatewayClient, GatewayClientBox, IdGenerator, IdGeneratorBox, Notifier,
    NotifierBox, PaymentStore, PaymentStoreBox,
};
use crate::error::{GymError, Result};

/// Image types accepted as proof of payment.
const ACCEPTED_PROOF_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];
/// Proof uploads above this size are rejected.
const MAX_PROOF_BYTES: u64 = 5 * 1024 * 1024;

/// What applying a gateway event did.
#[derive(Debug, Clone)]
pub enum Applied {
    /// This event won the transition out of `pending`.
    Transitioned(PaymentTransaction),
    /// The transaction was already terminal; nothing changed and no side
    /// effects fired. Gateways redeliver, so this is a success.
    NoOp(PaymentTransaction),
    /// The event kind is not one this core acts on; acknowledged so the
    /// gateway stops retrying.
    Ignored(String),
}

/// Drives a payment from creation to its terminal state.
///
/// Three channels feed the same record: direct initiation, the gateway
/// callback, and manual staff action. Each terminal write goes through the
/// payment store's compare-and-set, so whichever channel arrives first wins
/// and the rest observe a terminal state. Side effects (membership
/// activation, receipt) fire exactly once, from the winning call.
pub struct PaymentProcessor {
    payments: PaymentStoreBox,
    linkage: MembershipLinkage,
    gateway: GatewayClientBox,
    notifier: NotifierBox,
    clock: ClockBox,
    ids: IdGeneratorBox,
}

impl PaymentProcessor {
    pub fn new(
        payments: PaymentStoreBox,
        linkage: MembershipLinkage,
        gateway: GatewayClientBox,
        notifier: NotifierBox,
        clock: ClockBox,
        ids: IdGeneratorBox,
    ) -> Self {
        Self {
            payments,
            linkage,
            gateway,
            notifier,
            clock,
            ids,
        }
    }

    /// Creates a pending transaction plus its gateway-side payment object.
    ///
    /// An unsupported method is rejected before anything persists. A gateway
    /// failure leaves the transaction persisted as `failed` with the cause
    /// preserved, and surfaces the error to the caller.
    pub async fn initiate(
        &self,
        member_id: MemberId,
        membership_id: Option<MembershipId>,
        amount: Amount,
        method: PaymentMethod,
        kind: PaymentKind,
    ) -> Result<PaymentTransaction> {
        if !self.gateway.supports(method) {
            return Err(GymError::UnsupportedMethod(method));
        }
        if let Some(mid) = membership_id
            && self.linkage.get(mid).await?.is_none()
        {
            return Err(GymError::not_found("membership", mid));
        }

        let id = PaymentId::from_uuid(self.ids.next_id());
        let external_ref = ExternalRef::new(format!("gym-{id}"));
        let now = self.clock.now();
        let tx = PaymentTransaction::pending(
            id,
            external_ref.clone(),
            member_id,
            membership_id,
            amount,
            method,
            kind,
            now,
        );
        self.payments.insert(tx).await?;

        match self
            .gateway
            .create_payment_object(&external_ref, method, amount)
            .await
        {
            Ok(payment_object) => {
                let data = serde_json::to_value(&payment_object)?;
                let tx = self.payments.set_gateway_data(id, data).await?;
                tracing::info!(
                    payment = %id,
                    external_ref = %external_ref,
                    %method,
                    %amount,
                    "payment initiated"
                );
                Ok(tx)
            }
            Err(e) => {
                let reason = e.to_string();
                self.payments
                    .transition(id, PaymentTransition::failed(reason.clone(), self.clock.now()))
                    .await?;
                tracing::error!(payment = %id, error = %reason, "gateway rejected payment object");
                Err(e)
            }
        }
    }

    /// Applies an authenticated gateway callback.
    ///
    /// Events for terminal transactions are absorbed as idempotent no-ops so
    /// gateway redelivery never errors or double-fires side effects.
    pub async fn apply_gateway_event(&self, event: GatewayEvent) -> Result<Applied> {
        let target = match &event.kind {
            GatewayEventKind::Paid | GatewayEventKind::Settled => PaymentStatus::Completed,
            GatewayEventKind::Expired => PaymentStatus::Cancelled,
            GatewayEventKind::Failed => PaymentStatus::Failed,
            GatewayEventKind::Unrecognized(keyword) => {
                tracing::warn!(
                    keyword = %keyword,
                    external_ref = %event.external_ref,
                    "ignoring unrecognized gateway event"
                );
                return Ok(Applied::Ignored(keyword.clone()));
            }
        };

        let tx = self
            .payments
            .get_by_external_ref(&event.external_ref)
            .await?
            .ok_or_else(|| GymError::not_found("payment", &event.external_ref))?;

        let now = self.clock.now();
        let transition = match target {
            PaymentStatus::Completed => PaymentTransition::completed(now),
            PaymentStatus::Cancelled => PaymentTransition::cancelled(now),
            _ => PaymentTransition::failed("gateway reported failure", now),
        }
        .with_gateway_data(event.payload.clone());

        match self.payments.transition(tx.id, transition).await? {
            Cas::Applied(tx) => {
                tracing::info!(
                    payment = %tx.id,
                    external_ref = %tx.external_ref,
                    status = %tx.status,
                    "gateway event applied"
                );
                if tx.status == PaymentStatus::Completed {
                    self.on_completed(&tx).await;
                }
                Ok(Applied::Transitioned(tx))
            }
            Cas::AlreadyTerminal(tx) => {
                tracing::debug!(
                    payment = %tx.id,
                    status = %tx.status,
                    "gateway event for terminal transaction absorbed"
                );
                Ok(Applied::NoOp(tx))
            }
        }
    }

    /// Staff confirmation of a pending transaction, typically after
    /// reviewing an uploaded proof.
    pub async fn manual_confirm(
        &self,
        payment_id: PaymentId,
        actor: Actor,
        notes: &str,
    ) -> Result<PaymentTransaction> {
        self.manual_finalize(payment_id, actor, notes, PaymentStatus::Completed)
            .await
    }

    /// Staff rejection of a pending transaction. Rejecting an
    /// already-terminal transaction is an error: a completed payment must
    /// never silently become failed.
    pub async fn manual_reject(
        &self,
        payment_id: PaymentId,
        actor: Actor,
        reason: &str,
    ) -> Result<PaymentTransaction> {
        self.manual_finalize(payment_id, actor, reason, PaymentStatus::Failed)
            .await
    }

    async fn manual_finalize(
        &self,
        payment_id: PaymentId,
        actor: Actor,
        notes: &str,
        target: PaymentStatus,
    ) -> Result<PaymentTransaction> {
        if !actor.is_staff() {
            return Err(GymError::StaffOnly);
        }
        let tx = self
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| GymError::not_found("payment", payment_id))?;

        let now = self.clock.now();
        let action = ManualAction {
            actor: actor.id,
            notes: notes.to_string(),
            at: now,
        };
        let transition = match target {
            PaymentStatus::Completed => PaymentTransition::completed(now),
            _ => PaymentTransition::failed(notes, now),
        }
        .with_manual_action(action);

        match self.payments.transition(tx.id, transition).await? {
            Cas::Applied(tx) => {
                tracing::info!(
                    payment = %tx.id,
                    actor = %actor.id,
                    status = %tx.status,
                    "payment finalized manually"
                );
                if tx.status == PaymentStatus::Completed {
                    self.on_completed(&tx).await;
                }
                Ok(tx)
            }
            Cas::AlreadyTerminal(tx) => Err(GymError::AlreadyFinalized(tx.status)),
        }
    }

    /// Attaches proof-of-payment metadata for a later manual review.
    ///
    /// Never changes the transaction status; evidence may arrive even after
    /// a transaction went terminal.
    pub async fn attach_proof(
        &self,
        payment_id: PaymentId,
        file_name: &str,
        content_type: &str,
        size_bytes: u64,
    ) -> Result<PaymentTransaction> {
        if !ACCEPTED_PROOF_TYPES.contains(&content_type) {
            return Err(GymError::Validation(format!(
                "proof must be one of {}, got {content_type}",
                ACCEPTED_PROOF_TYPES.join(", ")
            )));
        }
        if size_bytes > MAX_PROOF_BYTES {
            return Err(GymError::Validation(format!(
                "proof exceeds {MAX_PROOF_BYTES} bytes"
            )));
        }

        let proof = PaymentProof {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size_bytes,
            uploaded_at: self.clock.now(),
        };
        let tx = self.payments.set_proof(payment_id, proof).await?;
        tracing::info!(payment = %payment_id, file_name, "proof attached");
        Ok(tx)
    }

    /// Convergence pass for the window between a payment durably completing
    /// and its membership activating. Scans completed membership payments
    /// and activates any membership still pending. Safe to run at any time.
    pub async fn reconcile(&self) -> Result<u32> {
        let now = self.clock.now();
        let mut activated = 0;
        for tx in self.payments.all_payments().await? {
            if tx.status == PaymentStatus::Completed
                && tx.membership_id.is_some()
                && self.linkage.activate_for(&tx, now).await?
            {
                tracing::info!(payment = %tx.id, "reconciliation activated membership");
                activated += 1;
            }
        }
        Ok(activated)
    }

    /// All transactions, oldest first, for reporting.
    pub async fn statement(&self) -> Result<Vec<PaymentTransaction>> {
        let mut payments = self.payments.all_payments().await?;
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(payments)
    }

    pub async fn membership(&self, id: MembershipId) -> Result<Option<Membership>> {
        self.linkage.get(id).await
    }

    /// Fires the completion side effects: membership activation and the
    /// receipt notification. Called exactly once per transaction, by the
    /// channel that won the compare-and-set. Failures here are logged and
    /// left to the reconciliation pass; they never undo the transition.
    async fn on_completed(&self, tx: &PaymentTransaction) {
        if tx.membership_id.is_some() {
            match self.linkage.activate_for(tx, self.clock.now()).await {
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(payment = %tx.id, error = %e, "membership activation failed");
                }
            }
        }

        let receipt = Receipt {
            member_id: tx.member_id,
            amount: tx.amount,
            reference: tx.external_ref.clone(),
            membership_id: tx.membership_id,
            paid_at: tx.updated_at,
        };
        if let Err(e) = self.notifier.send_receipt(receipt).await {
            tracing::warn!(payment = %tx.id, error = %e, "receipt notification failed");
        }
    }
}
