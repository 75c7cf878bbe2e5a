use crate::domain::ids::MembershipId;
use crate::domain::membership::Membership;
use crate::domain::payment::PaymentTransaction;
use crate::domain::ports::{MembershipStore, MembershipStoreBox};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Reacts to "transaction reached `completed`" by activating the linked
/// membership.
///
/// The rule lives here, separate from the channels that produce the
/// transition, so it behaves identically whether the completion came from a
/// gateway callback, a manual confirmation, or the reconciliation pass.
pub struct MembershipLinkage {
    memberships: MembershipStoreBox,
}

impl MembershipLinkage {
    pub fn new(memberships: MembershipStoreBox) -> Self {
        Self { memberships }
    }

    pub async fn get(&self, id: MembershipId) -> Result<Option<Membership>> {
        self.memberships.get(id).await
    }

    /// Activates the membership a completed transaction pays for.
    ///
    /// Returns `true` only when this call moved the membership to active.
    /// Already-active memberships are left alone, so replayed completion
    /// events and reconciliation sweeps stay idempotent. A dangling or
    /// mismatched membership reference is logged and skipped rather than
    /// failing the payment transition that triggered us.
    pub async fn activate_for(
        &self,
        tx: &PaymentTransaction,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(membership_id) = tx.membership_id else {
            return Ok(false);
        };
        let Some(mut membership) = self.memberships.get(membership_id).await? else {
            tracing::warn!(
                payment = %tx.id,
                membership = %membership_id,
                "completed payment references a missing membership"
            );
            return Ok(false);
        };
        if membership.member_id != tx.member_id {
            tracing::warn!(
                payment = %tx.id,
                membership = %membership_id,
                "completed payment references another member's membership"
            );
            return Ok(false);
        }

        if !membership.activate(now) {
            return Ok(false);
        }
        self.memberships.store(membership).await?;
        tracing::info!(
            payment = %tx.id,
            membership = %membership_id,
            member = %tx.member_id,
            "membership activated"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{ExternalRef, MemberId, PaymentId};
    use crate::domain::membership::MembershipStatus;
    use crate::domain::payment::{Amount, PaymentKind, PaymentMethod};
    use crate::infrastructure::in_memory::InMemoryMembershipStore;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn completed_tx(member: MemberId, membership: Option<MembershipId>) -> PaymentTransaction {
        let mut tx = PaymentTransaction::pending(
            PaymentId::from_uuid(Uuid::new_v4()),
            ExternalRef::new("pay-1"),
            member,
            membership,
            Amount::new(dec!(300.0)).unwrap(),
            PaymentMethod::Invoice,
            PaymentKind::Membership,
            Utc::now(),
        );
        tx.finalize(crate::domain::payment::PaymentTransition::completed(
            Utc::now(),
        ))
        .unwrap();
        tx
    }

    #[tokio::test]
    async fn test_activates_pending_membership_once() {
        let store = InMemoryMembershipStore::new();
        let member = MemberId::from_uuid(Uuid::new_v4());
        let membership_id = MembershipId::from_uuid(Uuid::new_v4());
        use crate::domain::ports::MembershipStore;
        store
            .store(Membership::pending(membership_id, member, "standard", 30))
            .await
            .unwrap();

        let linkage = MembershipLinkage::new(Box::new(store.clone()));
        let tx = completed_tx(member, Some(membership_id));
        let now = Utc::now();

        assert!(linkage.activate_for(&tx, now).await.unwrap());
        assert!(!linkage.activate_for(&tx, now).await.unwrap());

        let stored = store.get(membership_id).await.unwrap().unwrap();
        assert_eq!(stored.status, MembershipStatus::Active);
        assert_eq!(stored.valid_from, Some(now));
    }

    #[tokio::test]
    async fn test_missing_membership_is_skipped() {
        let linkage = MembershipLinkage::new(Box::new(InMemoryMembershipStore::new()));
        let tx = completed_tx(
            MemberId::from_uuid(Uuid::new_v4()),
            Some(MembershipId::from_uuid(Uuid::new_v4())),
        );
        assert!(!linkage.activate_for(&tx, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_transaction_without_membership_is_a_noop() {
        let linkage = MembershipLinkage::new(Box::new(InMemoryMembershipStore::new()));
        let tx = completed_tx(MemberId::from_uuid(Uuid::new_v4()), None);
        assert!(!linkage.activate_for(&tx, Utc::now()).await.unwrap());
    }
}
