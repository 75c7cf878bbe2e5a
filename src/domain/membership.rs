use super::ids::{MemberId, MembershipId};
use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Active => "active",
            MembershipStatus::Cancelled => "cancelled",
            MembershipStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// A member's plan subscription.
///
/// Created pending at signup or renewal intent. Becomes active only as a
/// reaction to exactly one payment transaction reaching `completed` for it;
/// the validity window is stamped from the plan duration at activation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub member_id: MemberId,
    pub plan: String,
    pub plan_days: u32,
    pub status: MembershipStatus,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn pending(
        id: MembershipId,
        member_id: MemberId,
        plan: impl Into<String>,
        plan_days: u32,
    ) -> Self {
        Self {
            id,
            member_id,
            plan: plan.into(),
            plan_days,
            status: MembershipStatus::Pending,
            valid_from: None,
            valid_until: None,
        }
    }

    /// Activates a pending membership, stamping the validity window.
    ///
    /// Returns `true` only when this call performed the transition; an
    /// already-active membership is left untouched so duplicate activation
    /// events stay idempotent. Cancelled and expired memberships are never
    /// revived.
    pub fn activate(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != MembershipStatus::Pending {
            return false;
        }
        self.status = MembershipStatus::Active;
        self.valid_from = Some(now);
        self.valid_until = now.checked_add_days(Days::new(u64::from(self.plan_days)));
        true
    }
}
