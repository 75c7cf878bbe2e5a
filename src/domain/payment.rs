use super::ids::{ExternalRef, MemberId, MembershipId, PaymentId};
use crate::error::{GymError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a positive monetary amount for payments.
///
/// Wraps `rust_decimal::Decimal` so that zero and negative amounts are
/// rejected at construction instead of deep inside the processing path.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(GymError::Validation("amount must be positive".to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = GymError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Invoice,
    VirtualAccount,
    Qris,
    Ewallet,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Invoice => "invoice",
            PaymentMethod::VirtualAccount => "virtual-account",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Ewallet => "ewallet",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Membership,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Terminal statuses absorb all later events.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Evidence attached by a member for a pending manual review.
///
/// Only metadata is kept here; the file body lives with the upload
/// collaborator outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProof {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Record of a staff member manually finalizing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualAction {
    pub actor: MemberId,
    pub notes: String,
    pub at: DateTime<Utc>,
}

/// The fields a terminal transition writes, applied atomically by the
/// payment store's compare-and-set.
#[derive(Debug, Clone)]
pub struct PaymentTransition {
    pub to: PaymentStatus,
    pub gateway_data: Option<serde_json::Value>,
    pub manual_action: Option<ManualAction>,
    pub failure: Option<String>,
    pub at: DateTime<Utc>,
}

impl PaymentTransition {
    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            to: PaymentStatus::Completed,
            gateway_data: None,
            manual_action: None,
            failure: None,
            at,
        }
    }

    pub fn failed(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            to: PaymentStatus::Failed,
            gateway_data: None,
            manual_action: None,
            failure: Some(reason.into()),
            at,
        }
    }

    pub fn cancelled(at: DateTime<Utc>) -> Self {
        Self {
            to: PaymentStatus::Cancelled,
            gateway_data: None,
            manual_action: None,
            failure: None,
            at,
        }
    }

    pub fn with_gateway_data(mut self, data: serde_json::Value) -> Self {
        self.gateway_data = Some(data);
        self
    }

    pub fn with_manual_action(mut self, action: ManualAction) -> Self {
        self.manual_action = Some(action);
        self
    }
}

/// One payment moving through `pending -> {completed | failed | cancelled}`.
///
/// The status field is the serialization point for the three entry channels
/// (direct initiation, gateway callback, manual staff action): whichever
/// channel's compare-and-set observes `pending` first wins the transition,
/// and the record never leaves a terminal status afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: PaymentId,
    pub external_ref: ExternalRef,
    pub member_id: MemberId,
    pub membership_id: Option<MembershipId>,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    /// Opaque payload attached by whichever channel last touched the record.
    pub gateway_data: Option<serde_json::Value>,
    pub proof: Option<PaymentProof>,
    pub manual_action: Option<ManualAction>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn pending(
        id: PaymentId,
        external_ref: ExternalRef,
        member_id: MemberId,
        membership_id: Option<MembershipId>,
        amount: Amount,
        method: PaymentMethod,
        kind: PaymentKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            external_ref,
            member_id,
            membership_id,
            amount,
            method,
            kind,
            status: PaymentStatus::Pending,
            gateway_data: None,
            proof: None,
            manual_action: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a terminal transition. Callers must have checked the current
    /// status under the store's lock; a terminal record rejects the change.
    pub fn finalize(&mut self, transition: PaymentTransition) -> Result<()> {
        if self.status.is_terminal() {
            return Err(GymError::AlreadyFinalized(self.status));
        }
        if !transition.to.is_terminal() {
            return Err(GymError::Validation(
                "payment transitions must target a terminal status".to_string(),
            ));
        }
        self.status = transition.to;
        if let Some(data) = transition.gateway_data {
            self.gateway_data = Some(data);
        }
        if let Some(action) = transition.manual_action {
            self.manual_action = Some(action);
        }
        self.failure = transition.failure;
        self.updated_at = transition.at;
        Ok(())
    }
}

/// What a gateway callback says happened to the payment on the gateway side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    Paid,
    Settled,
    Expired,
    Failed,
    /// A status keyword this core does not act on; logged and acknowledged
    /// so the gateway stops redelivering.
    Unrecognized(String),
}

impl GatewayEventKind {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_uppercase().as_str() {
            "PAID" => GatewayEventKind::Paid,
            "SETTLED" => GatewayEventKind::Settled,
            "EXPIRED" => GatewayEventKind::Expired,
            "FAILED" => GatewayEventKind::Failed,
            _ => GatewayEventKind::Unrecognized(keyword.to_string()),
        }
    }
}

/// An authenticated, decoded gateway callback.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub external_ref: ExternalRef,
    pub kind: GatewayEventKind,
    pub amount: Option<Decimal>,
    /// The raw callback body, retained as the transaction's gateway metadata.
    pub payload: serde_json::Value,
}

/// Data handed to the notification sender when a payment completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub member_id: MemberId,
    pub amount: Amount,
    pub reference: ExternalRef,
    pub membership_id: Option<MembershipId>,
    pub paid_at: DateTime<Utc>,
}
