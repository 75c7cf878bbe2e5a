use crate::domain::booking::BookingStatus;
use crate::domain::ids::{MemberId, SessionId};
use crate::domain::payment::{PaymentMethod, PaymentStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GymError>;

/// Errors surfaced by the booking and payment core.
///
/// Variants group into the taxonomy callers dispatch on: validation failures
/// (rejected before touching state), business-rule conflicts (safe to retry
/// with different input), authorization failures, missing entities, and
/// external-service failures. Idempotent duplicates are not errors and are
/// reported through [`crate::application::payments::Applied`] instead.
#[derive(Error, Debug)]
pub enum GymError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("session {0} is not open for booking")]
    SessionClosed(SessionId),

    #[error("session {0} is at capacity")]
    CapacityExceeded(SessionId),

    #[error("member {member} already has an active booking for session {session}")]
    AlreadyBooked { member: MemberId, session: SessionId },

    #[error("member {member} is already waitlisted for session {session}")]
    AlreadyWaitlisted { member: MemberId, session: SessionId },

    #[error("cancellation window has closed for session starting at {starts_at}")]
    DeadlinePassed { starts_at: DateTime<Utc> },

    #[error("booking is {0} and cannot be cancelled")]
    NotCancellable(BookingStatus),

    #[error("booking is {0}, expected confirmed")]
    NotConfirmed(BookingStatus),

    #[error("payment is already {0}")]
    AlreadyFinalized(PaymentStatus),

    #[error("requester is not the owner of this booking")]
    NotOwner,

    #[error("operation requires a staff actor")]
    StaffOnly,

    #[error("webhook signature verification failed")]
    InvalidSignature,

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("unsupported payment method: {0}")]
    UnsupportedMethod(PaymentMethod),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl GymError {
    pub fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for GymError {
    fn from(e: rocksdb::Error) -> Self {
        GymError::Internal(Box::new(e))
    }
}
