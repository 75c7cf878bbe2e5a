use super::ids::{BookingId, MemberId, SessionId, WaitlistEntryId};
use crate::error::{GymError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    /// Terminal statuses are never left once entered.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no-show",
        };
        write!(f, "{s}")
    }
}

/// How a confirmed booking is settled when staff close out a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceOutcome {
    Attended,
    NoShow,
}

/// One member's claim on one session.
///
/// Bookings are retained for audit after they reach a terminal status; they
/// are never physically deleted. At most one *active* (confirmed) booking may
/// exist per (member, session) pair, enforced at the store boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub member_id: MemberId,
    pub session_id: SessionId,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl Booking {
    /// A booking admitted under the immediate-confirm model: capacity is
    /// taken at admission time and the record is persisted already confirmed.
    pub fn confirmed(
        id: BookingId,
        member_id: MemberId,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            member_id,
            session_id,
            status: BookingStatus::Confirmed,
            created_at: now,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn cancel(&mut self, now: DateTime<Utc>, reason: impl Into<String>) -> Result<()> {
        if self.status != BookingStatus::Confirmed {
            return Err(GymError::NotCancellable(self.status));
        }
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason.into());
        Ok(())
    }

    pub fn close_out(&mut self, outcome: AttendanceOutcome) -> Result<()> {
        if self.status != BookingStatus::Confirmed {
            return Err(GymError::NotConfirmed(self.status));
        }
        self.status = match outcome {
            AttendanceOutcome::Attended => BookingStatus::Completed,
            AttendanceOutcome::NoShow => BookingStatus::NoShow,
        };
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitlistStatus {
    Waiting,
    Promoted,
    Expired,
}

/// A member queued for a seat in a full session, promoted strictly FIFO by
/// `joined_at` when capacity frees up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: WaitlistEntryId,
    pub member_id: MemberId,
    pub session_id: SessionId,
    pub status: WaitlistStatus,
    pub joined_at: DateTime<Utc>,
}

impl WaitlistEntry {
    pub fn waiting(
        id: WaitlistEntryId,
        member_id: MemberId,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            member_id,
            session_id,
            status: WaitlistStatus::Waiting,
            joined_at: now,
        }
    }
}
