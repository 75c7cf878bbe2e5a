use super::ids::SessionId;
use crate::error::{GymError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::InProgress => "in-progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One occurrence of a class on the schedule.
///
/// Capacity is a hard constraint: the number of confirmed bookings for a
/// session never exceeds `max_capacity`. The seat count itself lives in the
/// capacity ledger and is only mutated inside the admission path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub id: SessionId,
    pub name: String,
    pub instructor: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_capacity: u32,
    pub status: SessionStatus,
}

impl ScheduledSession {
    pub fn new(
        id: SessionId,
        name: impl Into<String>,
        instructor: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        max_capacity: u32,
    ) -> Result<Self> {
        if max_capacity == 0 {
            return Err(GymError::Validation(
                "session capacity must be at least 1".to_string(),
            ));
        }
        if ends_at <= starts_at {
            return Err(GymError::Validation(
                "session must end after it starts".to_string(),
            ));
        }
        Ok(Self {
            id,
            name: name.into(),
            instructor: instructor.into(),
            starts_at,
            ends_at,
            max_capacity,
            status: SessionStatus::Scheduled,
        })
    }

    /// Whether the session still accepts bookings and waitlist joins.
    pub fn is_bookable(&self) -> bool {
        self.status == SessionStatus::Scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use uuid::Uuid;

    fn session_id() -> SessionId {
        SessionId::from_uuid(Uuid::new_v4())
    }

    #[test]
    fn test_session_rejects_zero_capacity() {
        let start = Utc::now();
        let result = ScheduledSession::new(
            session_id(),
            "Yoga",
            "Dina",
            start,
            start + TimeDelta::hours(1),
            0,
        );
        assert!(matches!(result, Err(GymError::Validation(_))));
    }

    #[test]
    fn test_session_rejects_inverted_window() {
        let start = Utc::now();
        let result = ScheduledSession::new(
            session_id(),
            "Yoga",
            "Dina",
            start,
            start - TimeDelta::minutes(30),
            10,
        );
        assert!(matches!(result, Err(GymError::Validation(_))));
    }

    #[test]
    fn test_only_scheduled_sessions_are_bookable() {
        let start = Utc::now();
        let mut session = ScheduledSession::new(
            session_id(),
            "Spin",
            "Marco",
            start,
            start + TimeDelta::hours(1),
            5,
        )
        .unwrap();
        assert!(session.is_bookable());

        session.status = SessionStatus::Cancelled;
        assert!(!session.is_bookable());
    }
}
