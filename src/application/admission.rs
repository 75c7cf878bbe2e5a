use super::ledger::CapacityLedger;
use crate::domain::booking::{
    AttendanceOutcome, Booking, BookingStatus, WaitlistEntry, WaitlistStatus,
};
use crate::domain::ids::{Actor, BookingId, MemberId, SessionId, WaitlistEntryId};
use crate::domain::ports::{
    BookingStore, BookingStoreBox, Clock, ClockBox, IdGenerator, IdGeneratorBox, SessionStore,
    SessionStoreBox, WaitlistStore, WaitlistStoreBox,
};
use crate::domain::session::{ScheduledSession, SessionStatus};
use crate::error::{GymError, Result};
use chrono::{DateTime, TimeDelta, Utc};

/// How close to the session start a member may still cancel.
///
/// Staff cancellations waive the deadline.
#[derive(Debug, Clone, Copy)]
pub struct CancellationPolicy {
    pub window: TimeDelta,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            window: TimeDelta::hours(2),
        }
    }
}

/// A session together with its current seat and queue usage, for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOccupancy {
    pub session: ScheduledSession,
    pub confirmed: u32,
    pub waiting: u32,
}

/// Orchestrates booking admission against the capacity ledger.
///
/// The controller owns the store handles and awaits every storage operation,
/// so effects on a single session apply in a serializable order. The ledger's
/// per-session lock is the only admission serialization point; operations on
/// different sessions proceed in parallel.
pub struct AdmissionController {
    sessions: SessionStoreBox,
    bookings: BookingStoreBox,
    waitlist: WaitlistStoreBox,
    ledger: CapacityLedger,
    clock: ClockBox,
    ids: IdGeneratorBox,
    policy: CancellationPolicy,
}

impl AdmissionController {
    pub fn new(
        sessions: SessionStoreBox,
        bookings: BookingStoreBox,
        waitlist: WaitlistStoreBox,
        clock: ClockBox,
        ids: IdGeneratorBox,
    ) -> Self {
        Self {
            sessions,
            bookings,
            waitlist,
            ledger: CapacityLedger::new(),
            clock,
            ids,
            policy: CancellationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CancellationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Puts a new class occurrence on the schedule and opens its seat cell.
    pub async fn schedule_session(
        &self,
        name: &str,
        instructor: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        max_capacity: u32,
    ) -> Result<ScheduledSession> {
        let id = SessionId::from_uuid(self.ids.next_id());
        let session =
            ScheduledSession::new(id, name, instructor, starts_at, ends_at, max_capacity)?;
        self.sessions.store(session.clone()).await?;
        self.ledger.open(id, max_capacity).await;
        tracing::info!(session = %id, name, max_capacity, "session scheduled");
        Ok(session)
    }

    /// Rebuilds the seat cells from persisted sessions and their confirmed
    /// bookings. Run once at startup when the stores outlive the process.
    pub async fn restore_ledger(&self) -> Result<()> {
        for session in self.sessions.all_sessions().await? {
            let confirmed = self.bookings.confirmed_count(session.id).await?;
            self.ledger
                .open_at(session.id, session.max_capacity, confirmed)
                .await;
        }
        Ok(())
    }

    /// Admits a member into a session, taking one seat.
    ///
    /// The seat is reserved before the booking is written; if the write
    /// fails the reservation is compensated, so the counter never leaks.
    pub async fn book_class(&self, member_id: MemberId, session_id: SessionId) -> Result<Booking> {
        let session = self.require_bookable(session_id).await?;

        if let Some(existing) = self.bookings.find_active(member_id, session_id).await? {
            tracing::debug!(booking = %existing.id, "rejected duplicate booking attempt");
            return Err(GymError::AlreadyBooked {
                member: member_id,
                session: session_id,
            });
        }

        self.ledger.try_reserve(session_id).await?;

        let booking = Booking::confirmed(
            BookingId::from_uuid(self.ids.next_id()),
            member_id,
            session_id,
            self.clock.now(),
        );
        if let Err(e) = self.bookings.insert_active(booking.clone()).await {
            self.ledger.release(session_id).await?;
            return Err(e);
        }

        tracing::info!(
            booking = %booking.id,
            member = %member_id,
            session = %session_id,
            starts_at = %session.starts_at,
            "booking confirmed"
        );
        Ok(booking)
    }

    /// Cancels a confirmed booking, frees its seat, and promotes the head of
    /// the waitlist if anyone is waiting.
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        requester: Actor,
        reason: &str,
    ) -> Result<Booking> {
        let mut booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| GymError::not_found("booking", booking_id))?;

        if !requester.is_staff() && requester.id != booking.member_id {
            return Err(GymError::NotOwner);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(GymError::NotCancellable(booking.status));
        }

        let session = self
            .sessions
            .get(booking.session_id)
            .await?
            .ok_or_else(|| GymError::not_found("session", booking.session_id))?;

        let now = self.clock.now();
        if !requester.is_staff() && session.starts_at - now < self.policy.window {
            return Err(GymError::DeadlinePassed {
                starts_at: session.starts_at,
            });
        }

        booking.cancel(now, reason)?;
        self.bookings.update(booking.clone()).await?;
        self.ledger.release(booking.session_id).await?;

        tracing::info!(
            booking = %booking.id,
            member = %booking.member_id,
            session = %booking.session_id,
            reason,
            "booking cancelled"
        );

        self.promote_next(booking.session_id).await?;
        Ok(booking)
    }

    /// Queues a member for a full session.
    pub async fn join_waitlist(
        &self,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<WaitlistEntry> {
        self.require_bookable(session_id).await?;

        if self
            .bookings
            .find_active(member_id, session_id)
            .await?
            .is_some()
        {
            return Err(GymError::AlreadyBooked {
                member: member_id,
                session: session_id,
            });
        }
        if self
            .waitlist
            .find_waiting(member_id, session_id)
            .await?
            .is_some()
        {
            return Err(GymError::AlreadyWaitlisted {
                member: member_id,
                session: session_id,
            });
        }

        let entry = WaitlistEntry::waiting(
            WaitlistEntryId::from_uuid(self.ids.next_id()),
            member_id,
            session_id,
            self.clock.now(),
        );
        self.waitlist.append(entry.clone()).await?;
        tracing::info!(
            entry = %entry.id,
            member = %member_id,
            session = %session_id,
            "joined waitlist"
        );
        Ok(entry)
    }

    /// Staff close-out of a confirmed booking once the session has run.
    pub async fn mark_attendance(
        &self,
        booking_id: BookingId,
        actor: Actor,
        outcome: AttendanceOutcome,
    ) -> Result<Booking> {
        if !actor.is_staff() {
            return Err(GymError::StaffOnly);
        }
        let mut booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| GymError::not_found("booking", booking_id))?;
        booking.close_out(outcome)?;
        self.bookings.update(booking.clone()).await?;
        tracing::info!(booking = %booking.id, status = %booking.status, "attendance recorded");
        Ok(booking)
    }

    /// Converts the earliest waiting entry into a confirmed booking after a
    /// seat frees up. Promotion only writes state; the member is not
    /// involved, so an unreachable member cannot stall the queue.
    ///
    /// Losing the seat race to a fresher direct booking leaves the entry
    /// waiting for the next release. An entry whose member meanwhile holds
    /// an active booking is expired and the next entry is tried.
    async fn promote_next(&self, session_id: SessionId) -> Result<Option<Booking>> {
        loop {
            let Some(mut entry) = self.waitlist.earliest_waiting(session_id).await? else {
                return Ok(None);
            };

            match self.ledger.try_reserve(session_id).await {
                Ok(()) => {}
                Err(GymError::CapacityExceeded(_)) => return Ok(None),
                Err(e) => return Err(e),
            }

            let booking = Booking::confirmed(
                BookingId::from_uuid(self.ids.next_id()),
                entry.member_id,
                session_id,
                self.clock.now(),
            );
            match self.bookings.insert_active(booking.clone()).await {
                Ok(()) => {
                    entry.status = WaitlistStatus::Promoted;
                    self.waitlist.update(entry.clone()).await?;
                    tracing::info!(
                        entry = %entry.id,
                        booking = %booking.id,
                        member = %entry.member_id,
                        session = %session_id,
                        "waitlist entry promoted"
                    );
                    return Ok(Some(booking));
                }
                Err(GymError::AlreadyBooked { .. }) => {
                    // The member obtained a seat on their own; drop the
                    // entry and let the next waiter have the seat.
                    self.ledger.release(session_id).await?;
                    entry.status = WaitlistStatus::Expired;
                    self.waitlist.update(entry.clone()).await?;
                    tracing::warn!(
                        entry = %entry.id,
                        member = %entry.member_id,
                        "expired waitlist entry for member with an active booking"
                    );
                }
                Err(e) => {
                    self.ledger.release(session_id).await?;
                    return Err(e);
                }
            }
        }
    }

    /// Seats currently taken according to the ledger.
    pub async fn seat_count(&self, session_id: SessionId) -> Result<u32> {
        self.ledger.current_count(session_id).await
    }

    /// Per-session usage snapshot, ordered by start time.
    pub async fn occupancy(&self) -> Result<Vec<SessionOccupancy>> {
        let mut sessions = self.sessions.all_sessions().await?;
        sessions.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.name.cmp(&b.name)));

        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions {
            let confirmed = self.bookings.confirmed_count(session.id).await?;
            let waiting = self.waitlist.waiting_count(session.id).await?;
            out.push(SessionOccupancy {
                session,
                confirmed,
                waiting,
            });
        }
        Ok(out)
    }

    async fn require_bookable(&self, session_id: SessionId) -> Result<ScheduledSession> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| GymError::not_found("session", session_id))?;
        if session.status != SessionStatus::Scheduled {
            return Err(GymError::SessionClosed(session_id));
        }
        Ok(session)
    }
}
