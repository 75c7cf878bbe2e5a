use crate::domain::booking::{Booking, BookingStatus, WaitlistEntry, WaitlistStatus};
use crate::domain::ids::{BookingId, ExternalRef, MemberId, MembershipId, PaymentId, SessionId};
use crate::domain::membership::Membership;
use crate::domain::payment::{PaymentProof, PaymentTransaction, PaymentTransition};
use crate::domain::ports::{
    BookingStore, Cas, MembershipStore, PaymentStore, SessionStore, WaitlistStore,
};
use crate::domain::session::ScheduledSession;
use crate::error::{GymError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for scheduled sessions.
pub const CF_SESSIONS: &str = "sessions";
/// Column Family for bookings.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family for waitlist entries.
pub const CF_WAITLIST: &str = "waitlist";
/// Column Family for payment transactions.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for memberships.
pub const CF_MEMBERSHIPS: &str = "memberships";

/// A persistent store implementation using RocksDB.
///
/// One Column Family per entity, `serde_json` values, UUID-byte keys. The
/// struct is thread-safe; `Clone` shares the underlying `Arc<DB>`.
///
/// RocksDB has no row locks, so the read-modify-write sections (the payment
/// status compare-and-set and the unique-active-booking insert) serialize on
/// an internal mutex. That guard is per-process, which matches this store's
/// single-writer deployment.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all entity column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_SESSIONS,
            CF_BOOKINGS,
            CF_WAITLIST,
            CF_PAYMENTS,
            CF_MEMBERSHIPS,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            GymError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl SessionStore for RocksDBStore {
    async fn store(&self, session: ScheduledSession) -> Result<()> {
        self.put(CF_SESSIONS, session.id.as_uuid().as_bytes(), &session)
    }

    async fn get(&self, id: SessionId) -> Result<Option<ScheduledSession>> {
        self.fetch(CF_SESSIONS, id.as_uuid().as_bytes())
    }

    async fn all_sessions(&self) -> Result<Vec<ScheduledSession>> {
        self.scan(CF_SESSIONS)
    }
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn insert_active(&self, booking: Booking) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let conflict = self
            .scan::<Booking>(CF_BOOKINGS)?
            .into_iter()
            .any(|b| {
                b.member_id == booking.member_id
                    && b.session_id == booking.session_id
                    && b.status == BookingStatus::Confirmed
            });
        if conflict {
            return Err(GymError::AlreadyBooked {
                member: booking.member_id,
                session: booking.session_id,
            });
        }
        self.put(CF_BOOKINGS, booking.id.as_uuid().as_bytes(), &booking)
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        self.fetch(CF_BOOKINGS, id.as_uuid().as_bytes())
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        self.put(CF_BOOKINGS, booking.id.as_uuid().as_bytes(), &booking)
    }

    async fn find_active(
        &self,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<Option<Booking>> {
        Ok(self.scan::<Booking>(CF_BOOKINGS)?.into_iter().find(|b| {
            b.member_id == member_id
                && b.session_id == session_id
                && b.status == BookingStatus::Confirmed
        }))
    }

    async fn confirmed_count(&self, session_id: SessionId) -> Result<u32> {
        Ok(self
            .scan::<Booking>(CF_BOOKINGS)?
            .into_iter()
            .filter(|b| b.session_id == session_id && b.status == BookingStatus::Confirmed)
            .count() as u32)
    }
}

#[async_trait]
impl WaitlistStore for RocksDBStore {
    async fn append(&self, entry: WaitlistEntry) -> Result<()> {
        self.put(CF_WAITLIST, entry.id.as_uuid().as_bytes(), &entry)
    }

    async fn update(&self, entry: WaitlistEntry) -> Result<()> {
        if self
            .fetch::<WaitlistEntry>(CF_WAITLIST, entry.id.as_uuid().as_bytes())?
            .is_none()
        {
            return Err(GymError::not_found("waitlist entry", entry.id));
        }
        self.put(CF_WAITLIST, entry.id.as_uuid().as_bytes(), &entry)
    }

    async fn find_waiting(
        &self,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<Option<WaitlistEntry>> {
        Ok(self
            .scan::<WaitlistEntry>(CF_WAITLIST)?
            .into_iter()
            .find(|e| {
                e.member_id == member_id
                    && e.session_id == session_id
                    && e.status == WaitlistStatus::Waiting
            }))
    }

    async fn earliest_waiting(&self, session_id: SessionId) -> Result<Option<WaitlistEntry>> {
        Ok(self
            .scan::<WaitlistEntry>(CF_WAITLIST)?
            .into_iter()
            .filter(|e| e.session_id == session_id && e.status == WaitlistStatus::Waiting)
            .min_by_key(|e| e.joined_at))
    }

    async fn waiting_count(&self, session_id: SessionId) -> Result<u32> {
        Ok(self
            .scan::<WaitlistEntry>(CF_WAITLIST)?
            .into_iter()
            .filter(|e| e.session_id == session_id && e.status == WaitlistStatus::Waiting)
            .count() as u32)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, tx: PaymentTransaction) -> Result<()> {
        self.put(CF_PAYMENTS, tx.id.as_uuid().as_bytes(), &tx)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentTransaction>> {
        self.fetch(CF_PAYMENTS, id.as_uuid().as_bytes())
    }

    async fn get_by_external_ref(
        &self,
        external_ref: &ExternalRef,
    ) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .scan::<PaymentTransaction>(CF_PAYMENTS)?
            .into_iter()
            .find(|tx| &tx.external_ref == external_ref))
    }

    async fn transition(&self, id: PaymentId, transition: PaymentTransition) -> Result<Cas> {
        let _guard = self.write_guard.lock().await;
        let mut tx = self
            .fetch::<PaymentTransaction>(CF_PAYMENTS, id.as_uuid().as_bytes())?
            .ok_or_else(|| GymError::not_found("payment", id))?;
        if tx.is_terminal() {
            return Ok(Cas::AlreadyTerminal(tx));
        }
        tx.finalize(transition)?;
        self.put(CF_PAYMENTS, tx.id.as_uuid().as_bytes(), &tx)?;
        Ok(Cas::Applied(tx))
    }

    async fn set_gateway_data(
        &self,
        id: PaymentId,
        data: serde_json::Value,
    ) -> Result<PaymentTransaction> {
        let _guard = self.write_guard.lock().await;
        let mut tx = self
            .fetch::<PaymentTransaction>(CF_PAYMENTS, id.as_uuid().as_bytes())?
            .ok_or_else(|| GymError::not_found("payment", id))?;
        tx.gateway_data = Some(data);
        self.put(CF_PAYMENTS, tx.id.as_uuid().as_bytes(), &tx)?;
        Ok(tx)
    }

    async fn set_proof(&self, id: PaymentId, proof: PaymentProof) -> Result<PaymentTransaction> {
        let _guard = self.write_guard.lock().await;
        let mut tx = self
            .fetch::<PaymentTransaction>(CF_PAYMENTS, id.as_uuid().as_bytes())?
            .ok_or_else(|| GymError::not_found("payment", id))?;
        tx.proof = Some(proof);
        self.put(CF_PAYMENTS, tx.id.as_uuid().as_bytes(), &tx)?;
        Ok(tx)
    }

    async fn all_payments(&self) -> Result<Vec<PaymentTransaction>> {
        self.scan(CF_PAYMENTS)
    }
}

#[async_trait]
impl MembershipStore for RocksDBStore {
    async fn store(&self, membership: Membership) -> Result<()> {
        self.put(
            CF_MEMBERSHIPS,
            membership.id.as_uuid().as_bytes(),
            &membership,
        )
    }

    async fn get(&self, id: MembershipId) -> Result<Option<Membership>> {
        self.fetch(CF_MEMBERSHIPS, id.as_uuid().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, PaymentKind, PaymentMethod, PaymentStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_rocksdb_opens_all_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in [
            CF_SESSIONS,
            CF_BOOKINGS,
            CF_WAITLIST,
            CF_PAYMENTS,
            CF_MEMBERSHIPS,
        ] {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_booking_unique_active_pair() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let member = MemberId::from_uuid(Uuid::new_v4());
        let session = SessionId::from_uuid(Uuid::new_v4());
        let booking = Booking::confirmed(
            BookingId::from_uuid(Uuid::new_v4()),
            member,
            session,
            Utc::now(),
        );
        store.insert_active(booking.clone()).await.unwrap();

        let duplicate = Booking::confirmed(
            BookingId::from_uuid(Uuid::new_v4()),
            member,
            session,
            Utc::now(),
        );
        assert!(matches!(
            store.insert_active(duplicate).await,
            Err(GymError::AlreadyBooked { .. })
        ));

        let found = store.find_active(member, session).await.unwrap().unwrap();
        assert_eq!(found.id, booking.id);
        assert_eq!(store.confirmed_count(session).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_payment_cas_is_monotonic() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let tx = PaymentTransaction::pending(
            PaymentId::from_uuid(Uuid::new_v4()),
            ExternalRef::new("gym-rocks"),
            MemberId::from_uuid(Uuid::new_v4()),
            None,
            Amount::new(dec!(42.0)).unwrap(),
            PaymentMethod::Invoice,
            PaymentKind::Other,
            Utc::now(),
        );
        PaymentStore::insert(&store, tx.clone()).await.unwrap();

        let won = store
            .transition(tx.id, PaymentTransition::completed(Utc::now()))
            .await
            .unwrap();
        assert!(matches!(won, Cas::Applied(ref t) if t.status == PaymentStatus::Completed));

        let lost = store
            .transition(tx.id, PaymentTransition::failed("late", Utc::now()))
            .await
            .unwrap();
        assert!(
            matches!(lost, Cas::AlreadyTerminal(ref t) if t.status == PaymentStatus::Completed)
        );

        let by_ref = store
            .get_by_external_ref(&ExternalRef::new("gym-rocks"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ref.status, PaymentStatus::Completed);
    }
}
