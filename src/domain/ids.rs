use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a gym member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(Uuid);

/// Unique identifier for a scheduled class session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

/// Unique identifier for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

/// Unique identifier for a waitlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitlistEntryId(Uuid);

/// Unique identifier for a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(Uuid);

/// Unique identifier for a membership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipId(Uuid);

macro_rules! uuid_id_impls {
    ($($name:ident),+) => {
        $(
            impl $name {
                pub const fn from_uuid(uuid: Uuid) -> Self {
                    Self(uuid)
                }

                pub const fn as_uuid(&self) -> &Uuid {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

uuid_id_impls!(
    MemberId,
    SessionId,
    BookingId,
    WaitlistEntryId,
    PaymentId,
    MembershipId
);

/// Correlation handle the payment gateway uses to reference a transaction.
///
/// Assigned at initiation and echoed back in gateway callbacks as
/// `external_id` / `reference_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef(String);

impl ExternalRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role attached to the authenticated actor by the identity boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Staff,
}

/// The authenticated caller of an operation.
///
/// Identity and role come from the surrounding authorization layer; this core
/// only distinguishes members from staff (deadline waiver, manual payment
/// actions, attendance close-out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: MemberId,
    pub role: Role,
}

impl Actor {
    pub const fn member(id: MemberId) -> Self {
        Self {
            id,
            role: Role::Member,
        }
    }

    pub const fn staff(id: MemberId) -> Self {
        Self {
            id,
            role: Role::Staff,
        }
    }

    pub const fn is_staff(&self) -> bool {
        matches!(self.role, Role::Staff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_roundtrip() {
        let uuid = Uuid::new_v4();
        let id = MemberId::from_uuid(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
        assert_eq!(id.as_uuid(), &uuid);
    }

    #[test]
    fn test_actor_roles() {
        let id = MemberId::from_uuid(Uuid::new_v4());
        assert!(Actor::staff(id).is_staff());
        assert!(!Actor::member(id).is_staff());
    }
}
