use chrono::{DateTime, Utc};

use super::assignment::AssignmentError;
use super::domain::{
    Booking, BookingAssignment, BookingId, BookingInvitation, InvitationId, ProviderId,
    ProviderProfile,
};
use super::scoring::BookingCriteria;

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Mutable view over one booking's capacity-affecting rows, handed to the
/// accept/decline transaction body. The store materializes it inside the
/// booking's critical section and writes it back only on `Ok`.
#[derive(Debug, Clone)]
pub struct BookingTxn {
    pub booking: Booking,
    pub invitations: Vec<BookingInvitation>,
    pub assignments: Vec<BookingAssignment>,
}

impl BookingTxn {
    pub fn invitation_index(&self, id: &InvitationId) -> Option<usize> {
        self.invitations
            .iter()
            .position(|invitation| invitation.id == *id)
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn has_assignment_for(&self, provider: &ProviderId) -> bool {
        self.assignments
            .iter()
            .any(|assignment| assignment.provider_id == *provider)
    }
}

/// Storage abstraction for bookings, invitations, and assignments so the
/// engine can be exercised in isolation.
pub trait MatchingStore: Send + Sync {
    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError>;
    fn fetch_invitation(&self, id: &InvitationId) -> Result<Option<BookingInvitation>, StoreError>;
    fn invitations_for(&self, booking: &BookingId) -> Result<Vec<BookingInvitation>, StoreError>;
    fn assignments_for(&self, booking: &BookingId) -> Result<Vec<BookingAssignment>, StoreError>;
    fn insert_booking(&self, booking: Booking) -> Result<(), StoreError>;
    fn insert_invitation(&self, invitation: BookingInvitation) -> Result<(), StoreError>;

    /// Run `body` against the booking's matchable state under an exclusive
    /// per-booking critical section. Mutations made through the transaction
    /// view become durable only when `body` returns `Ok`; any error aborts
    /// the whole unit with nothing applied.
    fn transact<T, F>(&self, booking: &BookingId, body: F) -> Result<T, AssignmentError>
    where
        F: FnOnce(&mut BookingTxn) -> Result<T, AssignmentError>;
}

/// Read side of the provider roster. Implementations apply the eligibility
/// filters (service category, active flag, payout readiness, service zone)
/// so the scorer only sees plausible candidates.
pub trait ProviderDirectory: Send + Sync {
    fn eligible(&self, criteria: &BookingCriteria) -> Result<Vec<ProviderProfile>, StoreError>;
    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError>;
}

/// Injectable time source so transaction timestamps and cache expiry are
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside of tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
