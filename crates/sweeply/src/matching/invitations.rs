use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::domain::{
    Booking, BookingId, BookingInvitation, BookingStatus, InvitationId, InvitationStatus,
};
use super::repository::{Clock, MatchingStore, StoreError};
use super::scoring::RankedCandidate;

/// Errors raised while issuing invitations.
#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    #[error("booking not found")]
    BookingNotFound,
    #[error("booking is not open for matching (status {status})")]
    BookingNotOpen { status: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
}

static INVITATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_invitation_id() -> InvitationId {
    let id = INVITATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    InvitationId(format!("inv-{id:06}"))
}

/// Creates pending invitations for the top-ranked candidates of a booking.
/// Providers already invited (in any state) or already assigned are skipped,
/// which also keeps the one-pending-invitation-per-provider invariant.
pub struct InvitationIssuer<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: MatchingStore> InvitationIssuer<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn issue(
        &self,
        booking: &Booking,
        ranked: &[RankedCandidate],
        fanout: usize,
    ) -> Result<Vec<BookingInvitation>, InvitationError> {
        if booking.status != BookingStatus::PendingProvider {
            return Err(InvitationError::BookingNotOpen {
                status: booking.status.label(),
            });
        }

        let existing = self.store.invitations_for(&booking.id)?;
        let assigned = self.store.assignments_for(&booking.id)?;
        let now = self.clock.now();

        let mut created = Vec::new();
        for candidate in ranked {
            if created.len() == fanout {
                break;
            }
            let already_invited = existing
                .iter()
                .any(|invitation| invitation.provider_id == candidate.provider_id);
            let already_assigned = assigned
                .iter()
                .any(|assignment| assignment.provider_id == candidate.provider_id);
            if already_invited || already_assigned {
                continue;
            }

            let invitation = BookingInvitation {
                id: next_invitation_id(),
                booking_id: booking.id.clone(),
                provider_id: candidate.provider_id.clone(),
                status: InvitationStatus::Pending,
                created_at: now,
                responded_at: None,
            };
            self.store.insert_invitation(invitation.clone())?;
            created.push(invitation);
        }

        Ok(created)
    }

    pub(crate) fn existing_counts(&self, booking: &BookingId) -> Result<usize, InvitationError> {
        let invited = self.store.invitations_for(booking)?.len();
        let assigned = self.store.assignments_for(booking)?.len();
        Ok(invited + assigned)
    }
}
