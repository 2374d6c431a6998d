use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::{
    AuditAction, Booking, BookingAssignment, BookingId, BookingStatus, InvitationId,
    InvitationStatus, PricingBreakdown, ProviderId,
};
use super::pricing::{self, QuotedTotals};
use super::repository::{Clock, MatchingStore, ProviderDirectory, StoreError};

/// Failures raised by the accept/decline transactions. Everything here is
/// detected before or during the transactional unit, so a returned error
/// always means nothing was applied.
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("invitation not found")]
    InvitationNotFound,
    #[error("booking not found")]
    BookingNotFound,
    #[error("provider profile missing for rate lookup")]
    ProviderProfileMissing,
    #[error("invitation does not belong to the responding provider")]
    Forbidden,
    #[error("invitation was already resolved to {status}")]
    AlreadyHandled { status: &'static str },
    #[error("booking already has its full provider team")]
    AlreadyFull,
    #[error("booking is no longer accepting providers")]
    BookingNotAvailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Committed result of a successful accept.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    /// Booking state as committed, including recomputed pricing and audit log.
    pub booking: Booking,
    pub assignment: BookingAssignment,
    pub assigned_count: usize,
    pub totals: QuotedTotals,
    /// Sibling invitations expired in the same commit because capacity filled.
    pub expired_invitations: Vec<InvitationId>,
}

/// Committed result of a successful decline.
#[derive(Debug, Clone)]
pub struct DeclineOutcome {
    pub invitation_id: InvitationId,
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub short_notice: bool,
    pub responded_at: DateTime<Utc>,
}

/// The transactional core of the engine: converts invitation responses into
/// durable state while holding the booking's capacity invariant. The sole
/// writer of capacity-affecting rows.
pub struct AssignmentCoordinator<S, P> {
    store: Arc<S>,
    providers: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<S, P> AssignmentCoordinator<S, P>
where
    S: MatchingStore,
    P: ProviderDirectory,
{
    pub fn new(store: Arc<S>, providers: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            providers,
            clock,
        }
    }

    /// Accept an invitation on behalf of `responder`. Steps run as one
    /// all-or-nothing unit inside the store's per-booking critical section;
    /// replaying an accept on a resolved invitation fails `AlreadyHandled`
    /// without touching state.
    pub fn accept(
        &self,
        invitation_id: &InvitationId,
        responder: &ProviderId,
    ) -> Result<AcceptOutcome, AssignmentError> {
        let invitation = self
            .store
            .fetch_invitation(invitation_id)?
            .ok_or(AssignmentError::InvitationNotFound)?;
        if invitation.provider_id != *responder {
            warn!(
                invitation = %invitation_id.0,
                responder = %responder.0,
                "provider attempted to accept an invitation they do not own"
            );
            return Err(AssignmentError::Forbidden);
        }

        let profile = self
            .providers
            .fetch(&invitation.provider_id)?
            .ok_or(AssignmentError::ProviderProfileMissing)?;
        let now = self.clock.now();
        let booking_id = invitation.booking_id.clone();

        self.store.transact(&booking_id, |txn| {
            let index = txn
                .invitation_index(invitation_id)
                .ok_or(AssignmentError::InvitationNotFound)?;
            let required = txn.booking.required_providers as usize;
            {
                let invitation = &txn.invitations[index];
                if invitation.provider_id != *responder {
                    return Err(AssignmentError::Forbidden);
                }
                match invitation.status {
                    InvitationStatus::Pending => {}
                    InvitationStatus::Expired => {
                        // A racing accept that lost the last slot finds its
                        // invitation expired by the winner's cascade; report
                        // the capacity conflict when that is what happened.
                        if txn.booking.status.is_matchable() && txn.assignment_count() >= required
                        {
                            return Err(AssignmentError::AlreadyFull);
                        }
                        return Err(AssignmentError::AlreadyHandled {
                            status: InvitationStatus::Expired.label(),
                        });
                    }
                    other => {
                        return Err(AssignmentError::AlreadyHandled {
                            status: other.label(),
                        });
                    }
                }
            }
            if !txn.booking.status.is_matchable() {
                return Err(AssignmentError::BookingNotAvailable);
            }
            if txn.assignment_count() >= required {
                return Err(AssignmentError::AlreadyFull);
            }

            let assignment = BookingAssignment {
                booking_id: txn.booking.id.clone(),
                provider_id: responder.clone(),
                created_at: now,
            };
            txn.assignments.push(assignment.clone());
            let assigned_count = txn.assignment_count();
            if assigned_count == required {
                txn.booking.status = BookingStatus::PendingClient;
            }

            let totals = pricing::recompute(
                profile.hourly_rate_cents,
                pricing::billable_hours(&txn.booking.window),
                txn.booking.short_notice,
            );
            apply_totals(&mut txn.booking.pricing, totals, txn.booking.short_notice);

            let mut metadata = BTreeMap::new();
            metadata.insert("provider_id".to_string(), responder.0.clone());
            txn.booking.push_audit(
                responder.0.clone(),
                AuditAction::ProviderAssigned,
                metadata.clone(),
                now,
            );
            if txn.booking.short_notice {
                txn.booking.push_audit(
                    responder.0.clone(),
                    AuditAction::ShortNoticeAccepted,
                    metadata,
                    now,
                );
            }

            {
                let invitation = &mut txn.invitations[index];
                invitation.status = InvitationStatus::Accepted;
                invitation.responded_at = Some(now);
            }

            // Once the last slot fills, late siblings must not be acceptable:
            // expire them inside the same commit.
            let mut expired_invitations = Vec::new();
            if assigned_count == required {
                for sibling in txn.invitations.iter_mut() {
                    if sibling.status == InvitationStatus::Pending {
                        sibling.status = InvitationStatus::Expired;
                        sibling.responded_at = Some(now);
                        expired_invitations.push(sibling.id.clone());
                    }
                }
            }

            Ok(AcceptOutcome {
                booking: txn.booking.clone(),
                assignment,
                assigned_count,
                totals,
                expired_invitations,
            })
        })
    }

    /// Decline an invitation. Guarded by the same ownership and idempotency
    /// checks as accept; a second decline is rejected as `AlreadyHandled`.
    pub fn decline(
        &self,
        invitation_id: &InvitationId,
        responder: &ProviderId,
    ) -> Result<DeclineOutcome, AssignmentError> {
        let invitation = self
            .store
            .fetch_invitation(invitation_id)?
            .ok_or(AssignmentError::InvitationNotFound)?;
        if invitation.provider_id != *responder {
            warn!(
                invitation = %invitation_id.0,
                responder = %responder.0,
                "provider attempted to decline an invitation they do not own"
            );
            return Err(AssignmentError::Forbidden);
        }

        let now = self.clock.now();
        let booking_id = invitation.booking_id.clone();

        self.store.transact(&booking_id, |txn| {
            let index = txn
                .invitation_index(invitation_id)
                .ok_or(AssignmentError::InvitationNotFound)?;
            {
                let invitation = &txn.invitations[index];
                if invitation.provider_id != *responder {
                    return Err(AssignmentError::Forbidden);
                }
                if invitation.status.is_terminal() {
                    return Err(AssignmentError::AlreadyHandled {
                        status: invitation.status.label(),
                    });
                }
            }

            let short_notice = txn.booking.short_notice;
            if short_notice {
                let mut metadata = BTreeMap::new();
                metadata.insert("provider_id".to_string(), responder.0.clone());
                txn.booking.push_audit(
                    responder.0.clone(),
                    AuditAction::ShortNoticeDeclined,
                    metadata,
                    now,
                );
            }

            let invitation = &mut txn.invitations[index];
            invitation.status = InvitationStatus::Declined;
            invitation.responded_at = Some(now);

            Ok(DeclineOutcome {
                invitation_id: invitation.id.clone(),
                booking_id: txn.booking.id.clone(),
                provider_id: responder.clone(),
                short_notice,
                responded_at: now,
            })
        })
    }
}

/// Fold recomputed totals into the booking's stored breakdown. Short-notice
/// bookings never carry tax or eco surcharge; standard bookings keep the
/// upstream-computed columns and only refresh labor and fee.
fn apply_totals(pricing: &mut PricingBreakdown, totals: QuotedTotals, short_notice: bool) {
    pricing.subtotal_cents = totals.labor_cents;
    pricing.platform_fee_cents = totals.fee_cents;
    if short_notice {
        pricing.eco_surcharge_cents = 0;
        pricing.tax_cents = 0;
    }
    pricing.total_cents = pricing.subtotal_cents
        + pricing.eco_surcharge_cents
        + pricing.platform_fee_cents
        + pricing.tax_cents;
}
