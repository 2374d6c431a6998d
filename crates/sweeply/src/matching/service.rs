use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use super::assignment::{AcceptOutcome, AssignmentCoordinator, AssignmentError, DeclineOutcome};
use super::domain::{AuditAction, BookingId, BookingInvitation, InvitationId, ProviderId};
use super::invitations::{InvitationError, InvitationIssuer};
use super::notify::{
    MatchingEvent, NotificationDispatcher, NotificationPayload, PaymentAdjuster,
};
use super::repository::{Clock, MatchingStore, ProviderDirectory, StoreError, SystemClock};
use super::scoring::{
    BookingCriteria, CandidateScorer, CriteriaError, MatchingConfig, MatchingConfigStore,
    RankedCandidate,
};

/// Error raised by the matching service facade.
#[derive(Debug, thiserror::Error)]
pub enum MatchingServiceError {
    #[error(transparent)]
    Criteria(#[from] CriteriaError),
    #[error(transparent)]
    Invitation(#[from] InvitationError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Facade composing the scorer, invitation issuer, and assignment
/// coordinator. The transactional core commits first; notification and
/// payment side effects run afterwards with their failures isolated here.
pub struct MatchingService<S, P, N, Y> {
    store: Arc<S>,
    providers: Arc<P>,
    notifier: Arc<N>,
    payments: Arc<Y>,
    config: Arc<MatchingConfigStore>,
    issuer: InvitationIssuer<S>,
    coordinator: AssignmentCoordinator<S, P>,
    clock: Arc<dyn Clock>,
}

impl<S, P, N, Y> MatchingService<S, P, N, Y>
where
    S: MatchingStore + 'static,
    P: ProviderDirectory + 'static,
    N: NotificationDispatcher + 'static,
    Y: PaymentAdjuster + 'static,
{
    pub fn new(
        store: Arc<S>,
        providers: Arc<P>,
        notifier: Arc<N>,
        payments: Arc<Y>,
        config: MatchingConfig,
    ) -> Self {
        Self::with_clock(
            store,
            providers,
            notifier,
            payments,
            config,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        store: Arc<S>,
        providers: Arc<P>,
        notifier: Arc<N>,
        payments: Arc<Y>,
        config: MatchingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = InvitationIssuer::new(store.clone(), clock.clone());
        let coordinator =
            AssignmentCoordinator::new(store.clone(), providers.clone(), clock.clone());

        Self {
            store,
            providers,
            notifier,
            payments,
            config: Arc::new(MatchingConfigStore::new(config)),
            issuer,
            coordinator,
            clock,
        }
    }

    pub fn config_store(&self) -> Arc<MatchingConfigStore> {
        self.config.clone()
    }

    /// Rank eligible providers for the given criteria. Pure read path.
    pub fn score_candidates(
        &self,
        criteria: &BookingCriteria,
        limit: usize,
    ) -> Result<Vec<RankedCandidate>, MatchingServiceError> {
        let (config, _version) = self.config.snapshot();
        let providers = self.providers.eligible(criteria)?;
        let ranked = CandidateScorer::score(criteria, &providers, &config, limit)?;
        Ok(ranked)
    }

    /// Score the booking's market and create up to `fanout` pending
    /// invitations for the best candidates not already invited or assigned.
    pub fn issue_invitations(
        &self,
        booking_id: &BookingId,
        fanout: usize,
    ) -> Result<Vec<BookingInvitation>, MatchingServiceError> {
        let booking = self
            .store
            .fetch_booking(booking_id)?
            .ok_or(InvitationError::BookingNotFound)?;
        let criteria = BookingCriteria::from_booking(&booking);

        // Score beyond the fanout so suppressed candidates (already invited
        // or assigned) cannot starve it.
        let limit = fanout + self.issuer.existing_counts(booking_id)?;
        let ranked = self.score_candidates(&criteria, limit)?;
        let created = self.issuer.issue(&booking, &ranked, fanout)?;

        if !created.is_empty() {
            let now = self.clock.now();
            let invited: Vec<&str> = created
                .iter()
                .map(|invitation| invitation.provider_id.0.as_str())
                .collect();
            let mut metadata = BTreeMap::new();
            metadata.insert(
                "event".to_string(),
                MatchingEvent::InvitationsIssued.label().to_string(),
            );
            metadata.insert("count".to_string(), created.len().to_string());
            metadata.insert("providers".to_string(), invited.join(","));

            self.store.transact(booking_id, |txn| {
                txn.booking.push_audit(
                    "matching_engine",
                    AuditAction::InvitationsIssued,
                    metadata.clone(),
                    now,
                );
                Ok(())
            })?;

            let payload = NotificationPayload {
                booking_id: booking.id.clone(),
                provider_id: None,
                details: metadata,
            };
            if let Err(err) = self.notifier.notify_matching_progress(&booking, &payload) {
                warn!(booking = %booking.id.0, error = %err, "invitation progress notification failed");
            }
        }

        Ok(created)
    }

    /// Accept an invitation; on success fire the post-commit side effects.
    pub fn accept_invitation(
        &self,
        invitation_id: &InvitationId,
        provider_id: &ProviderId,
    ) -> Result<AcceptOutcome, MatchingServiceError> {
        let outcome = self.coordinator.accept(invitation_id, provider_id)?;
        self.after_accept(&outcome);
        Ok(outcome)
    }

    /// Decline an invitation; watchers are informed, the client is not.
    pub fn decline_invitation(
        &self,
        invitation_id: &InvitationId,
        provider_id: &ProviderId,
    ) -> Result<DeclineOutcome, MatchingServiceError> {
        let outcome = self.coordinator.decline(invitation_id, provider_id)?;
        self.after_decline(&outcome);
        Ok(outcome)
    }

    /// Best-effort side effects after a committed accept. The assignment is
    /// already the source of truth; a failure here is logged, never unwound.
    fn after_accept(&self, outcome: &AcceptOutcome) {
        let booking = &outcome.booking;
        let provider = &outcome.assignment.provider_id;

        let mut details = BTreeMap::new();
        details.insert(
            "assigned".to_string(),
            outcome.assigned_count.to_string(),
        );
        details.insert(
            "required".to_string(),
            booking.required_providers.to_string(),
        );
        details.insert(
            "total_cents".to_string(),
            outcome.totals.total_cents.to_string(),
        );
        let payload = NotificationPayload {
            booking_id: booking.id.clone(),
            provider_id: Some(provider.clone()),
            details,
        };

        if let Err(err) =
            self.notifier
                .notify_participants(booking, MatchingEvent::ProviderAssigned, &payload)
        {
            warn!(booking = %booking.id.0, error = %err, "participant notification failed");
        }

        if booking.short_notice {
            let mut ops_payload = payload.clone();
            ops_payload.details.insert(
                "event".to_string(),
                MatchingEvent::ShortNoticeAccepted.label().to_string(),
            );
            if let Err(err) = self.notifier.notify_matching_progress(booking, &ops_payload) {
                warn!(booking = %booking.id.0, error = %err, "ops notification failed");
            }
        }

        if let Err(err) = self.payments.adjust_held_amount(
            &booking.id,
            outcome.totals.total_cents,
            outcome.totals.fee_cents,
        ) {
            warn!(booking = %booking.id.0, error = %err, "payment adjustment failed");
        }

        if booking.client_contact.is_some() {
            if let Err(err) = self.notifier.notify_participants(
                booking,
                MatchingEvent::ClientConfirmation,
                &payload,
            ) {
                warn!(booking = %booking.id.0, error = %err, "client confirmation enqueue failed");
            }
        }
    }

    fn after_decline(&self, outcome: &DeclineOutcome) {
        let booking = match self.store.fetch_booking(&outcome.booking_id) {
            Ok(Some(booking)) => booking,
            Ok(None) => return,
            Err(err) => {
                warn!(booking = %outcome.booking_id.0, error = %err, "booking reload for decline notification failed");
                return;
            }
        };

        let mut details = BTreeMap::new();
        let event = if outcome.short_notice {
            MatchingEvent::ShortNoticeDeclined.label().to_string()
        } else {
            "declined".to_string()
        };
        details.insert("event".to_string(), event);
        let payload = NotificationPayload {
            booking_id: outcome.booking_id.clone(),
            provider_id: Some(outcome.provider_id.clone()),
            details,
        };

        // Watchers only: routine invitation churn should not alarm the client.
        if let Err(err) = self.notifier.notify_matching_progress(&booking, &payload) {
            warn!(booking = %booking.id.0, error = %err, "decline progress notification failed");
        }
    }
}
