//! Matching and assignment engine for cleaning-service bookings.
//!
//! A booking request flows through the [`scoring`] module for ranked
//! candidates, the [`invitations`] issuer for pending offers, and the
//! [`assignment`] coordinator for the transactional accept/decline state
//! machine. Storage and outbound collaborators are trait seams so the whole
//! engine runs against in-memory adapters in tests and development.

pub mod assignment;
pub mod domain;
pub mod invitations;
pub mod notify;
pub mod pricing;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use assignment::{AcceptOutcome, AssignmentCoordinator, AssignmentError, DeclineOutcome};
pub use domain::{
    AuditAction, AuditEntry, Booking, BookingAssignment, BookingId, BookingInvitation,
    BookingStatus, GeoPoint, InvitationId, InvitationStatus, Location, PricingBreakdown,
    ProviderId, ProviderProfile, ServiceCategory, TimeWindow,
};
pub use invitations::{InvitationError, InvitationIssuer};
pub use notify::{
    MatchingEvent, NotificationDispatcher, NotificationPayload, NotifyError, OpsDirectory,
    OpsRecipient, OpsRecipientCache, PaymentAdjuster, PaymentError,
};
pub use pricing::{billable_hours, recompute, QuotedTotals, SHORT_NOTICE_FEE_CENTS};
pub use repository::{
    BookingTxn, Clock, MatchingStore, ProviderDirectory, StoreError, SystemClock,
};
pub use router::{matching_router, AssignmentView, InvitationView};
pub use scoring::{
    BookingCriteria, CandidateScorer, CriteriaError, MatchingConfig, MatchingConfigStore,
    RankedCandidate, ScoreComponent, ScoreFactor, ScoreWeights, TeamBonus,
};
pub use service::{MatchingService, MatchingServiceError};
