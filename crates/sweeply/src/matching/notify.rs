use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{Booking, BookingId, ProviderId};
use super::repository::Clock;

/// Events the engine reports to the outside world after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingEvent {
    InvitationsIssued,
    ProviderAssigned,
    ShortNoticeAccepted,
    ShortNoticeDeclined,
    ClientConfirmation,
}

impl MatchingEvent {
    pub const fn label(self) -> &'static str {
        match self {
            Self::InvitationsIssued => "invitations_issued",
            Self::ProviderAssigned => "provider_assigned",
            Self::ShortNoticeAccepted => "short_notice_accepted",
            Self::ShortNoticeDeclined => "short_notice_declined",
            Self::ClientConfirmation => "client_confirmation",
        }
    }
}

/// Payload attached to a dispatched notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub booking_id: BookingId,
    pub provider_id: Option<ProviderId>,
    pub details: BTreeMap<String, String>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Best-effort outbound alerts. Implementations must not fail into the
/// caller's transaction; the orchestration layer logs and moves on.
pub trait NotificationDispatcher: Send + Sync {
    /// Alert the booking's participants (client and assigned providers).
    fn notify_participants(
        &self,
        booking: &Booking,
        event: MatchingEvent,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError>;

    /// Alert matching watchers (ops staff, progress dashboards) without
    /// involving the client.
    fn notify_matching_progress(
        &self,
        booking: &Booking,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError>;
}

/// Payment adjustment error.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment adjustment rejected: {0}")]
    Rejected(String),
    #[error("payment backend unavailable: {0}")]
    Unavailable(String),
}

/// Reconciles a payment intent's held amount after an assignment commits.
/// Idempotent per booking and amount.
pub trait PaymentAdjuster: Send + Sync {
    fn adjust_held_amount(
        &self,
        booking: &BookingId,
        total_cents: i64,
        fee_cents: i64,
    ) -> Result<(), PaymentError>;
}

/// An operations staff member watching short-notice activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsRecipient {
    pub name: String,
    pub contact: String,
}

/// Source of the ops watcher roster (staff directory, on-call schedule).
pub trait OpsDirectory: Send + Sync {
    fn ops_recipients(&self) -> Result<Vec<OpsRecipient>, NotifyError>;
}

struct CachedRecipients {
    fetched_at: DateTime<Utc>,
    recipients: Vec<OpsRecipient>,
}

/// TTL cache in front of the ops directory so dispatchers do not hit the
/// staff roster on every short-notice event. Expiry runs through the injected
/// clock; a failed refresh serves the stale roster rather than dropping the
/// alert fan-out.
pub struct OpsRecipientCache<D> {
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cached: Mutex<Option<CachedRecipients>>,
}

impl<D: OpsDirectory> OpsRecipientCache<D> {
    pub fn new(directory: Arc<D>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            directory,
            clock,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn recipients(&self) -> Result<Vec<OpsRecipient>, NotifyError> {
        let now = self.clock.now();
        let mut guard = self.cached.lock().expect("ops cache mutex poisoned");

        if let Some(cached) = guard.as_ref() {
            if now - cached.fetched_at < self.ttl {
                return Ok(cached.recipients.clone());
            }
        }

        match self.directory.ops_recipients() {
            Ok(recipients) => {
                *guard = Some(CachedRecipients {
                    fetched_at: now,
                    recipients: recipients.clone(),
                });
                Ok(recipients)
            }
            Err(err) => match guard.as_ref() {
                Some(stale) => {
                    warn!(error = %err, "ops directory refresh failed, serving stale roster");
                    Ok(stale.recipients.clone())
                }
                None => Err(err),
            },
        }
    }

    /// Drop the cached roster so the next read refreshes immediately.
    pub fn invalidate(&self) {
        let mut guard = self.cached.lock().expect("ops cache mutex poisoned");
        *guard = None;
    }
}
