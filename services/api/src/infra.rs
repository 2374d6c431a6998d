use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use sweeply::config::MatchingSettings;
use sweeply::matching::{
    AssignmentError, Booking, BookingAssignment, BookingCriteria, BookingId, BookingInvitation,
    BookingStatus, BookingTxn, GeoPoint, InvitationId, Location, MatchingConfig, MatchingEvent,
    MatchingStore, NotificationDispatcher, NotificationPayload, NotifyError, OpsDirectory,
    OpsRecipient, OpsRecipientCache, PaymentAdjuster, PaymentError, PricingBreakdown,
    ProviderDirectory, ProviderId, ProviderProfile, ServiceCategory, StoreError, SystemClock,
    TimeWindow,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreState {
    bookings: HashMap<BookingId, Booking>,
    invitations: Vec<BookingInvitation>,
    assignments: Vec<BookingAssignment>,
}

/// In-memory booking store. One mutex over the whole state means every
/// transaction body runs strictly serialized, which satisfies the per-booking
/// critical-section contract with room to spare.
#[derive(Default)]
pub(crate) struct InMemoryMatchingStore {
    state: Mutex<StoreState>,
}

impl InMemoryMatchingStore {
    pub(crate) fn seed_booking(&self, booking: Booking) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.bookings.insert(booking.id.clone(), booking);
    }
}

impl MatchingStore for InMemoryMatchingStore {
    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.bookings.get(id).cloned())
    }

    fn fetch_invitation(&self, id: &InvitationId) -> Result<Option<BookingInvitation>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .invitations
            .iter()
            .find(|invitation| invitation.id == *id)
            .cloned())
    }

    fn invitations_for(&self, booking: &BookingId) -> Result<Vec<BookingInvitation>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .invitations
            .iter()
            .filter(|invitation| invitation.booking_id == *booking)
            .cloned()
            .collect())
    }

    fn assignments_for(&self, booking: &BookingId) -> Result<Vec<BookingAssignment>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .assignments
            .iter()
            .filter(|assignment| assignment.booking_id == *booking)
            .cloned()
            .collect())
    }

    fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state.bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict);
        }
        state.bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    fn insert_invitation(&self, invitation: BookingInvitation) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state
            .invitations
            .iter()
            .any(|existing| existing.id == invitation.id)
        {
            return Err(StoreError::Conflict);
        }
        state.invitations.push(invitation);
        Ok(())
    }

    fn transact<T, F>(&self, booking: &BookingId, body: F) -> Result<T, AssignmentError>
    where
        F: FnOnce(&mut BookingTxn) -> Result<T, AssignmentError>,
    {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let current = state
            .bookings
            .get(booking)
            .cloned()
            .ok_or(AssignmentError::BookingNotFound)?;
        let mut txn = BookingTxn {
            booking: current,
            invitations: state
                .invitations
                .iter()
                .filter(|invitation| invitation.booking_id == *booking)
                .cloned()
                .collect(),
            assignments: state
                .assignments
                .iter()
                .filter(|assignment| assignment.booking_id == *booking)
                .cloned()
                .collect(),
        };

        let value = body(&mut txn)?;

        state.bookings.insert(booking.clone(), txn.booking);
        state
            .invitations
            .retain(|invitation| invitation.booking_id != *booking);
        state.invitations.extend(txn.invitations);
        state
            .assignments
            .retain(|assignment| assignment.booking_id != *booking);
        state.assignments.extend(txn.assignments);
        Ok(value)
    }
}

/// In-memory provider roster applying the eligibility filters the scorer
/// expects the directory to have done.
#[derive(Default)]
pub(crate) struct InMemoryProviderDirectory {
    providers: Mutex<Vec<ProviderProfile>>,
}

impl InMemoryProviderDirectory {
    pub(crate) fn seed(&self, provider: ProviderProfile) {
        self.providers
            .lock()
            .expect("provider mutex poisoned")
            .push(provider);
    }
}

impl ProviderDirectory for InMemoryProviderDirectory {
    fn eligible(&self, criteria: &BookingCriteria) -> Result<Vec<ProviderProfile>, StoreError> {
        let providers = self.providers.lock().expect("provider mutex poisoned");
        Ok(providers
            .iter()
            .filter(|provider| {
                provider.active
                    && provider.payout_ready
                    && provider.serves_category(criteria.service)
                    && criteria
                        .location
                        .as_ref()
                        .map(|location| provider.serves_postal_code(&location.postal_code))
                        .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    fn fetch(&self, id: &ProviderId) -> Result<Option<ProviderProfile>, StoreError> {
        let providers = self.providers.lock().expect("provider mutex poisoned");
        Ok(providers.iter().find(|provider| provider.id == *id).cloned())
    }
}

/// Fixed ops roster for development; production wires the staff directory.
pub(crate) struct StaticOpsDirectory {
    recipients: Vec<OpsRecipient>,
}

impl Default for StaticOpsDirectory {
    fn default() -> Self {
        Self {
            recipients: vec![OpsRecipient {
                name: "Dispatch Desk".to_string(),
                contact: "ops@sweeply.example".to_string(),
            }],
        }
    }
}

impl OpsDirectory for StaticOpsDirectory {
    fn ops_recipients(&self) -> Result<Vec<OpsRecipient>, NotifyError> {
        Ok(self.recipients.clone())
    }
}

/// Dispatcher that logs every event. Short-notice watcher fan-out resolves
/// its roster through the TTL cache rather than re-reading the directory per
/// event.
pub(crate) struct LoggingDispatcher {
    ops: OpsRecipientCache<StaticOpsDirectory>,
}

impl Default for LoggingDispatcher {
    fn default() -> Self {
        Self {
            ops: OpsRecipientCache::new(
                Arc::new(StaticOpsDirectory::default()),
                Arc::new(SystemClock),
                Duration::minutes(10),
            ),
        }
    }
}

impl NotificationDispatcher for LoggingDispatcher {
    fn notify_participants(
        &self,
        booking: &Booking,
        event: MatchingEvent,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        info!(
            booking = %booking.id.0,
            event = event.label(),
            provider = payload.provider_id.as_ref().map(|id| id.0.as_str()),
            "participant notification"
        );
        Ok(())
    }

    fn notify_matching_progress(
        &self,
        booking: &Booking,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        let recipients = self.ops.recipients()?;
        for recipient in &recipients {
            info!(
                booking = %booking.id.0,
                watcher = %recipient.contact,
                details = ?payload.details,
                "matching progress notification"
            );
        }
        Ok(())
    }
}

/// Payment adjuster that logs the reconciliation it would request.
#[derive(Default)]
pub(crate) struct LoggingPaymentAdjuster;

impl PaymentAdjuster for LoggingPaymentAdjuster {
    fn adjust_held_amount(
        &self,
        booking: &BookingId,
        total_cents: i64,
        fee_cents: i64,
    ) -> Result<(), PaymentError> {
        info!(
            booking = %booking.0,
            total_cents,
            fee_cents,
            "payment hold adjustment requested"
        );
        Ok(())
    }
}

pub(crate) fn default_matching_config(settings: &MatchingSettings) -> MatchingConfig {
    MatchingConfig {
        distance_max_km: settings.distance_max_km,
        ..MatchingConfig::default()
    }
}

fn demo_window() -> TimeWindow {
    let start = Utc
        .with_ymd_and_hms(2025, 11, 3, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    TimeWindow {
        start,
        end: start + Duration::minutes(150),
    }
}

fn demo_provider(
    id: &str,
    rate: i64,
    km_offset: f64,
    team_size: u8,
    eco: bool,
) -> ProviderProfile {
    ProviderProfile {
        id: ProviderId(id.to_string()),
        display_name: format!("Crew {id}"),
        hourly_rate_cents: rate,
        categories: vec![
            ServiceCategory::HomeCleaning,
            ServiceCategory::DeepCleaning,
        ],
        zones: vec!["20".to_string()],
        base: Some(GeoPoint {
            lat: 53.55 + km_offset / 111.195,
            lng: 10.0,
        }),
        rating_avg: 4.6,
        rating_count: 25,
        team_size,
        eco_certified: eco,
        active: true,
        payout_ready: true,
    }
}

/// Seed a small roster and one open short-notice booking so the HTTP surface
/// and the CLI demo are exercisable immediately.
pub(crate) fn seed_demo_fixtures(
    store: &InMemoryMatchingStore,
    providers: &InMemoryProviderDirectory,
    required_providers: u8,
    eco_preference: bool,
) -> BookingId {
    providers.seed(demo_provider("aurora", 2100, 2.4, 1, true));
    providers.seed(demo_provider("beacon", 1950, 6.0, 3, false));
    providers.seed(demo_provider("cedar", 2000, 11.5, 2, false));
    providers.seed(demo_provider("drift", 1700, 28.0, 1, false));

    let booking_id = BookingId("bk-demo-001".to_string());
    store.seed_booking(Booking {
        id: booking_id.clone(),
        service: ServiceCategory::HomeCleaning,
        location: Some(Location {
            city: "Hamburg".to_string(),
            postal_code: "20095".to_string(),
            coords: Some(GeoPoint {
                lat: 53.55,
                lng: 10.0,
            }),
        }),
        window: demo_window(),
        required_providers,
        eco_preference,
        short_notice: true,
        status: BookingStatus::PendingProvider,
        pricing: PricingBreakdown::default(),
        audit_log: Vec::new(),
        client_contact: Some("client@sweeply.example".to_string()),
    });
    booking_id
}
