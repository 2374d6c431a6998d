use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::matching::assignment::AssignmentError;
use crate::matching::domain::{
    Booking, BookingAssignment, BookingId, BookingInvitation, BookingStatus, GeoPoint,
    InvitationId, Location, PricingBreakdown, ProviderId, ProviderProfile, ServiceCategory,
    TimeWindow,
};
use crate::matching::notify::{
    MatchingEvent, NotificationDispatcher, NotificationPayload, NotifyError, PaymentAdjuster,
    PaymentError,
};
use crate::matching::repository::{
    BookingTxn, Clock, MatchingStore, ProviderDirectory, StoreError,
};
use crate::matching::scoring::{BookingCriteria, MatchingConfig};
use crate::matching::service::MatchingService;

/// Booking origin used across fixtures; provider offsets are expressed in
/// degrees of latitude (one degree is roughly 111.2 km).
pub(super) const ORIGIN: GeoPoint = GeoPoint {
    lat: 53.55,
    lng: 10.0,
};

pub(super) const KM_PER_DEGREE_LAT: f64 = 111.195;

pub(super) fn point_at_km(km: f64) -> GeoPoint {
    GeoPoint {
        lat: ORIGIN.lat + km / KM_PER_DEGREE_LAT,
        lng: ORIGIN.lng,
    }
}

pub(super) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 8, 0, 0).single().expect("valid time")
}

pub(super) fn window_hours(hours: f64) -> TimeWindow {
    let start = fixed_time();
    TimeWindow {
        start,
        end: start + Duration::seconds((hours * 3600.0).round() as i64),
    }
}

pub(super) fn location() -> Location {
    Location {
        city: "Hamburg".to_string(),
        postal_code: "20095".to_string(),
        coords: Some(ORIGIN),
    }
}

pub(super) fn provider(id: &str, distance_km: f64) -> ProviderProfile {
    ProviderProfile {
        id: ProviderId(id.to_string()),
        display_name: format!("Crew {id}"),
        hourly_rate_cents: 2000,
        categories: vec![ServiceCategory::HomeCleaning, ServiceCategory::DeepCleaning],
        zones: vec!["20".to_string()],
        base: Some(point_at_km(distance_km)),
        rating_avg: 4.5,
        rating_count: 40,
        team_size: 1,
        eco_certified: false,
        active: true,
        payout_ready: true,
    }
}

pub(super) fn booking(id: &str, required: u8) -> Booking {
    Booking {
        id: BookingId(id.to_string()),
        service: ServiceCategory::HomeCleaning,
        location: Some(location()),
        window: window_hours(2.5),
        required_providers: required,
        eco_preference: false,
        short_notice: true,
        status: BookingStatus::PendingProvider,
        pricing: PricingBreakdown::default(),
        audit_log: Vec::new(),
        client_contact: Some("client@example.com".to_string()),
    }
}

pub(super) fn criteria() -> BookingCriteria {
    BookingCriteria {
        service: ServiceCategory::HomeCleaning,
        window: window_hours(2.5),
        location: Some(location()),
        required_providers: 1,
        eco_preference: false,
    }
}

pub(super) fn matching_config() -> MatchingConfig {
    MatchingConfig::default()
}

/// Deterministic clock the tests advance by hand.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard = *guard + delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Default)]
struct MemoryState {
    bookings: HashMap<BookingId, Booking>,
    invitations: Vec<BookingInvitation>,
    assignments: Vec<BookingAssignment>,
}

/// In-memory store; one mutex over the whole state gives the per-booking
/// critical section a strictly serializable implementation.
#[derive(Default)]
pub(super) struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub(super) fn seed_booking(&self, booking: Booking) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.bookings.insert(booking.id.clone(), booking);
    }

    pub(super) fn seed_invitation(&self, invitation: BookingInvitation) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.invitations.push(invitation);
    }

    pub(super) fn invitation(&self, id: &InvitationId) -> Option<BookingInvitation> {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .invitations
            .iter()
            .find(|invitation| invitation.id == *id)
            .cloned()
    }

    pub(super) fn booking(&self, id: &BookingId) -> Option<Booking> {
        let state = self.state.lock().expect("store mutex poisoned");
        state.bookings.get(id).cloned()
    }

    pub(super) fn assignment_count(&self, booking: &BookingId) -> usize {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .assignments
            .iter()
            .filter(|assignment| assignment.booking_id == *booking)
            .count()
    }
}

impl MatchingStore for MemoryStore {
    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.booking(id))
    }

    fn fetch_invitation(&self, id: &InvitationId) -> Result<Option<BookingInvitation>, StoreError> {
        Ok(self.invitation(id))
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

/// Provider roster applying the directory-level eligibility filters.
#[derive(Default)]
pub(super) struct MemoryProviders {
    providers: Mutex<Vec<ProviderProfile>>,
}

impl MemoryProviders {
    pub(super) fn seed(&self, provider: ProviderProfile) {
        self.providers
            .lock()
            .expect("provider mutex poisoned")
            .push(provider);
    }
}

impl ProviderDirectory for MemoryProviders {
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

/// Records dispatched notifications; can be told to fail to prove post-commit
/// isolation.
#[derive(Default)]
pub(super) struct RecordingDispatcher {
    participant_events: Mutex<Vec<(MatchingEvent, NotificationPayload)>>,
    progress_events: Mutex<Vec<NotificationPayload>>,
    fail: AtomicBool,
}

impl RecordingDispatcher {
    pub(super) fn participant_events(&self) -> Vec<(MatchingEvent, NotificationPayload)> {
        self.participant_events
            .lock()
            .expect("dispatcher mutex poisoned")
            .clone()
    }

    pub(super) fn progress_events(&self) -> Vec<NotificationPayload> {
        self.progress_events
            .lock()
            .expect("dispatcher mutex poisoned")
            .clone()
    }

    pub(super) fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify_participants(
        &self,
        _booking: &Booking,
        event: MatchingEvent,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("simulated outage".to_string()));
        }
        self.participant_events
            .lock()
            .expect("dispatcher mutex poisoned")
            .push((event, payload.clone()));
        Ok(())
    }

    fn notify_matching_progress(
        &self,
        _booking: &Booking,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("simulated outage".to_string()));
        }
        self.progress_events
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(payload.clone());
        Ok(())
    }
}

/// Records held-amount adjustments; can be told to fail.
#[derive(Default)]
pub(super) struct RecordingPayments {
    adjustments: Mutex<Vec<(BookingId, i64, i64)>>,
    fail: AtomicBool,
}

impl RecordingPayments {
    pub(super) fn adjustments(&self) -> Vec<(BookingId, i64, i64)> {
        self.adjustments
            .lock()
            .expect("payments mutex poisoned")
            .clone()
    }

    pub(super) fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl PaymentAdjuster for RecordingPayments {
    fn adjust_held_amount(
        &self,
        booking: &BookingId,
        total_cents: i64,
        fee_cents: i64,
    ) -> Result<(), PaymentError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable("simulated outage".to_string()));
        }
        self.adjustments
            .lock()
            .expect("payments mutex poisoned")
            .push((booking.clone(), total_cents, fee_cents));
        Ok(())
    }
}

pub(super) type TestService =
    MatchingService<MemoryStore, MemoryProviders, RecordingDispatcher, RecordingPayments>;

pub(super) struct TestHarness {
    pub(super) service: TestService,
    pub(super) store: Arc<MemoryStore>,
    pub(super) providers: Arc<MemoryProviders>,
    pub(super) dispatcher: Arc<RecordingDispatcher>,
    pub(super) payments: Arc<RecordingPayments>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn build_harness() -> TestHarness {
    let store = Arc::new(MemoryStore::default());
    let providers = Arc::new(MemoryProviders::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let payments = Arc::new(RecordingPayments::default());
    let clock = Arc::new(ManualClock::at(fixed_time()));

    let service = MatchingService::with_clock(
        store.clone(),
        providers.clone(),
        dispatcher.clone(),
        payments.clone(),
        matching_config(),
        clock.clone(),
    );

    TestHarness {
        service,
        store,
        providers,
        dispatcher,
        payments,
        clock,
    }
}

pub(super) fn seed_invitation(
    store: &MemoryStore,
    id: &str,
    booking: &str,
    provider: &str,
) -> InvitationId {
    let invitation = BookingInvitation {
        id: InvitationId(id.to_string()),
        booking_id: BookingId(booking.to_string()),
        provider_id: ProviderId(provider.to_string()),
        status: crate::matching::domain::InvitationStatus::Pending,
        created_at: fixed_time(),
        responded_at: None,
    };
    store.seed_invitation(invitation.clone());
    invitation.id
}
