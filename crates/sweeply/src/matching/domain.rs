use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for client bookings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub String);

/// Identifier wrapper for provider profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

/// Identifier wrapper for booking invitations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvitationId(pub String);

/// Cleaning services offered through the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    HomeCleaning,
    DeepCleaning,
    OfficeCleaning,
    MoveOutCleaning,
    WindowCleaning,
}

impl ServiceCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::HomeCleaning => "home_cleaning",
            Self::DeepCleaning => "deep_cleaning",
            Self::OfficeCleaning => "office_cleaning",
            Self::MoveOutCleaning => "move_out_cleaning",
            Self::WindowCleaning => "window_cleaning",
        }
    }
}

/// WGS84 coordinates resolved upstream by the geocoding service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Where the service takes place. Coordinates are optional; bookings entered
/// before geocoding completes still flow through matching with neutral
/// distance scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub postal_code: String,
    pub coords: Option<GeoPoint>,
}

/// Requested service window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// Raw span in hours; negative when the window is inverted.
    pub fn duration_hours(&self) -> f64 {
        let seconds = (self.end - self.start).num_seconds();
        seconds as f64 / 3600.0
    }
}

/// Booking lifecycle. Only `PendingProvider` and `PendingClient` are
/// matchable; every other state refuses further invitation responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Draft,
    PendingProvider,
    PendingClient,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingProvider => "pending_provider",
            Self::PendingClient => "pending_client",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
        }
    }

    pub const fn is_matchable(self) -> bool {
        matches!(self, Self::PendingProvider | Self::PendingClient)
    }
}

/// Monetary breakdown carried on the booking, all amounts in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal_cents: i64,
    pub eco_surcharge_cents: i64,
    pub platform_fee_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Actions recorded on the booking audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    InvitationsIssued,
    ProviderAssigned,
    ShortNoticeAccepted,
    ShortNoticeDeclined,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::InvitationsIssued => "invitations_issued",
            Self::ProviderAssigned => "provider_assigned",
            Self::ShortNoticeAccepted => "short_notice_accepted",
            Self::ShortNoticeDeclined => "short_notice_declined",
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: AuditAction,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

/// A client's request for service, owned by the booking aggregate.
/// Invitations and assignments reference it by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub service: ServiceCategory,
    pub location: Option<Location>,
    pub window: TimeWindow,
    pub required_providers: u8,
    pub eco_preference: bool,
    pub short_notice: bool,
    pub status: BookingStatus,
    pub pricing: PricingBreakdown,
    pub audit_log: Vec<AuditEntry>,
    pub client_contact: Option<String>,
}

impl Booking {
    pub fn push_audit(
        &mut self,
        actor: impl Into<String>,
        action: AuditAction,
        metadata: BTreeMap<String, String>,
        recorded_at: DateTime<Utc>,
    ) {
        self.audit_log.push(AuditEntry {
            actor: actor.into(),
            action,
            metadata,
            recorded_at,
        });
    }
}

/// Provider snapshot read by the scorer. Mutated only by provider-profile
/// management, which lives outside this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: ProviderId,
    pub display_name: String,
    pub hourly_rate_cents: i64,
    pub categories: Vec<ServiceCategory>,
    /// Postal-code prefixes the provider serves; empty means unrestricted.
    pub zones: Vec<String>,
    pub base: Option<GeoPoint>,
    pub rating_avg: f32,
    pub rating_count: u32,
    pub team_size: u8,
    pub eco_certified: bool,
    pub active: bool,
    pub payout_ready: bool,
}

impl ProviderProfile {
    pub fn serves_category(&self, category: ServiceCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn serves_postal_code(&self, postal_code: &str) -> bool {
        self.zones.is_empty()
            || self
                .zones
                .iter()
                .any(|prefix| postal_code.starts_with(prefix.as_str()))
    }
}

/// Invitation lifecycle: `Pending` is the only state that accepts a
/// transition; the rest are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl InvitationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A time-bound offer to one provider to fill one slot of a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingInvitation {
    pub id: InvitationId,
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Durable record that a provider committed to a booking slot. Inserted only
/// by the assignment coordinator; never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingAssignment {
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub created_at: DateTime<Utc>,
}
