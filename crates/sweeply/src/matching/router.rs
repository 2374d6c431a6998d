use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::assignment::{AcceptOutcome, AssignmentError, DeclineOutcome};
use super::domain::{BookingId, BookingInvitation, InvitationId, ProviderId};
use super::invitations::InvitationError;
use super::notify::{NotificationDispatcher, PaymentAdjuster};
use super::repository::{MatchingStore, ProviderDirectory};
use super::scoring::BookingCriteria;
use super::service::{MatchingService, MatchingServiceError};

/// Router builder exposing the engine to HTTP callers.
pub fn matching_router<S, P, N, Y>(service: Arc<MatchingService<S, P, N, Y>>) -> Router
where
    S: MatchingStore + 'static,
    P: ProviderDirectory + 'static,
    N: NotificationDispatcher + 'static,
    Y: PaymentAdjuster + 'static,
{
    Router::new()
        .route(
            "/api/v1/matching/candidates",
            post(score_handler::<S, P, N, Y>),
        )
        .route(
            "/api/v1/bookings/:booking_id/invitations",
            post(issue_handler::<S, P, N, Y>),
        )
        .route(
            "/api/v1/invitations/:invitation_id/accept",
            post(accept_handler::<S, P, N, Y>),
        )
        .route(
            "/api/v1/invitations/:invitation_id/decline",
            post(decline_handler::<S, P, N, Y>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    #[serde(flatten)]
    pub(crate) criteria: BookingCriteria,
    #[serde(default = "default_score_limit")]
    pub(crate) limit: usize,
}

fn default_score_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueRequest {
    pub(crate) fanout: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondRequest {
    pub(crate) provider_id: String,
}

/// Sanitized representation of a committed assignment.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub booking_id: String,
    pub provider_id: String,
    pub booking_status: &'static str,
    pub assigned: usize,
    pub required: u8,
    pub labor_cents: i64,
    pub fee_cents: i64,
    pub total_cents: i64,
    pub expired_invitations: Vec<String>,
}

impl From<&AcceptOutcome> for AssignmentView {
    fn from(outcome: &AcceptOutcome) -> Self {
        Self {
            booking_id: outcome.booking.id.0.clone(),
            provider_id: outcome.assignment.provider_id.0.clone(),
            booking_status: outcome.booking.status.label(),
            assigned: outcome.assigned_count,
            required: outcome.booking.required_providers,
            labor_cents: outcome.totals.labor_cents,
            fee_cents: outcome.totals.fee_cents,
            total_cents: outcome.totals.total_cents,
            expired_invitations: outcome
                .expired_invitations
                .iter()
                .map(|id| id.0.clone())
                .collect(),
        }
    }
}

/// Sanitized representation of an issued invitation.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationView {
    pub invitation_id: String,
    pub booking_id: String,
    pub provider_id: String,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<&BookingInvitation> for InvitationView {
    fn from(invitation: &BookingInvitation) -> Self {
        Self {
            invitation_id: invitation.id.0.clone(),
            booking_id: invitation.booking_id.0.clone(),
            provider_id: invitation.provider_id.0.clone(),
            status: invitation.status.label(),
            created_at: invitation.created_at,
        }
    }
}

pub(crate) async fn score_handler<S, P, N, Y>(
    State(service): State<Arc<MatchingService<S, P, N, Y>>>,
    axum::Json(request): axum::Json<ScoreRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    P: ProviderDirectory + 'static,
    N: NotificationDispatcher + 'static,
    Y: PaymentAdjuster + 'static,
{
    match service.score_candidates(&request.criteria, request.limit) {
        Ok(ranked) => (StatusCode::OK, axum::Json(ranked)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn issue_handler<S, P, N, Y>(
    State(service): State<Arc<MatchingService<S, P, N, Y>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<IssueRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    P: ProviderDirectory + 'static,
    N: NotificationDispatcher + 'static,
    Y: PaymentAdjuster + 'static,
{
    let booking_id = BookingId(booking_id);
    match service.issue_invitations(&booking_id, request.fanout) {
        Ok(created) => {
            let views: Vec<InvitationView> = created.iter().map(InvitationView::from).collect();
            (StatusCode::CREATED, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn accept_handler<S, P, N, Y>(
    State(service): State<Arc<MatchingService<S, P, N, Y>>>,
    Path(invitation_id): Path<String>,
    axum::Json(request): axum::Json<RespondRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    P: ProviderDirectory + 'static,
    N: NotificationDispatcher + 'static,
    Y: PaymentAdjuster + 'static,
{
    let invitation_id = InvitationId(invitation_id);
    let provider_id = ProviderId(request.provider_id);
    match service.accept_invitation(&invitation_id, &provider_id) {
        Ok(outcome) => {
            let view = AssignmentView::from(&outcome);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decline_handler<S, P, N, Y>(
    State(service): State<Arc<MatchingService<S, P, N, Y>>>,
    Path(invitation_id): Path<String>,
    axum::Json(request): axum::Json<RespondRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    P: ProviderDirectory + 'static,
    N: NotificationDispatcher + 'static,
    Y: PaymentAdjuster + 'static,
{
    let invitation_id = InvitationId(invitation_id);
    let provider_id = ProviderId(request.provider_id);
    match service.decline_invitation(&invitation_id, &provider_id) {
        Ok(outcome) => ack_response(&outcome),
        Err(error) => error_response(error),
    }
}

fn ack_response(outcome: &DeclineOutcome) -> Response {
    let payload = json!({
        "invitation_id": outcome.invitation_id.0,
        "booking_id": outcome.booking_id.0,
        "status": "declined",
        "responded_at": outcome.responded_at,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

fn error_response(error: MatchingServiceError) -> Response {
    let status = match &error {
        MatchingServiceError::Criteria(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MatchingServiceError::Invitation(InvitationError::BookingNotFound) => {
            StatusCode::NOT_FOUND
        }
        MatchingServiceError::Invitation(InvitationError::BookingNotOpen { .. }) => {
            StatusCode::CONFLICT
        }
        MatchingServiceError::Assignment(
            AssignmentError::InvitationNotFound | AssignmentError::BookingNotFound,
        ) => StatusCode::NOT_FOUND,
        MatchingServiceError::Assignment(AssignmentError::Forbidden) => StatusCode::FORBIDDEN,
        MatchingServiceError::Assignment(
            AssignmentError::AlreadyHandled { .. }
            | AssignmentError::AlreadyFull
            | AssignmentError::BookingNotAvailable,
        ) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}
