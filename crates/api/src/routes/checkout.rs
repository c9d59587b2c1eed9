//! Checkout session endpoints.

use std::sync::Arc;

use ::checkout::CheckoutError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CartId, ReservationId, SessionId};
use domain::{
    Aggregate, CartLineItem, CheckoutSession, DomainEvent, OwnerRef, SessionEvent,
    SessionFailure, Totals,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::identity::Owner;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PayRequest {
    pub session_id: String,
    pub payment_method: String,
}

/// Outcome of a pending authorization, reported by the payment provider.
#[derive(Deserialize)]
pub struct SettlePaymentRequest {
    pub approved: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub cart_id: Option<CartId>,
    pub owner: Option<OwnerRef>,
    pub state: String,
    pub lines: Vec<CartLineItem>,
    pub coupon_code: Option<String>,
    pub totals: Option<Totals>,
    pub reservation_id: Option<ReservationId>,
    pub payment_ref: Option<String>,
    pub payment_pending: bool,
    pub order_id: Option<String>,
    pub failure: Option<SessionFailure>,
    pub last_error: Option<String>,
    pub completed_steps: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&CheckoutSession> for SessionResponse {
    fn from(session: &CheckoutSession) -> Self {
        Self {
            id: session.id().map(|id| id.to_string()).unwrap_or_default(),
            cart_id: session.cart_id(),
            owner: session.owner().cloned(),
            state: session.state().to_string(),
            lines: session.lines().to_vec(),
            coupon_code: session.coupon_code().map(String::from),
            totals: session.totals().cloned(),
            reservation_id: session.reservation_id(),
            payment_ref: session.payment_ref().map(String::from),
            payment_pending: session.is_payment_pending(),
            order_id: session.order_id().map(String::from),
            failure: session.failure().cloned(),
            last_error: session.last_error().map(String::from),
            completed_steps: session
                .completed_steps()
                .iter()
                .map(|step| format!("{step:?}"))
                .collect(),
            expires_at: session.expires_at(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        }
    }
}

/// Response type for session history entries.
#[derive(Serialize)]
pub struct EventResponse {
    pub sequence: usize,
    pub event_type: String,
    pub occurred_at: String,
    pub payload: SessionEvent,
}

// -- Handlers --

/// POST /checkout/initiate: open a session for the caller's cart and reserve
/// its stock.
///
/// A session that fails to reserve stays readable under its id; the error
/// body says why.
#[tracing::instrument(skip(state))]
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.checkout.initiate(&owner).await?;
    let session_id = session
        .id()
        .ok_or_else(|| CheckoutError::Validation("session was not initiated".to_string()))?;
    let session = state.checkout.reserve_stock(session_id).await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

/// POST /checkout/pay: authorize payment and, once approved, finalize.
#[tracing::instrument(skip(state, req))]
pub async fn pay(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(req): Json<PayRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = parse_session_id(&req.session_id)?;
    let session = state.checkout.get(session_id).await?;
    if session.owner() != Some(&owner) {
        return Err(CheckoutError::SessionNotFound(session_id).into());
    }

    let session = state.checkout.pay(session_id, &req.payment_method).await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// POST /checkout/session/{id}/finalize: retry finalization of a paid session.
#[tracing::instrument(skip(state))]
pub async fn finalize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let session = state.checkout.finalize(session_id).await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// POST /checkout/session/{id}/payment: settle a pending authorization.
///
/// An approval is followed by finalization.
#[tracing::instrument(skip(state, req))]
pub async fn settle_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SettlePaymentRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let session = state
        .checkout
        .settle_payment(session_id, req.approved, req.message)
        .await?;
    let session = if session.state().can_finalize() {
        state.checkout.finalize(session_id).await?
    } else {
        session
    };
    Ok(Json(SessionResponse::from(&session)))
}

/// GET /checkout/session/{id}: read a session.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let session = state.checkout.get(session_id).await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// GET /checkout/session/{id}/events: the session's transition history.
#[tracing::instrument(skip(state))]
pub async fn events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let events = state.checkout.events(session_id).await?;

    let responses = events
        .into_iter()
        .enumerate()
        .map(|(i, event)| EventResponse {
            sequence: i + 1,
            event_type: event.event_type().to_string(),
            occurred_at: event.occurred_at().to_rfc3339(),
            payload: event,
        })
        .collect();

    Ok(Json(responses))
}

fn parse_session_id(id: &str) -> Result<SessionId, ApiError> {
    id.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid session id: {e}")))
}
