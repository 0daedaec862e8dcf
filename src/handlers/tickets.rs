use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{CallerId, EventScope};
use crate::models::{IssueRequest, TicketStatus};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

/// POST /events/:event_id/tickets: bulk issuance, host/validator only.
pub async fn issue_tickets(
    State(state): State<AppState>,
    caller: CallerId,
    Path(event_id): Path<Uuid>,
    Json(request): Json<IssueRequest>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Event(event_id))
        .await?;
    let tickets = state.tickets.issue(event_id, request).await?;
    Ok(created(tickets, "Tickets issued").into_response())
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<TicketStatus>,
}

/// GET /events/:event_id/tickets?status=
pub async fn list_event_tickets(
    State(state): State<AppState>,
    caller: CallerId,
    Path(event_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Event(event_id))
        .await?;
    let tickets = state
        .tickets
        .tickets_for_event(event_id, query.status)
        .await?;
    Ok(success(tickets, "Tickets retrieved").into_response())
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub event_id: Option<Uuid>,
}

/// POST /tickets/validate: read-only verdict. A failed validation is a 200
/// with `valid=false`; scanners see a closed reason set, never a raw error.
pub async fn validate_ticket(
    State(state): State<AppState>,
    caller: CallerId,
    Json(request): Json<ValidateRequest>,
) -> Result<Response, AppError> {
    let scope = match request.event_id {
        Some(event_id) => EventScope::Event(event_id),
        None => EventScope::Code(request.code.clone()),
    };
    state.admission.authorize(caller, scope).await?;
    let outcome = state
        .tickets
        .validate(&request.code, request.event_id)
        .await?;
    Ok(success(outcome, "Validation complete").into_response())
}

#[derive(Deserialize)]
pub struct RedeemRequest {
    pub code: String,
    pub event_id: Option<Uuid>,
}

/// POST /tickets/redeem: the mutating door-scan path. `redeemed_by` is the
/// authenticated scanning operator.
pub async fn redeem_ticket(
    State(state): State<AppState>,
    caller: CallerId,
    Json(request): Json<RedeemRequest>,
) -> Result<Response, AppError> {
    let scope = match request.event_id {
        Some(event_id) => EventScope::Event(event_id),
        None => EventScope::Code(request.code.clone()),
    };
    state.admission.authorize(caller, scope).await?;
    let result = state
        .tickets
        .redeem(&request.code, &caller.0.to_string(), request.event_id)
        .await?;
    Ok(success(result, "Redemption attempt complete").into_response())
}

/// GET /tickets/:ticket_id
pub async fn get_ticket(
    State(state): State<AppState>,
    caller: CallerId,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Ticket(ticket_id))
        .await?;
    let ticket = state.tickets.get(ticket_id).await?;
    Ok(success(ticket, "Ticket retrieved").into_response())
}

/// DELETE /tickets/:ticket_id: administrative removal, any status.
pub async fn delete_ticket(
    State(state): State<AppState>,
    caller: CallerId,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Ticket(ticket_id))
        .await?;
    state.tickets.delete(ticket_id).await?;
    Ok(empty_success("Ticket deleted").into_response())
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// POST /tickets/:ticket_id/cancel
pub async fn cancel_ticket(
    State(state): State<AppState>,
    caller: CallerId,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Ticket(ticket_id))
        .await?;
    let ticket = state.tickets.cancel(ticket_id, request.reason).await?;
    Ok(success(ticket, "Ticket cancelled").into_response())
}

/// POST /tickets/:ticket_id/reissue
pub async fn reissue_ticket(
    State(state): State<AppState>,
    caller: CallerId,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Ticket(ticket_id))
        .await?;
    let replacement = state.tickets.reissue(ticket_id).await?;
    Ok(created(replacement, "Ticket reissued").into_response())
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub holder_email: String,
    pub user_id: Option<Uuid>,
}

/// POST /tickets/:ticket_id/transfer
pub async fn transfer_ticket(
    State(state): State<AppState>,
    caller: CallerId,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<TransferRequest>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Ticket(ticket_id))
        .await?;
    let ticket = state
        .tickets
        .transfer(ticket_id, &request.holder_email, request.user_id)
        .await?;
    Ok(success(ticket, "Ticket transferred").into_response())
}

#[derive(Deserialize, Default)]
pub struct LookupQuery {
    pub order_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

/// GET /tickets?order_id=|user_id=|email=: cross-event admin lookups; these
/// cannot be scoped to one event, so they require authentication only.
pub async fn lookup_tickets(
    State(state): State<AppState>,
    _caller: CallerId,
    Query(query): Query<LookupQuery>,
) -> Result<Response, AppError> {
    let tickets = match (query.order_id, query.user_id, query.email) {
        (Some(order_id), None, None) => state.tickets.tickets_for_order(order_id).await?,
        (None, Some(user_id), None) => state.tickets.tickets_for_user(user_id).await?,
        (None, None, Some(email)) => state.tickets.tickets_for_email(&email).await?,
        _ => {
            return Err(AppError::ValidationError(
                "Provide exactly one of order_id, user_id, email".to_string(),
            ))
        }
    };
    Ok(success(tickets, "Tickets retrieved").into_response())
}
