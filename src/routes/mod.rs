use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, set_security_headers};
use crate::handlers::reports::{check_in_history, event_stats};
use crate::handlers::tickets::{
    cancel_ticket, delete_ticket, get_ticket, issue_tickets, list_event_tickets, lookup_tickets,
    redeem_ticket, reissue_ticket, transfer_ticket, validate_ticket,
};
use crate::handlers::health_check;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/events/:event_id/tickets",
            post(issue_tickets).get(list_event_tickets),
        )
        .route("/events/:event_id/stats", get(event_stats))
        .route("/events/:event_id/check-ins", get(check_in_history))
        .route("/tickets", get(lookup_tickets))
        .route("/tickets/validate", post(validate_ticket))
        .route("/tickets/redeem", post(redeem_ticket))
        .route("/tickets/:ticket_id", get(get_ticket).delete(delete_ticket))
        .route("/tickets/:ticket_id/cancel", post(cancel_ticket))
        .route("/tickets/:ticket_id/reissue", post(reissue_ticket))
        .route("/tickets/:ticket_id/transfer", post(transfer_ticket))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(set_security_headers))
        .layer(create_cors_layer())
        .with_state(state)
}
