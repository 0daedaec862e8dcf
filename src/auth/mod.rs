use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::models::Event;
use crate::store::{EventDirectory, TicketStore};
use crate::utils::error::AppError;

/// Authenticated caller identity, taken from the `x-user-id` header the
/// platform's auth gateway sets after verifying the session. Absent or
/// malformed headers are an authentication failure, not a pass-through.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing x-user-id header".to_string()))?;
        let id = header
            .parse::<Uuid>()
            .map_err(|_| AppError::AuthError("Malformed x-user-id header".to_string()))?;
        Ok(CallerId(id))
    }
}

/// How a request names the event it operates on. When only a ticket id or a
/// code is given, the event is resolved through the ticket record.
#[derive(Debug, Clone)]
pub enum EventScope {
    Event(Uuid),
    Ticket(Uuid),
    Code(String),
}

/// Authorization boundary for administrative and door-scanning operations:
/// only the event's host or one of its designated validators gets through.
/// A request whose event cannot be resolved at all is denied rather than
/// silently passed along.
#[derive(Clone)]
pub struct AdmissionControl {
    events: Arc<dyn EventDirectory>,
    store: Arc<dyn TicketStore>,
}

impl AdmissionControl {
    pub fn new(events: Arc<dyn EventDirectory>, store: Arc<dyn TicketStore>) -> Self {
        Self { events, store }
    }

    pub async fn authorize(&self, caller: CallerId, scope: EventScope) -> Result<Event, AppError> {
        let event_id = self.resolve_event_id(scope).await?;
        let event = self
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;

        if event.permits(caller.0) {
            Ok(event)
        } else {
            Err(AppError::Forbidden(
                "Caller is neither the event host nor a designated validator".to_string(),
            ))
        }
    }

    async fn resolve_event_id(&self, scope: EventScope) -> Result<Uuid, AppError> {
        match scope {
            EventScope::Event(id) => Ok(id),
            EventScope::Ticket(ticket_id) => self
                .store
                .find_by_id(ticket_id)
                .await?
                .map(|t| t.event_id)
                .ok_or_else(|| {
                    AppError::Forbidden(format!(
                        "Cannot resolve an event for ticket {}",
                        ticket_id
                    ))
                }),
            EventScope::Code(code) => self
                .store
                .find_by_code(&code)
                .await?
                .map(|t| t.event_id)
                .ok_or_else(|| {
                    AppError::Forbidden("Cannot resolve an event for the given code".to_string())
                }),
        }
    }
}
