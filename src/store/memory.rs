use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Event, Ticket, TicketStatus, TicketUpdate};
use crate::store::{EventDirectory, TicketStore};
use crate::utils::error::AppError;

/// In-memory ticket store used by the test suite. The conditional update
/// holds the write lock across predicate check and mutation, which gives the
/// same indivisibility the Postgres store gets from a single `UPDATE`.
#[derive(Default)]
pub struct InMemoryTicketStore {
    inner: RwLock<Tickets>,
}

#[derive(Default)]
struct Tickets {
    by_id: HashMap<Uuid, Ticket>,
    code_index: HashMap<String, Uuid>,
}

impl Tickets {
    fn insert(&mut self, ticket: Ticket) -> Result<Ticket, AppError> {
        if self.by_id.contains_key(&ticket.id) {
            return Err(AppError::DuplicateKey(format!(
                "ticket id {} already exists",
                ticket.id
            )));
        }
        if self.code_index.contains_key(&ticket.code) {
            return Err(AppError::DuplicateKey(format!(
                "ticket code {} already exists",
                ticket.code
            )));
        }
        self.code_index.insert(ticket.code.clone(), ticket.id);
        self.by_id.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> AppError {
        AppError::InternalServerError("ticket store lock poisoned".to_string())
    }

    fn collect<F>(&self, filter: F) -> Result<Vec<Ticket>, AppError>
    where
        F: Fn(&Ticket) -> bool,
    {
        let inner = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        let mut tickets: Vec<Ticket> = inner.by_id.values().filter(|t| filter(t)).cloned().collect();
        tickets.sort_by_key(|t| t.issued_at);
        Ok(tickets)
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create(&self, ticket: Ticket) -> Result<Ticket, AppError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        inner.insert(ticket)
    }

    async fn create_bulk(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>, AppError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        // All-or-nothing, matching the transactional Postgres batch.
        for ticket in &tickets {
            if inner.by_id.contains_key(&ticket.id) || inner.code_index.contains_key(&ticket.code) {
                return Err(AppError::DuplicateKey(format!(
                    "duplicate identifier in batch for ticket {}",
                    ticket.id
                )));
            }
        }
        let mut created = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            created.push(inner.insert(ticket)?);
        }
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        let inner = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        Ok(inner.by_id.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError> {
        let inner = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        Ok(inner
            .code_index
            .get(code)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_event(
        &self,
        event_id: Uuid,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, AppError> {
        self.collect(|t| t.event_id == event_id && status.map_or(true, |s| t.status == s))
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        self.collect(|t| t.order_id == Some(order_id))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        self.collect(|t| t.user_id == Some(user_id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Ticket>, AppError> {
        self.collect(|t| t.holder_email == email)
    }

    async fn update_if_not_redeemed(
        &self,
        id: Uuid,
        patch: TicketUpdate,
    ) -> Result<Option<Ticket>, AppError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        let Some(ticket) = inner.by_id.get_mut(&id) else {
            return Ok(None);
        };
        if ticket.status == TicketStatus::Redeemed {
            return Ok(None);
        }
        if let Some(status) = patch.status {
            ticket.status = status;
        }
        if let Some(user_id) = patch.user_id {
            ticket.user_id = Some(user_id);
        }
        if let Some(email) = patch.holder_email {
            ticket.holder_email = email;
        }
        if let Some(name) = patch.holder_name {
            ticket.holder_name = Some(name);
        }
        if let Some(phone) = patch.holder_phone {
            ticket.holder_phone = Some(phone);
        }
        if let Some(notes) = patch.notes {
            ticket.notes = Some(notes);
        }
        if let Some(metadata) = patch.metadata {
            ticket.metadata = metadata;
        }
        if let Some(valid_from) = patch.valid_from {
            ticket.valid_from = Some(valid_from);
        }
        if let Some(valid_until) = patch.valid_until {
            ticket.valid_until = Some(valid_until);
        }
        ticket.updated_at = Utc::now();
        Ok(Some(ticket.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        let Some(ticket) = inner.by_id.remove(&id) else {
            return Ok(false);
        };
        inner.code_index.remove(&ticket.code);
        Ok(true)
    }

    async fn redeem_if_valid(
        &self,
        code: &str,
        redeemed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Ticket>, AppError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        let Some(&id) = inner.code_index.get(code) else {
            return Ok(None);
        };
        let Some(ticket) = inner.by_id.get_mut(&id) else {
            return Ok(None);
        };
        if ticket.status != TicketStatus::Valid {
            return Ok(None);
        }
        if ticket.valid_until.is_some_and(|until| until < now) {
            return Ok(None);
        }
        ticket.status = TicketStatus::Redeemed;
        ticket.redeemed_at = Some(now);
        ticket.redeemed_by = Some(redeemed_by.to_string());
        ticket.check_in_count += 1;
        ticket.updated_at = now;
        Ok(Some(ticket.clone()))
    }
}

/// In-memory event catalog for tests; seed with [`insert`](Self::insert).
#[derive(Default)]
pub struct InMemoryEventDirectory {
    events: RwLock<HashMap<Uuid, Event>>,
}

impl InMemoryEventDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: Event) {
        if let Ok(mut events) = self.events.write() {
            events.insert(event.id, event);
        }
    }
}

#[async_trait]
impl EventDirectory for InMemoryEventDirectory {
    async fn find_by_id(&self, event_id: Uuid) -> Result<Option<Event>, AppError> {
        let events = self
            .events
            .read()
            .map_err(|_| AppError::InternalServerError("event directory lock poisoned".to_string()))?;
        Ok(events.get(&event_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ticket::TicketSpec;
    use crate::service::tickets::build_ticket;
    use chrono::Duration;

    fn spec(email: &str) -> TicketSpec {
        TicketSpec {
            ticket_type: "general".to_string(),
            holder_email: email.to_string(),
            ticket_type_name: None,
            price: None,
            holder_name: None,
            holder_phone: None,
            max_check_ins: None,
            metadata: None,
        }
    }

    fn fresh_ticket(valid_until: Option<DateTime<Utc>>) -> Ticket {
        let mut ticket = build_ticket(Uuid::new_v4(), &spec("a@x.com"), None, None, None, None);
        ticket.valid_until = valid_until;
        ticket
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_non_valid_status() {
        let store = InMemoryTicketStore::new();
        let ticket = store.create(fresh_ticket(None)).await.unwrap();

        let first = store
            .redeem_if_valid(&ticket.code, "scanner-1", Utc::now())
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .redeem_if_valid(&ticket.code, "scanner-2", Utc::now())
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_past_window() {
        let store = InMemoryTicketStore::new();
        let expired = fresh_ticket(Some(Utc::now() - Duration::hours(1)));
        let ticket = store.create(expired).await.unwrap();

        let result = store
            .redeem_if_valid(&ticket.code, "scanner-1", Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());

        // Stored status is untouched by the failed predicate.
        let reread = store.find_by_code(&ticket.code).await.unwrap().unwrap();
        assert_eq!(reread.status, TicketStatus::Valid);
        assert_eq!(reread.check_in_count, 0);
    }

    #[tokio::test]
    async fn test_guarded_patch_misses_redeemed_ticket() {
        let store = InMemoryTicketStore::new();
        let ticket = store.create(fresh_ticket(None)).await.unwrap();
        store
            .redeem_if_valid(&ticket.code, "scanner-1", Utc::now())
            .await
            .unwrap()
            .unwrap();

        let patch = TicketUpdate {
            status: Some(TicketStatus::Cancelled),
            notes: Some("Customer refund".to_string()),
            ..Default::default()
        };
        let result = store.update_if_not_redeemed(ticket.id, patch).await.unwrap();
        assert!(result.is_none());

        // The admission record survives the late patch intact.
        let reread = store.find_by_id(ticket.id).await.unwrap().unwrap();
        assert_eq!(reread.status, TicketStatus::Redeemed);
        assert_eq!(reread.check_in_count, 1);
        assert!(reread.notes.is_none());
    }

    #[tokio::test]
    async fn test_guarded_patch_applies_to_valid_ticket() {
        let store = InMemoryTicketStore::new();
        let ticket = store.create(fresh_ticket(None)).await.unwrap();

        let patch = TicketUpdate {
            holder_email: Some("b@x.com".to_string()),
            ..Default::default()
        };
        let updated = store
            .update_if_not_redeemed(ticket.id, patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.holder_email, "b@x.com");
        assert_eq!(updated.status, TicketStatus::Valid);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let store = InMemoryTicketStore::new();
        let ticket = store.create(fresh_ticket(None)).await.unwrap();

        let mut clash = fresh_ticket(None);
        clash.code = ticket.code.clone();
        let err = store.create(clash).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_bulk_insert_is_all_or_nothing() {
        let store = InMemoryTicketStore::new();
        let existing = store.create(fresh_ticket(None)).await.unwrap();

        let fresh = fresh_ticket(None);
        let mut clash = fresh_ticket(None);
        clash.code = existing.code.clone();

        let err = store.create_bulk(vec![fresh.clone(), clash]).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));
        // The non-colliding record from the failed batch must not have landed.
        assert!(store.find_by_id(fresh.id).await.unwrap().is_none());
    }
}
