use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Event, Ticket, TicketStatus, TicketUpdate};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryEventDirectory, InMemoryTicketStore};
pub use postgres::{PgEventDirectory, PgTicketStore};

/// Persistent ticket storage. Beyond plain CRUD, implementations must provide
/// indexed lookup by `code` and two conditional atomic updates:
/// [`redeem_if_valid`](TicketStore::redeem_if_valid), the primitive the
/// lifecycle engine relies on for at-most-once redemption, and
/// [`update_if_not_redeemed`](TicketStore::update_if_not_redeemed), which
/// keeps every other mutation from racing a redemption out of its terminal
/// state.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(&self, ticket: Ticket) -> Result<Ticket, AppError>;

    /// Inserts a batch of tickets in one call. Either all land or the call
    /// fails as a whole; a unique-key collision surfaces as
    /// [`AppError::DuplicateKey`] so the caller can regenerate and retry.
    async fn create_bulk(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, AppError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError>;

    async fn find_by_event(
        &self,
        event_id: Uuid,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, AppError>;

    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Ticket>, AppError>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Vec<Ticket>, AppError>;

    /// Applies a patch iff the stored ticket exists and has not reached
    /// `REDEEMED`. Like [`redeem_if_valid`](TicketStore::redeem_if_valid),
    /// the predicate and the write are one indivisible operation, so a
    /// redemption landing concurrently can never be overwritten. A predicate
    /// miss (missing ticket or `REDEEMED` status) returns `None` with no
    /// side effects.
    async fn update_if_not_redeemed(
        &self,
        id: Uuid,
        patch: TicketUpdate,
    ) -> Result<Option<Ticket>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Conditional atomic update backing redemption: iff the stored ticket
    /// matches `code`, has `status = VALID`, and `valid_until` (when set) is
    /// not before `now`, then in the same indivisible operation set
    /// `status = REDEEMED`, `redeemed_at = now`, `redeemed_by`, bump
    /// `check_in_count`, and return the post-update record. Any predicate
    /// miss returns `None` with no side effects. The check and the write
    /// must not be observable as separate steps under concurrency.
    async fn redeem_if_valid(
        &self,
        code: &str,
        redeemed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Ticket>, AppError>;
}

/// Read-only view of the platform's event catalog, consumed by issuance
/// (existence check) and admission control (host / validator resolution).
#[async_trait]
pub trait EventDirectory: Send + Sync {
    async fn find_by_id(&self, event_id: Uuid) -> Result<Option<Event>, AppError>;
}
