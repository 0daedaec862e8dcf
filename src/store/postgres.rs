use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Event, Ticket, TicketStatus, TicketUpdate};
use crate::store::{EventDirectory, TicketStore};
use crate::utils::error::{map_db_error, AppError};

/// Production ticket store backed by Postgres. The redemption predicate is a
/// single `UPDATE ... WHERE ... RETURNING` statement, so the compare-and-set
/// happens inside the database and the engine stays safe to run as many
/// concurrent instances.
#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_TICKET: &str = "INSERT INTO tickets (
        id, code, event_id, order_id, user_id,
        ticket_type, ticket_type_name, price,
        holder_email, holder_name, holder_phone,
        status, redeemed_at, redeemed_by, check_in_count, max_check_ins,
        metadata, notes, issued_at, valid_from, valid_until,
        created_at, updated_at
    ) VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
        $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
    ) RETURNING *";

fn bind_insert<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, Ticket, sqlx::postgres::PgArguments>,
    t: &Ticket,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, Ticket, sqlx::postgres::PgArguments> {
    query
        .bind(t.id)
        .bind(t.code.clone())
        .bind(t.event_id)
        .bind(t.order_id)
        .bind(t.user_id)
        .bind(t.ticket_type.clone())
        .bind(t.ticket_type_name.clone())
        .bind(t.price)
        .bind(t.holder_email.clone())
        .bind(t.holder_name.clone())
        .bind(t.holder_phone.clone())
        .bind(t.status)
        .bind(t.redeemed_at)
        .bind(t.redeemed_by.clone())
        .bind(t.check_in_count)
        .bind(t.max_check_ins)
        .bind(t.metadata.clone())
        .bind(t.notes.clone())
        .bind(t.issued_at)
        .bind(t.valid_from)
        .bind(t.valid_until)
        .bind(t.created_at)
        .bind(t.updated_at)
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn create(&self, ticket: Ticket) -> Result<Ticket, AppError> {
        let query = sqlx::query_as::<_, Ticket>(INSERT_TICKET);
        bind_insert(query, &ticket)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn create_bulk(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;
        let mut created = Vec::with_capacity(tickets.len());
        for ticket in &tickets {
            let query = sqlx::query_as::<_, Ticket>(INSERT_TICKET);
            let row = bind_insert(query, ticket)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_error)?;
            created.push(row);
        }
        tx.commit().await.map_err(AppError::DatabaseError)?;
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    async fn find_by_event(
        &self,
        event_id: Uuid,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets
             WHERE event_id = $1 AND ($2::ticket_status IS NULL OR status = $2)
             ORDER BY issued_at",
        )
        .bind(event_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE order_id = $1 ORDER BY issued_at")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE user_id = $1 ORDER BY issued_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE holder_email = $1 ORDER BY issued_at",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    async fn update_if_not_redeemed(
        &self,
        id: Uuid,
        patch: TicketUpdate,
    ) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET
                status = COALESCE($2, status),
                user_id = COALESCE($3, user_id),
                holder_email = COALESCE($4, holder_email),
                holder_name = COALESCE($5, holder_name),
                holder_phone = COALESCE($6, holder_phone),
                notes = COALESCE($7, notes),
                metadata = COALESCE($8, metadata),
                valid_from = COALESCE($9, valid_from),
                valid_until = COALESCE($10, valid_until),
                updated_at = now()
             WHERE id = $1 AND status <> 'REDEEMED'
             RETURNING *",
        )
        .bind(id)
        .bind(patch.status)
        .bind(patch.user_id)
        .bind(patch.holder_email)
        .bind(patch.holder_name)
        .bind(patch.holder_phone)
        .bind(patch.notes)
        .bind(patch.metadata)
        .bind(patch.valid_from)
        .bind(patch.valid_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(result.rows_affected() > 0)
    }

    async fn redeem_if_valid(
        &self,
        code: &str,
        redeemed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET
                status = 'REDEEMED',
                redeemed_at = $2,
                redeemed_by = $3,
                check_in_count = check_in_count + 1,
                updated_at = $2
             WHERE code = $1
               AND status = 'VALID'
               AND (valid_until IS NULL OR valid_until >= $2)
             RETURNING *",
        )
        .bind(code)
        .bind(now)
        .bind(redeemed_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }
}

/// Event catalog reads against the shared database.
#[derive(Clone)]
pub struct PgEventDirectory {
    pool: PgPool,
}

impl PgEventDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventDirectory for PgEventDirectory {
    async fn find_by_id(&self, event_id: Uuid) -> Result<Option<Event>, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }
}
