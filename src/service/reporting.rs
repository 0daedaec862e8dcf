use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{EventStats, Ticket, TicketStatus};
use crate::store::TicketStore;
use crate::utils::error::AppError;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Read-only per-event reporting over committed store state. Never mutates.
#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn TicketStore>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Counts by status and type plus the check-in rate, in one pass over the
    /// event's tickets. A stored-`VALID` ticket whose window has already
    /// closed counts as expired here, matching what the door would say.
    pub async fn stats(&self, event_id: Uuid) -> Result<EventStats, AppError> {
        let tickets = self.store.find_by_event(event_id, None).await?;
        let now = Utc::now();

        let mut stats = EventStats {
            total_tickets: tickets.len() as i64,
            valid_tickets: 0,
            redeemed_tickets: 0,
            cancelled_tickets: 0,
            expired_tickets: 0,
            check_in_rate: 0.0,
            by_type: HashMap::new(),
        };

        for ticket in &tickets {
            match ticket.status {
                TicketStatus::Valid => {
                    if ticket.valid_until.is_some_and(|until| until < now) {
                        stats.expired_tickets += 1;
                    } else {
                        stats.valid_tickets += 1;
                    }
                }
                TicketStatus::Redeemed => stats.redeemed_tickets += 1,
                TicketStatus::Cancelled => stats.cancelled_tickets += 1,
                TicketStatus::Expired => stats.expired_tickets += 1,
            }
            *stats.by_type.entry(ticket.ticket_type.clone()).or_insert(0) += 1;
        }

        if stats.total_tickets > 0 {
            stats.check_in_rate = stats.redeemed_tickets as f64 / stats.total_tickets as f64;
        }

        Ok(stats)
    }

    /// Redeemed tickets for the event, most recent check-in first, capped at
    /// `limit` (default 100).
    pub async fn check_in_history(
        &self,
        event_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut redeemed = self
            .store
            .find_by_event(event_id, Some(TicketStatus::Redeemed))
            .await?;
        redeemed.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at));
        redeemed.truncate(limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
        Ok(redeemed)
    }
}
