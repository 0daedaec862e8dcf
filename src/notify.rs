use async_trait::async_trait;

use crate::models::{Event, Ticket};
use crate::utils::error::AppError;

/// Outbound holder notifications. Dispatch is fire-and-forget: the lifecycle
/// engine spawns these calls and logs failures, so an unreachable mail
/// service can never fail an issuance or cancellation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// One message per holder; `tickets` is the holder's group from a single
    /// issuance call.
    async fn ticket_issued(&self, tickets: &[Ticket], event: &Event) -> Result<(), AppError>;

    async fn ticket_cancelled(&self, ticket: &Ticket) -> Result<(), AppError>;

    async fn ticket_transferred(&self, ticket: &Ticket) -> Result<(), AppError>;
}

/// Default notifier: records the dispatch in the log stream. Real delivery
/// (mail, push) lives behind this seam outside this service.
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn ticket_issued(&self, tickets: &[Ticket], event: &Event) -> Result<(), AppError> {
        let holder = tickets.first().map(|t| t.holder_email.as_str()).unwrap_or("");
        tracing::info!(
            holder = %holder,
            event = %event.id,
            count = tickets.len(),
            "Dispatching ticket notification"
        );
        Ok(())
    }

    async fn ticket_cancelled(&self, ticket: &Ticket) -> Result<(), AppError> {
        tracing::info!(
            holder = %ticket.holder_email,
            ticket = %ticket.id,
            "Dispatching cancellation notification"
        );
        Ok(())
    }

    async fn ticket_transferred(&self, ticket: &Ticket) -> Result<(), AppError> {
        tracing::info!(
            holder = %ticket.holder_email,
            ticket = %ticket.id,
            "Dispatching transfer notification"
        );
        Ok(())
    }
}

/// Test notifier: remembers every dispatch so tests can assert on grouping
/// and recipients.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<NotificationRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationRecord {
    Issued { holder_email: String, count: usize },
    Cancelled { holder_email: String },
    Transferred { holder_email: String },
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn push(&self, record: NotificationRecord) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(record);
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn ticket_issued(&self, tickets: &[Ticket], _event: &Event) -> Result<(), AppError> {
        let holder_email = tickets
            .first()
            .map(|t| t.holder_email.clone())
            .unwrap_or_default();
        self.push(NotificationRecord::Issued {
            holder_email,
            count: tickets.len(),
        });
        Ok(())
    }

    async fn ticket_cancelled(&self, ticket: &Ticket) -> Result<(), AppError> {
        self.push(NotificationRecord::Cancelled {
            holder_email: ticket.holder_email.clone(),
        });
        Ok(())
    }

    async fn ticket_transferred(&self, ticket: &Ticket) -> Result<(), AppError> {
        self.push(NotificationRecord::Transferred {
            holder_email: ticket.holder_email.clone(),
        });
        Ok(())
    }
}
