use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Ticket state machine. `VALID` is the only non-terminal state; redemption
/// and cancellation are terminal. `EXPIRED` exists as a stored status for
/// completeness, but expiry is enforced as a time check at validation and
/// redemption time, so a ticket past its window may still read `VALID` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ticket_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Valid,
    Redeemed,
    Cancelled,
    Expired,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::Valid => "VALID",
            TicketStatus::Redeemed => "REDEEMED",
            TicketStatus::Cancelled => "CANCELLED",
            TicketStatus::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// One admission ticket. `id` is the internal identifier used for admin
/// lookups; `code` is the opaque value presented at the door (e.g. via QR).
/// They are generated independently so a reissue can mint a new presentable
/// code without colliding with record identity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub code: String,
    pub event_id: Uuid,
    pub order_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub ticket_type: String,
    pub ticket_type_name: Option<String>,
    pub price: Decimal,
    pub holder_email: String,
    pub holder_name: Option<String>,
    pub holder_phone: Option<String>,
    pub status: TicketStatus,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<String>,
    pub check_in_count: i32,
    pub max_check_ins: i32,
    pub metadata: Value,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-ticket input to issuance. `ticket_type` and `holder_email` are
/// required; everything else falls back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSpec {
    pub ticket_type: String,
    pub holder_email: String,
    pub ticket_type_name: Option<String>,
    pub price: Option<Decimal>,
    pub holder_name: Option<String>,
    pub holder_phone: Option<String>,
    pub max_check_ins: Option<i32>,
    pub metadata: Option<Value>,
}

/// Body of a bulk issuance call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    pub tickets: Vec<TicketSpec>,
    pub order_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// General field patch applied by `TicketStore::update`. `None` leaves the
/// stored value untouched; there is no way to unset a field through a patch.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub user_id: Option<Uuid>,
    pub holder_email: Option<String>,
    pub holder_name: Option<String>,
    pub holder_phone: Option<String>,
    pub notes: Option<String>,
    pub metadata: Option<Value>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// The closed set of reasons a door scanner can receive for a failed
/// validation or redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NotFound,
    WrongEvent,
    AlreadyRedeemed,
    Cancelled,
    Expired,
    NotYetValid,
}

impl RejectionReason {
    pub fn message(self) -> &'static str {
        match self {
            RejectionReason::NotFound => "Ticket not found",
            RejectionReason::WrongEvent => "Ticket belongs to a different event",
            RejectionReason::AlreadyRedeemed => "Ticket already redeemed",
            RejectionReason::Cancelled => "Ticket has been cancelled",
            RejectionReason::Expired => "Ticket has expired",
            RejectionReason::NotYetValid => "Ticket is not yet valid",
        }
    }
}

/// Verdict of a read-only validation. The ticket (when found) rides along so
/// scanner UIs can show holder details before committing to redeem.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: Option<RejectionReason>,
    pub ticket: Option<Ticket>,
}

impl ValidationOutcome {
    pub fn ok(ticket: Ticket) -> Self {
        Self {
            valid: true,
            reason: None,
            ticket: Some(ticket),
        }
    }

    pub fn rejected(reason: RejectionReason, ticket: Option<Ticket>) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            ticket,
        }
    }
}

/// Outcome of a redemption attempt. `already_redeemed` distinguishes the
/// lost-race / double-scan case from other rejections so the door UI can
/// render "already scanned" specifically.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionResult {
    pub success: bool,
    pub already_redeemed: bool,
    pub ticket: Option<Ticket>,
    pub message: String,
}

impl RedemptionResult {
    pub fn redeemed(ticket: Ticket) -> Self {
        Self {
            success: true,
            already_redeemed: false,
            ticket: Some(ticket),
            message: "Ticket redeemed".to_string(),
        }
    }

    pub fn already_redeemed(ticket: Ticket) -> Self {
        Self {
            success: false,
            already_redeemed: true,
            ticket: Some(ticket),
            message: RejectionReason::AlreadyRedeemed.message().to_string(),
        }
    }

    pub fn rejected(reason: RejectionReason, ticket: Option<Ticket>) -> Self {
        Self {
            success: false,
            already_redeemed: reason == RejectionReason::AlreadyRedeemed,
            ticket,
            message: reason.message().to_string(),
        }
    }
}

/// Per-event counters computed by the reporting aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct EventStats {
    pub total_tickets: i64,
    pub valid_tickets: i64,
    pub redeemed_tickets: i64,
    pub cancelled_tickets: i64,
    pub expired_tickets: i64,
    pub check_in_rate: f64,
    pub by_type: HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_matches_wire_form() {
        assert_eq!(TicketStatus::Redeemed.to_string(), "REDEEMED");
        assert_eq!(TicketStatus::Valid.to_string(), "VALID");
    }

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&TicketStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        let parsed: TicketStatus = serde_json::from_str("\"REDEEMED\"").unwrap();
        assert_eq!(parsed, TicketStatus::Redeemed);
    }

    #[test]
    fn test_rejection_reasons_render_closed_message_set() {
        assert_eq!(RejectionReason::NotFound.message(), "Ticket not found");
        assert_eq!(
            RejectionReason::AlreadyRedeemed.message(),
            "Ticket already redeemed"
        );
        assert_eq!(
            RejectionReason::NotYetValid.message(),
            "Ticket is not yet valid"
        );
    }

    #[test]
    fn test_rejected_result_flags_double_scan_only() {
        let lost = RedemptionResult::rejected(RejectionReason::AlreadyRedeemed, None);
        assert!(lost.already_redeemed);
        let expired = RedemptionResult::rejected(RejectionReason::Expired, None);
        assert!(!expired.already_redeemed);
        assert!(!expired.success);
    }
}
