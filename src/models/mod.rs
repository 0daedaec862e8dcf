pub mod event;
pub mod ticket;

pub use event::Event;
pub use ticket::{
    EventStats, IssueRequest, RedemptionResult, RejectionReason, Ticket, TicketSpec, TicketStatus,
    TicketUpdate, ValidationOutcome,
};
