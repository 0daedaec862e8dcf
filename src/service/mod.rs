pub mod reporting;
pub mod tickets;

pub use reporting::ReportingService;
pub use tickets::TicketService;
