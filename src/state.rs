use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::AdmissionControl;
use crate::notify::{Notifier, TracingNotifier};
use crate::service::{ReportingService, TicketService};
use crate::store::{EventDirectory, PgEventDirectory, PgTicketStore, TicketStore};

/// Shared handler state: the three service facades over one store pair.
#[derive(Clone)]
pub struct AppState {
    pub tickets: TicketService,
    pub reporting: ReportingService,
    pub admission: AdmissionControl,
}

impl AppState {
    /// Wires the production Postgres store and the logging notifier.
    pub fn with_pool(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PgTicketStore::new(pool.clone())),
            Arc::new(PgEventDirectory::new(pool)),
            Arc::new(TracingNotifier),
        )
    }

    pub fn new(
        store: Arc<dyn TicketStore>,
        events: Arc<dyn EventDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tickets: TicketService::new(Arc::clone(&store), Arc::clone(&events), notifier),
            reporting: ReportingService::new(Arc::clone(&store)),
            admission: AdmissionControl::new(events, store),
        }
    }
}
