#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use doorpass_server::models::{Event, IssueRequest, TicketSpec};
use doorpass_server::notify::RecordingNotifier;
use doorpass_server::service::{ReportingService, TicketService};
use doorpass_server::store::{EventDirectory, InMemoryEventDirectory, InMemoryTicketStore, TicketStore};

pub struct TestContext {
    pub service: TicketService,
    pub reporting: ReportingService,
    pub store: Arc<InMemoryTicketStore>,
    pub directory: Arc<InMemoryEventDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub event: Event,
}

/// Fresh service stack over in-memory collaborators, with one event seeded.
pub fn setup() -> TestContext {
    let store = Arc::new(InMemoryTicketStore::new());
    let directory = Arc::new(InMemoryEventDirectory::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let event = make_event(Uuid::new_v4(), vec![]);
    directory.insert(event.clone());

    let service = TicketService::new(
        Arc::clone(&store) as Arc<dyn TicketStore>,
        Arc::clone(&directory) as Arc<dyn EventDirectory>,
        Arc::clone(&notifier) as Arc<dyn doorpass_server::notify::Notifier>,
    );
    let reporting = ReportingService::new(Arc::clone(&store) as Arc<dyn TicketStore>);

    TestContext {
        service,
        reporting,
        store,
        directory,
        notifier,
        event,
    }
}

pub fn make_event(host_id: Uuid, validators: Vec<Uuid>) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        host_id,
        title: "Test Event".to_string(),
        starts_at: now,
        ends_at: None,
        validators,
        created_at: now,
        updated_at: now,
    }
}

pub fn spec(email: &str) -> TicketSpec {
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

pub fn request(specs: Vec<TicketSpec>) -> IssueRequest {
    IssueRequest {
        tickets: specs,
        order_id: None,
        user_id: None,
        valid_from: None,
        valid_until: None,
    }
}

/// Notifications are dispatched on spawned tasks; poll until `count` records
/// have landed or a short deadline passes.
pub async fn wait_for_records(notifier: &RecordingNotifier, count: usize) {
    for _ in 0..200 {
        if notifier.records().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {} notification records, got {}",
        count,
        notifier.records().len()
    );
}
