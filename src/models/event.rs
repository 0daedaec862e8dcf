use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Directory view of an event: just enough to validate issuance targets and
/// to answer "who may administer tickets for this event". The full event
/// record (description, location, media) lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub validators: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Hosts and designated validators may perform ticket administration and
    /// door scanning for their event.
    pub fn permits(&self, caller: Uuid) -> bool {
        self.host_id == caller || self.validators.contains(&caller)
    }
}
