use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Event, IssueRequest, RedemptionResult, RejectionReason, Ticket, TicketSpec, TicketStatus,
    TicketUpdate, ValidationOutcome,
};
use crate::notify::Notifier;
use crate::store::{EventDirectory, TicketStore};
use crate::utils::error::AppError;

/// How many identifier regenerations a single colliding record gets before
/// the collision is surfaced to the caller.
const ID_RETRY_ATTEMPTS: u32 = 3;

/// The ticket lifecycle engine. Stateless: every operation is one or two
/// store round-trips, and all coordination between concurrent instances is
/// delegated to the store's conditional atomic update. No in-process locks,
/// caches, or blacklists anywhere in here.
#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    events: Arc<dyn EventDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl TicketService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        events: Arc<dyn EventDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            events,
            notifier,
        }
    }

    /// Issues one ticket per spec in a single batch, each with a fresh
    /// `id`/`code` pair, and notifies holders asynchronously (one message per
    /// distinct `holder_email`).
    pub async fn issue(
        &self,
        event_id: Uuid,
        request: IssueRequest,
    ) -> Result<Vec<Ticket>, AppError> {
        if request.tickets.is_empty() {
            return Err(AppError::ValidationError(
                "At least one ticket spec is required".to_string(),
            ));
        }
        for spec in &request.tickets {
            validate_spec(spec)?;
        }

        let event = self
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;

        let tickets: Vec<Ticket> = request
            .tickets
            .iter()
            .map(|spec| {
                build_ticket(
                    event_id,
                    spec,
                    request.order_id,
                    request.user_id,
                    request.valid_from,
                    request.valid_until,
                )
            })
            .collect();

        let created = match self.store.create_bulk(tickets.clone()).await {
            Ok(created) => created,
            // A generated identifier collided somewhere in the batch. Fall
            // back to per-record inserts so only the colliding record gets
            // regenerated.
            Err(AppError::DuplicateKey(_)) => self.create_with_retry(tickets).await?,
            Err(e) => return Err(e),
        };

        self.notify_issued(&created, event);

        Ok(created)
    }

    async fn create_with_retry(&self, tickets: Vec<Ticket>) -> Result<Vec<Ticket>, AppError> {
        let mut created = Vec::with_capacity(tickets.len());
        for mut ticket in tickets {
            let mut attempts = 0;
            loop {
                match self.store.create(ticket.clone()).await {
                    Ok(t) => {
                        created.push(t);
                        break;
                    }
                    Err(AppError::DuplicateKey(msg)) => {
                        attempts += 1;
                        if attempts >= ID_RETRY_ATTEMPTS {
                            return Err(AppError::DuplicateKey(msg));
                        }
                        tracing::warn!(
                            ticket = %ticket.id,
                            attempt = attempts,
                            "Identifier collision during issuance, regenerating"
                        );
                        regenerate_identity(&mut ticket);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(created)
    }

    /// Read-only verdict on a code. Returns the ticket (when found) with the
    /// verdict so a scanner can show holder details before redeeming.
    pub async fn validate(
        &self,
        code: &str,
        event_id: Option<Uuid>,
    ) -> Result<ValidationOutcome, AppError> {
        let Some(ticket) = self.store.find_by_code(code).await? else {
            return Ok(ValidationOutcome::rejected(RejectionReason::NotFound, None));
        };
        match rejection_for(&ticket, event_id, Utc::now()) {
            Some(reason) => Ok(ValidationOutcome::rejected(reason, Some(ticket))),
            None => Ok(ValidationOutcome::ok(ticket)),
        }
    }

    /// Redeems a code exactly once. The pre-check gives fast, informative
    /// rejections; the store's conditional update is the only step that can
    /// flip a ticket to `REDEEMED`, so concurrent callers on the same code
    /// race there and exactly one wins.
    pub async fn redeem(
        &self,
        code: &str,
        redeemed_by: &str,
        event_id: Option<Uuid>,
    ) -> Result<RedemptionResult, AppError> {
        let precheck = self.validate(code, event_id).await?;
        if !precheck.valid {
            let reason = precheck.reason.unwrap_or(RejectionReason::NotFound);
            return Ok(RedemptionResult::rejected(reason, precheck.ticket));
        }

        let now = Utc::now();
        if let Some(ticket) = self.store.redeem_if_valid(code, redeemed_by, now).await? {
            tracing::info!(
                ticket = %ticket.id,
                event = %ticket.event_id,
                redeemed_by,
                "Ticket redeemed"
            );
            return Ok(RedemptionResult::redeemed(ticket));
        }

        // Predicate missed between pre-check and write: re-read to say why.
        match self.store.find_by_code(code).await? {
            None => Ok(RedemptionResult::rejected(RejectionReason::NotFound, None)),
            Some(ticket) if ticket.status == TicketStatus::Redeemed => {
                // The race case: a concurrent redeemer won.
                Ok(RedemptionResult::already_redeemed(ticket))
            }
            Some(ticket) => {
                let reason = rejection_for(&ticket, event_id, now)
                    .unwrap_or(RejectionReason::AlreadyRedeemed);
                Ok(RedemptionResult::rejected(reason, Some(ticket)))
            }
        }
    }

    /// Cancels a not-yet-redeemed ticket, recording the reason in `notes`.
    pub async fn cancel(
        &self,
        ticket_id: Uuid,
        reason: Option<String>,
    ) -> Result<Ticket, AppError> {
        let patch = TicketUpdate {
            status: Some(TicketStatus::Cancelled),
            notes: reason,
            ..Default::default()
        };
        let cancelled = self.patch_unless_redeemed(ticket_id, patch, "cancelled").await?;

        self.notify_cancelled(cancelled.clone());

        Ok(cancelled)
    }

    /// Replaces a ticket: cancels the original and mints an unrelated record
    /// with fresh identifiers, copying the business fields. Only a `VALID`
    /// ticket may be reissued, so a second reissue of the same original fails
    /// with `InvalidState`. Explicitly not idempotent.
    pub async fn reissue(&self, ticket_id: Uuid) -> Result<Ticket, AppError> {
        let original = self.require(ticket_id).await?;
        if original.status != TicketStatus::Valid {
            return Err(AppError::InvalidState(format!(
                "Only a VALID ticket can be reissued (current status: {})",
                original.status
            )));
        }

        let patch = TicketUpdate {
            status: Some(TicketStatus::Cancelled),
            notes: Some("Reissued".to_string()),
            ..Default::default()
        };
        self.patch_unless_redeemed(ticket_id, patch, "reissued").await?;

        let mut replacement = copy_business_fields(&original);
        let mut attempts = 0;
        let replacement = loop {
            match self.store.create(replacement.clone()).await {
                Ok(t) => break t,
                Err(AppError::DuplicateKey(msg)) => {
                    attempts += 1;
                    if attempts >= ID_RETRY_ATTEMPTS {
                        return Err(AppError::DuplicateKey(msg));
                    }
                    regenerate_identity(&mut replacement);
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(
            original = %original.id,
            replacement = %replacement.id,
            "Ticket reissued"
        );

        if let Some(event) = self.events.find_by_id(original.event_id).await? {
            self.notify_issued(std::slice::from_ref(&replacement), event);
        }

        Ok(replacement)
    }

    /// Moves a not-yet-redeemed ticket to a new holder. The code is
    /// unchanged; only holder identity moves.
    pub async fn transfer(
        &self,
        ticket_id: Uuid,
        new_email: &str,
        new_user_id: Option<Uuid>,
    ) -> Result<Ticket, AppError> {
        if new_email.trim().is_empty() {
            return Err(AppError::ValidationError(
                "holder_email is required".to_string(),
            ));
        }
        let patch = TicketUpdate {
            holder_email: Some(new_email.to_string()),
            user_id: new_user_id,
            ..Default::default()
        };
        let transferred = self
            .patch_unless_redeemed(ticket_id, patch, "transferred")
            .await?;

        self.notify_transferred(transferred.clone());

        Ok(transferred)
    }

    pub async fn get(&self, ticket_id: Uuid) -> Result<Ticket, AppError> {
        self.require(ticket_id).await
    }

    pub async fn delete(&self, ticket_id: Uuid) -> Result<(), AppError> {
        if self.store.delete(ticket_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Ticket {} not found",
                ticket_id
            )))
        }
    }

    pub async fn tickets_for_event(
        &self,
        event_id: Uuid,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, AppError> {
        self.store.find_by_event(event_id, status).await
    }

    pub async fn tickets_for_order(&self, order_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        self.store.find_by_order(order_id).await
    }

    pub async fn tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        self.store.find_by_user(user_id).await
    }

    pub async fn tickets_for_email(&self, email: &str) -> Result<Vec<Ticket>, AppError> {
        self.store.find_by_email(email).await
    }

    /// Routes a mutation through the store's guarded update so it can never
    /// land on a ticket a concurrent scanner just redeemed. A predicate miss
    /// is disambiguated with a re-read: missing ticket or terminal state.
    async fn patch_unless_redeemed(
        &self,
        ticket_id: Uuid,
        patch: TicketUpdate,
        action: &str,
    ) -> Result<Ticket, AppError> {
        if let Some(ticket) = self.store.update_if_not_redeemed(ticket_id, patch).await? {
            return Ok(ticket);
        }
        match self.store.find_by_id(ticket_id).await? {
            None => Err(AppError::NotFound(format!(
                "Ticket {} not found",
                ticket_id
            ))),
            Some(_) => Err(AppError::InvalidState(format!(
                "A redeemed ticket cannot be {}",
                action
            ))),
        }
    }

    async fn require(&self, ticket_id: Uuid) -> Result<Ticket, AppError> {
        self.store
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", ticket_id)))
    }

    fn notify_issued(&self, tickets: &[Ticket], event: Event) {
        let mut by_holder: HashMap<String, Vec<Ticket>> = HashMap::new();
        for ticket in tickets {
            by_holder
                .entry(ticket.holder_email.clone())
                .or_default()
                .push(ticket.clone());
        }
        for (holder, group) in by_holder {
            let notifier = Arc::clone(&self.notifier);
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.ticket_issued(&group, &event).await {
                    tracing::warn!(error = ?e, holder = %holder, "Ticket notification failed");
                }
            });
        }
    }

    fn notify_cancelled(&self, ticket: Ticket) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.ticket_cancelled(&ticket).await {
                tracing::warn!(error = ?e, ticket = %ticket.id, "Cancellation notification failed");
            }
        });
    }

    fn notify_transferred(&self, ticket: Ticket) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.ticket_transferred(&ticket).await {
                tracing::warn!(error = ?e, ticket = %ticket.id, "Transfer notification failed");
            }
        });
    }
}

/// Derives the rejection reason for a stored ticket, or `None` when the
/// ticket would currently be admitted. Window checks run against `now`
/// regardless of the stored status still reading `VALID`.
fn rejection_for(ticket: &Ticket, event_id: Option<Uuid>, now: DateTime<Utc>) -> Option<RejectionReason> {
    if event_id.is_some_and(|id| id != ticket.event_id) {
        return Some(RejectionReason::WrongEvent);
    }
    match ticket.status {
        TicketStatus::Redeemed => return Some(RejectionReason::AlreadyRedeemed),
        TicketStatus::Cancelled => return Some(RejectionReason::Cancelled),
        TicketStatus::Expired => return Some(RejectionReason::Expired),
        TicketStatus::Valid => {}
    }
    if ticket.valid_from.is_some_and(|from| now < from) {
        return Some(RejectionReason::NotYetValid);
    }
    if ticket.valid_until.is_some_and(|until| now > until) {
        return Some(RejectionReason::Expired);
    }
    None
}

fn validate_spec(spec: &TicketSpec) -> Result<(), AppError> {
    if spec.ticket_type.trim().is_empty() {
        return Err(AppError::ValidationError(
            "ticket_type is required".to_string(),
        ));
    }
    if spec.holder_email.trim().is_empty() || !spec.holder_email.contains('@') {
        return Err(AppError::ValidationError(format!(
            "holder_email '{}' is not a valid address",
            spec.holder_email
        )));
    }
    Ok(())
}

pub(crate) fn build_ticket(
    event_id: Uuid,
    spec: &TicketSpec,
    order_id: Option<Uuid>,
    user_id: Option<Uuid>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: Uuid::new_v4(),
        code: generate_code(),
        event_id,
        order_id,
        user_id,
        ticket_type: spec.ticket_type.clone(),
        ticket_type_name: spec.ticket_type_name.clone(),
        price: spec.price.unwrap_or(Decimal::ZERO),
        holder_email: spec.holder_email.clone(),
        holder_name: spec.holder_name.clone(),
        holder_phone: spec.holder_phone.clone(),
        status: TicketStatus::Valid,
        redeemed_at: None,
        redeemed_by: None,
        check_in_count: 0,
        max_check_ins: spec.max_check_ins.unwrap_or(1),
        metadata: spec
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        notes: None,
        issued_at: now,
        valid_from,
        valid_until,
        created_at: now,
        updated_at: now,
    }
}

/// Fresh replacement record for a reissue: business fields copied, identity
/// and lifecycle state reset.
fn copy_business_fields(original: &Ticket) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: Uuid::new_v4(),
        code: generate_code(),
        status: TicketStatus::Valid,
        redeemed_at: None,
        redeemed_by: None,
        check_in_count: 0,
        notes: None,
        issued_at: now,
        created_at: now,
        updated_at: now,
        ..original.clone()
    }
}

fn generate_code() -> String {
    format!("TKT-{}", Uuid::new_v4().simple())
}

fn regenerate_identity(ticket: &mut Ticket) {
    ticket.id = Uuid::new_v4();
    ticket.code = generate_code();
}
