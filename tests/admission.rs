mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::{make_event, request, setup, spec};
use doorpass_server::auth::{AdmissionControl, CallerId, EventScope};
use doorpass_server::store::{EventDirectory, TicketStore};
use doorpass_server::utils::error::AppError;

fn admission(ctx: &common::TestContext) -> AdmissionControl {
    AdmissionControl::new(
        Arc::clone(&ctx.directory) as Arc<dyn EventDirectory>,
        Arc::clone(&ctx.store) as Arc<dyn TicketStore>,
    )
}

#[tokio::test]
async fn test_host_and_validator_permitted_stranger_denied() {
    let ctx = setup();
    let host = Uuid::new_v4();
    let validator = Uuid::new_v4();
    let event = make_event(host, vec![validator]);
    ctx.directory.insert(event.clone());

    let admission = admission(&ctx);

    let as_host = admission
        .authorize(CallerId(host), EventScope::Event(event.id))
        .await
        .unwrap();
    assert_eq!(as_host.id, event.id);

    admission
        .authorize(CallerId(validator), EventScope::Event(event.id))
        .await
        .unwrap();

    let err = admission
        .authorize(CallerId(Uuid::new_v4()), EventScope::Event(event.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_event_resolved_through_ticket_and_code() {
    let ctx = setup();
    let ticket = ctx
        .service
        .issue(ctx.event.id, request(vec![spec("a@x.com")]))
        .await
        .unwrap()
        .remove(0);

    let admission = admission(&ctx);
    let host = CallerId(ctx.event.host_id);

    let via_ticket = admission
        .authorize(host, EventScope::Ticket(ticket.id))
        .await
        .unwrap();
    assert_eq!(via_ticket.id, ctx.event.id);

    let via_code = admission
        .authorize(host, EventScope::Code(ticket.code.clone()))
        .await
        .unwrap();
    assert_eq!(via_code.id, ctx.event.id);
}

#[tokio::test]
async fn test_unresolvable_scope_is_denied_not_passed_through() {
    let ctx = setup();
    let admission = admission(&ctx);
    let host = CallerId(ctx.event.host_id);

    let err = admission
        .authorize(host, EventScope::Code("TKT-unknown".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = admission
        .authorize(host, EventScope::Ticket(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let ctx = setup();
    let admission = admission(&ctx);
    let err = admission
        .authorize(CallerId(Uuid::new_v4()), EventScope::Event(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
