mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::{request, setup, spec};
use doorpass_server::models::{IssueRequest, TicketSpec, TicketStatus};

fn typed_spec(email: &str, ticket_type: &str) -> TicketSpec {
    TicketSpec {
        ticket_type: ticket_type.to_string(),
        ..spec(email)
    }
}

#[tokio::test]
async fn test_stats_consistency() {
    let ctx = setup();

    let specs = (0..10).map(|i| spec(&format!("holder{}@x.com", i))).collect();
    let tickets = ctx.service.issue(ctx.event.id, request(specs)).await.unwrap();

    for ticket in tickets.iter().take(3) {
        let result = ctx.service.redeem(&ticket.code, "scanner-1", None).await.unwrap();
        assert!(result.success);
    }
    for ticket in tickets.iter().skip(3).take(2) {
        ctx.service.cancel(ticket.id, None).await.unwrap();
    }

    let stats = ctx.reporting.stats(ctx.event.id).await.unwrap();
    assert_eq!(stats.total_tickets, 10);
    assert_eq!(stats.redeemed_tickets, 3);
    assert_eq!(stats.cancelled_tickets, 2);
    assert_eq!(stats.valid_tickets, 5);
    assert_eq!(stats.expired_tickets, 0);
    assert!((stats.check_in_rate - 0.3).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_stats_empty_event_rate_is_zero() {
    let ctx = setup();
    let stats = ctx.reporting.stats(Uuid::new_v4()).await.unwrap();
    assert_eq!(stats.total_tickets, 0);
    assert_eq!(stats.check_in_rate, 0.0);
    assert!(stats.by_type.is_empty());
}

#[tokio::test]
async fn test_stats_counts_by_type() {
    let ctx = setup();
    let specs = vec![
        typed_spec("a@x.com", "vip"),
        typed_spec("b@x.com", "vip"),
        typed_spec("c@x.com", "general"),
    ];
    ctx.service.issue(ctx.event.id, request(specs)).await.unwrap();

    let stats = ctx.reporting.stats(ctx.event.id).await.unwrap();
    assert_eq!(stats.by_type.get("vip"), Some(&2));
    assert_eq!(stats.by_type.get("general"), Some(&1));
}

#[tokio::test]
async fn test_stats_counts_lapsed_window_as_expired() {
    let ctx = setup();
    let req = IssueRequest {
        valid_until: Some(Utc::now() - Duration::hours(1)),
        ..request(vec![spec("a@x.com")])
    };
    ctx.service.issue(ctx.event.id, req).await.unwrap();
    ctx.service
        .issue(ctx.event.id, request(vec![spec("b@x.com")]))
        .await
        .unwrap();

    let stats = ctx.reporting.stats(ctx.event.id).await.unwrap();
    assert_eq!(stats.total_tickets, 2);
    assert_eq!(stats.expired_tickets, 1);
    assert_eq!(stats.valid_tickets, 1);
}

#[tokio::test]
async fn test_check_in_history_ordering_and_cap() {
    let ctx = setup();
    let specs = (0..5).map(|i| spec(&format!("holder{}@x.com", i))).collect();
    let tickets = ctx.service.issue(ctx.event.id, request(specs)).await.unwrap();

    for ticket in &tickets {
        let result = ctx.service.redeem(&ticket.code, "scanner-1", None).await.unwrap();
        assert!(result.success);
    }

    let history = ctx.reporting.check_in_history(ctx.event.id, None).await.unwrap();
    assert_eq!(history.len(), 5);
    for entry in &history {
        assert_eq!(entry.status, TicketStatus::Redeemed);
    }
    // Most recent check-in first.
    for pair in history.windows(2) {
        assert!(pair[0].redeemed_at >= pair[1].redeemed_at);
    }

    let capped = ctx
        .reporting
        .check_in_history(ctx.event.id, Some(2))
        .await
        .unwrap();
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[0].id, history[0].id);
}

#[tokio::test]
async fn test_history_ignores_unredeemed_tickets() {
    let ctx = setup();
    let tickets = ctx
        .service
        .issue(ctx.event.id, request(vec![spec("a@x.com"), spec("b@x.com")]))
        .await
        .unwrap();
    ctx.service.redeem(&tickets[0].code, "scanner-1", None).await.unwrap();

    let history = ctx.reporting.check_in_history(ctx.event.id, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, tickets[0].id);
}
