mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use mailcraft::campaigns::{
    CampaignContact, CampaignId, CampaignRepository, ContactStatus, CustomerId, EventIngestor,
    EventType, IngestError, WebhookEvent,
};
use serde_json::json;
use support::MemoryCampaignRepository;

struct Fixture {
    repository: Arc<MemoryCampaignRepository>,
    ingestor: EventIngestor<MemoryCampaignRepository>,
    campaign_id: CampaignId,
    customer_id: CustomerId,
}

/// A contact that dispatch already marked Sent with a provider message id.
fn fixture() -> Fixture {
    let repository = Arc::new(MemoryCampaignRepository::default());
    let campaign_id = CampaignId::generate();
    let customer_id = CustomerId("cust-1".to_string());

    let mut contact = CampaignContact::pending(
        campaign_id,
        customer_id.clone(),
        "amy@example.com".to_string(),
        Utc::now(),
    );
    contact
        .mark_sent("msg-0001".to_string(), Utc::now())
        .expect("pending contact marks sent");
    repository
        .insert_contacts(vec![contact])
        .expect("contact inserted");

    let ingestor = EventIngestor::new(repository.clone());
    Fixture {
        repository,
        ingestor,
        campaign_id,
        customer_id,
    }
}

fn event(event_type: EventType) -> WebhookEvent {
    WebhookEvent {
        provider_message_id: "msg-0001".to_string(),
        event_type,
        payload: json!({"ip": "203.0.113.9"}),
        occurred_at: Utc::now(),
    }
}

#[test]
fn open_event_raises_status_and_stamps_opened_at() {
    let fx = fixture();
    let outcome = fx
        .ingestor
        .ingest(event(EventType::Open), Utc::now())
        .expect("ingest");

    assert!(outcome.status_changed);
    assert_eq!(outcome.status, ContactStatus::Opened);

    let contact = fx
        .repository
        .contact(&fx.campaign_id, &fx.customer_id)
        .expect("contact");
    assert!(contact.opened_at.is_some());
    assert!(contact.clicked_at.is_none());
}

#[test]
fn bounce_then_open_keeps_bounced_with_both_timestamps() {
    let fx = fixture();
    fx.ingestor
        .ingest(event(EventType::Bounce), Utc::now())
        .expect("bounce ingests");
    let outcome = fx
        .ingestor
        .ingest(event(EventType::Open), Utc::now())
        .expect("late open ingests");

    assert!(!outcome.status_changed, "open must not regress a bounce");
    assert_eq!(outcome.status, ContactStatus::Bounced);

    let contact = fx
        .repository
        .contact(&fx.campaign_id, &fx.customer_id)
        .expect("contact");
    assert_eq!(contact.status, ContactStatus::Bounced);
    assert!(contact.bounced_at.is_some());
    assert!(contact.opened_at.is_some(), "timestamps are independent");
}

#[test]
fn click_without_open_still_stamps_clicked_at() {
    let fx = fixture();
    let outcome = fx
        .ingestor
        .ingest(event(EventType::Click), Utc::now())
        .expect("ingest");

    assert_eq!(outcome.status, ContactStatus::Clicked);
    let contact = fx
        .repository
        .contact(&fx.campaign_id, &fx.customer_id)
        .expect("contact");
    assert!(contact.clicked_at.is_some());
    assert!(contact.opened_at.is_none());
}

#[test]
fn duplicate_delivery_appends_two_audit_rows_without_status_change() {
    let fx = fixture();
    fx.ingestor
        .ingest(event(EventType::Open), Utc::now())
        .expect("first delivery");
    let outcome = fx
        .ingestor
        .ingest(event(EventType::Open), Utc::now())
        .expect("duplicate delivery");

    assert!(!outcome.status_changed);
    assert_eq!(outcome.status, ContactStatus::Opened);

    let events = fx
        .repository
        .events(&fx.campaign_id, &fx.customer_id)
        .expect("event log");
    assert_eq!(events.len(), 2, "duplicates stay in the audit log");
}

#[test]
fn complaint_is_logged_but_never_changes_status() {
    let fx = fixture();
    let outcome = fx
        .ingestor
        .ingest(event(EventType::Complaint), Utc::now())
        .expect("ingest");

    assert!(!outcome.status_changed);
    assert_eq!(outcome.status, ContactStatus::Sent);
    assert_eq!(fx.repository.all_events().len(), 1);
}

#[test]
fn unknown_message_id_is_rejected_for_provider_retry() {
    let fx = fixture();
    let mut unknown = event(EventType::Open);
    unknown.provider_message_id = "msg-9999".to_string();

    let error = fx
        .ingestor
        .ingest(unknown, Utc::now())
        .expect_err("webhook outran dispatch");
    assert!(matches!(error, IngestError::UnknownMessage { .. }));
    assert!(
        fx.repository.all_events().is_empty(),
        "nothing is logged until the contact exists"
    );
}

#[test]
fn out_of_order_click_then_open_settles_on_clicked() {
    let fx = fixture();
    let now = Utc::now();

    let mut click = event(EventType::Click);
    click.occurred_at = now;
    let mut open = event(EventType::Open);
    open.occurred_at = now - Duration::seconds(30);

    fx.ingestor.ingest(click, now).expect("click ingests");
    let outcome = fx.ingestor.ingest(open, now).expect("open ingests");

    assert_eq!(outcome.status, ContactStatus::Clicked);
    let contact = fx
        .repository
        .contact(&fx.campaign_id, &fx.customer_id)
        .expect("contact");
    assert_eq!(contact.status, ContactStatus::Clicked);
    assert!(contact.opened_at.is_some());
    assert!(contact.clicked_at.is_some());
}

#[test]
fn event_log_preserves_raw_payloads() {
    let fx = fixture();
    fx.ingestor
        .ingest(event(EventType::Bounce), Utc::now())
        .expect("ingest");

    let events = fx.repository.all_events();
    assert_eq!(events[0].payload, json!({"ip": "203.0.113.9"}));
    assert_eq!(events[0].event_type, EventType::Bounce);
}
