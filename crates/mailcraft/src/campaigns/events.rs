use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::campaigns::domain::{
    CampaignEvent, CampaignId, ContactStatus, CustomerId, EventType,
};
use crate::campaigns::repository::{CampaignRepository, RepositoryError};

/// Normalized webhook delivery from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub provider_message_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

/// What ingestion did with one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub campaign_id: CampaignId,
    pub customer_id: CustomerId,
    pub status: ContactStatus,
    pub status_changed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The webhook outran the dispatch write; the provider must retry so the
    /// delivery signal is never lost.
    #[error("no contact for provider message id '{provider_message_id}'")]
    UnknownMessage { provider_message_id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Applies asynchronous provider events to the per-recipient tracker and the
/// append-only audit log. Safe to run concurrently with ongoing dispatch.
pub struct EventIngestor<R> {
    repository: Arc<R>,
}

impl<R> EventIngestor<R>
where
    R: CampaignRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Ingest one delivery. The audit row is always appended, duplicates and
    /// out-of-order arrivals included. The timestamp columns are stamped
    /// independently of one another; only the single `status` field follows
    /// the severity precedence, so a late "open" never regresses a Bounced
    /// contact.
    pub fn ingest(
        &self,
        event: WebhookEvent,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        let mut contact = self
            .repository
            .contact_by_message_id(&event.provider_message_id)?
            .ok_or_else(|| IngestError::UnknownMessage {
                provider_message_id: event.provider_message_id.clone(),
            })?;

        self.repository.append_event(CampaignEvent {
            campaign_id: contact.campaign_id,
            customer_id: contact.customer_id.clone(),
            event_type: event.event_type,
            payload: event.payload,
            occurred_at: event.occurred_at,
            recorded_at: now,
        })?;

        match event.event_type {
            EventType::Open => {
                contact.opened_at.get_or_insert(event.occurred_at);
            }
            EventType::Click => {
                contact.clicked_at.get_or_insert(event.occurred_at);
            }
            EventType::Bounce => {
                contact.bounced_at.get_or_insert(event.occurred_at);
            }
            EventType::Complaint => {}
        }

        let status_changed = match event.event_type.implied_status() {
            Some(next)
                if next.severity() > contact.status.severity()
                    && contact.status.can_transition(next) =>
            {
                contact.status = next;
                true
            }
            _ => false,
        };

        self.repository.update_contact(contact.clone())?;

        if status_changed {
            info!(
                campaign = %contact.campaign_id.0,
                customer = %contact.customer_id.0,
                event = event.event_type.label(),
                status = contact.status.label(),
                "contact status raised by provider event"
            );
        } else {
            debug!(
                campaign = %contact.campaign_id.0,
                customer = %contact.customer_id.0,
                event = event.event_type.label(),
                "provider event recorded without status change"
            );
        }

        Ok(IngestOutcome {
            campaign_id: contact.campaign_id,
            customer_id: contact.customer_id,
            status: contact.status,
            status_changed,
        })
    }
}
