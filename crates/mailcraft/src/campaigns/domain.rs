use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::email::template::TemplateId;
use crate::email::variables::CompanyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub Uuid);

impl CampaignId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Identifier wrapper for customers targeted by campaigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Identifier wrapper for contact tags used as the recipient filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromAddressId(pub Uuid);

impl FromAddressId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Campaign-level lifecycle. `Sent` is terminal; `Failed` is terminal for the
/// send attempt it records, with re-queueing as the one sanctioned way back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Queued,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Queued => "queued",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Failed => "failed",
        }
    }

    /// Transition table for the campaign state machine.
    pub const fn can_transition(self, next: CampaignStatus) -> bool {
        matches!(
            (self, next),
            (CampaignStatus::Draft, CampaignStatus::Queued)
                | (CampaignStatus::Queued, CampaignStatus::Sending)
                | (CampaignStatus::Sending, CampaignStatus::Sent)
                | (CampaignStatus::Sending, CampaignStatus::Failed)
                | (CampaignStatus::Failed, CampaignStatus::Queued)
        )
    }
}

/// Per-recipient delivery state. Severity orders the webhook conflict
/// resolution: Bounced > Clicked > Opened > Sent, so an out-of-order "open"
/// can never regress a contact already marked Bounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Pending,
    Sent,
    Opened,
    Clicked,
    Bounced,
    Failed,
}

impl ContactStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::Sent => "sent",
            ContactStatus::Opened => "opened",
            ContactStatus::Clicked => "clicked",
            ContactStatus::Bounced => "bounced",
            ContactStatus::Failed => "failed",
        }
    }

    /// A settled contact no longer blocks campaign completion.
    pub const fn is_settled(self) -> bool {
        !matches!(self, ContactStatus::Pending)
    }

    pub const fn severity(self) -> u8 {
        match self {
            ContactStatus::Pending => 0,
            ContactStatus::Sent => 1,
            ContactStatus::Opened => 2,
            ContactStatus::Clicked => 3,
            ContactStatus::Bounced => 4,
            ContactStatus::Failed => 5,
        }
    }

    /// Transition table for the per-recipient state machine.
    pub const fn can_transition(self, next: ContactStatus) -> bool {
        matches!(
            (self, next),
            (ContactStatus::Pending, ContactStatus::Sent)
                | (ContactStatus::Pending, ContactStatus::Failed)
                | (ContactStatus::Sent, ContactStatus::Opened)
                | (ContactStatus::Sent, ContactStatus::Clicked)
                | (ContactStatus::Sent, ContactStatus::Bounced)
                | (ContactStatus::Sent, ContactStatus::Failed)
                | (ContactStatus::Opened, ContactStatus::Clicked)
                | (ContactStatus::Opened, ContactStatus::Bounced)
                | (ContactStatus::Clicked, ContactStatus::Bounced)
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid contact transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// One scheduled send of a template to a recipient set. The tag filter is
/// fixed at creation; later tag-membership changes never alter the snapshot
/// taken at queue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub company_id: CompanyId,
    pub subject: String,
    pub preheader_text: String,
    pub from_address_id: FromAddressId,
    pub email_template_id: TemplateId,
    pub reply_to: Option<String>,
    pub contact_tag_ids: Vec<TagId>,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When a worker won the Queued -> Sending claim. Scheduled campaigns can
    /// sit Queued far longer than any dispatch timeout, so staleness is
    /// measured from here, never from queue time.
    pub claimed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Campaign {
    /// A queued campaign becomes claimable once its schedule has passed.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Queued
            && self.scheduled_at.map(|at| at <= now).unwrap_or(true)
    }
}

/// Immutable recipient snapshot, one row per `(campaign, customer)`. The
/// delivery timestamps are independent, non-exclusive columns: a click stamps
/// `clicked_at` even when no open event was ever received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignContact {
    pub campaign_id: CampaignId,
    pub customer_id: CustomerId,
    pub email: String,
    pub status: ContactStatus,
    pub provider_message_id: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl CampaignContact {
    pub fn pending(
        campaign_id: CampaignId,
        customer_id: CustomerId,
        email: String,
        queued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            campaign_id,
            customer_id,
            email,
            status: ContactStatus::Pending,
            provider_message_id: None,
            queued_at,
            sent_at: None,
            opened_at: None,
            clicked_at: None,
            bounced_at: None,
            error_message: None,
        }
    }

    pub fn transition(&mut self, next: ContactStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition(next) {
            return Err(InvalidTransition {
                from: self.status.label(),
                to: next.label(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_sent(
        &mut self,
        provider_message_id: String,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.transition(ContactStatus::Sent)?;
        self.provider_message_id = Some(provider_message_id);
        self.sent_at = Some(now);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: String) -> Result<(), InvalidTransition> {
        self.transition(ContactStatus::Failed)?;
        self.error_message = Some(error);
        Ok(())
    }
}

/// Normalized webhook event categories this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Open,
    Click,
    Bounce,
    Complaint,
}

impl EventType {
    pub const fn label(self) -> &'static str {
        match self {
            EventType::Open => "open",
            EventType::Click => "click",
            EventType::Bounce => "bounce",
            EventType::Complaint => "complaint",
        }
    }

    /// The contact status this event argues for; complaints are audit-only.
    pub const fn implied_status(self) -> Option<ContactStatus> {
        match self {
            EventType::Open => Some(ContactStatus::Opened),
            EventType::Click => Some(ContactStatus::Clicked),
            EventType::Bounce => Some(ContactStatus::Bounced),
            EventType::Complaint => None,
        }
    }
}

/// Append-only audit row: one per received webhook delivery, duplicates
/// included. Rows are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub campaign_id: CampaignId,
    pub customer_id: CustomerId,
    pub event_type: EventType,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}
