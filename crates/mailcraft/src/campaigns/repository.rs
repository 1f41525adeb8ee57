use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaigns::domain::{
    Campaign, CampaignContact, CampaignEvent, CampaignId, CustomerId, FromAddressId, TagId,
};
use crate::campaigns::domains::FromIdentity;

/// Storage abstraction for campaigns, contacts, and the event log so the
/// orchestrator and ingestor can be exercised in isolation.
pub trait CampaignRepository: Send + Sync {
    fn insert_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError>;
    fn update_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError>;
    fn delete_campaign(&self, id: &CampaignId) -> Result<(), RepositoryError>;
    fn campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError>;

    /// Atomic conditional claim: Queued -> Sending, only when the campaign is
    /// Queued and its schedule has passed. Exactly one caller receives
    /// `Some(campaign)`; everyone else gets `None`. A successful claim stamps
    /// `claimed_at` with `now` as part of the same atomic step.
    fn claim_queued(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, RepositoryError>;

    /// Queued campaigns whose schedule has passed, for the worker sweep.
    fn due_queued(&self, now: DateTime<Utc>) -> Result<Vec<CampaignId>, RepositoryError>;

    /// Campaigns currently Sending, for the stale-contact reconciliation sweep.
    fn sending_campaigns(&self) -> Result<Vec<CampaignId>, RepositoryError>;

    /// Insert recipient snapshots, skipping rows whose `(campaign, customer)`
    /// key already exists. Returns the number actually inserted; re-queue
    /// attempts therefore never duplicate rows.
    fn insert_contacts(&self, contacts: Vec<CampaignContact>) -> Result<usize, RepositoryError>;
    fn contacts(&self, campaign: &CampaignId) -> Result<Vec<CampaignContact>, RepositoryError>;
    fn update_contact(&self, contact: CampaignContact) -> Result<(), RepositoryError>;
    fn contact_by_message_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<CampaignContact>, RepositoryError>;

    fn append_event(&self, event: CampaignEvent) -> Result<(), RepositoryError>;
    fn events(
        &self,
        campaign: &CampaignId,
        customer: &CustomerId,
    ) -> Result<Vec<CampaignEvent>, RepositoryError>;

    fn from_address(&self, id: &FromAddressId) -> Result<Option<FromIdentity>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Recipient snapshot handed back by the customer/tag lookup collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub customer_id: CustomerId,
    pub email: String,
    pub name: String,
}

/// External collaborator resolving a tag-id set to matching customers.
pub trait CustomerDirectory: Send + Sync {
    fn customers_tagged(&self, tags: &[TagId]) -> Result<Vec<CampaignRecipient>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("customer directory unavailable: {0}")]
    Unavailable(String),
}
