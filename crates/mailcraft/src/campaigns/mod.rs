//! Campaign dispatch: recipient snapshots, the campaign and per-contact state
//! machines, provider dispatch with bounded retry, and webhook ingestion.

pub mod dispatch;
pub mod domain;
pub mod domains;
pub mod events;
pub mod orchestrator;
pub mod repository;

pub use dispatch::{
    ContactDispatcher, DispatchOutcome, MailProvider, OutgoingMessage, ProviderReceipt,
    ProviderSendError,
};
pub use domain::{
    Campaign, CampaignContact, CampaignEvent, CampaignId, CampaignStatus, ContactStatus,
    CustomerId, EventType, FromAddressId, InvalidTransition, TagId,
};
pub use domains::{
    DnsRecord, DomainState, DomainVerdict, DomainVerifier, FromAddress, FromIdentity,
    SendingDomain, SendingDomainId, VerificationError,
};
pub use events::{EventIngestor, IngestError, IngestOutcome, WebhookEvent};
pub use orchestrator::{CampaignDraft, CampaignError, CampaignOrchestrator};
pub use repository::{
    CampaignRecipient, CampaignRepository, CustomerDirectory, DirectoryError, RepositoryError,
};
