use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::campaigns::dispatch::{
    ContactDispatcher, DispatchOutcome, MailProvider, OutgoingMessage,
};
use crate::campaigns::domain::{
    Campaign, CampaignContact, CampaignId, CampaignStatus, ContactStatus, FromAddressId, TagId,
};
use crate::campaigns::domains::FromIdentity;
use crate::campaigns::repository::{
    CampaignRepository, CustomerDirectory, DirectoryError, RepositoryError,
};
use crate::config::DispatchConfig;
use crate::email::render::{render, RenderedEmail};
use crate::email::template::{StoreError, TemplateId, TemplateStore};
use crate::email::tokens::substitute;
use crate::email::variables::{CompanyId, VariableLookupError, VariableSource};

/// Input for creating a campaign; everything else starts at its Draft default.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CampaignDraft {
    pub company_id: CompanyId,
    pub subject: String,
    pub preheader_text: String,
    pub from_address_id: FromAddressId,
    pub email_template_id: TemplateId,
    pub reply_to: Option<String>,
    pub contact_tag_ids: Vec<TagId>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Error raised by the campaign orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("campaign is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("recipient filter requires at least one tag")]
    EmptyTagSet,
    #[error("recipient filter matched no customers")]
    NoRecipients,
    #[error("from address is not verified for sending")]
    UnverifiedFromAddress,
    #[error("scheduled_at must not be in the past")]
    ScheduledInPast,
    #[error("email template not found")]
    MissingTemplate,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Variables(#[from] VariableLookupError),
    #[error(transparent)]
    TemplateStore(#[from] StoreError),
}

/// Drives the campaign state machine: expands the recipient filter into
/// dispatch rows, claims queued campaigns for a single worker, renders,
/// dispatches, and observes per-recipient terminal states into completion.
pub struct CampaignOrchestrator<R, D, T> {
    repository: Arc<R>,
    directory: Arc<D>,
    templates: Arc<T>,
    variables: Arc<dyn VariableSource>,
    dispatcher: ContactDispatcher,
    config: DispatchConfig,
}

impl<R, D, T> CampaignOrchestrator<R, D, T>
where
    R: CampaignRepository + 'static,
    D: CustomerDirectory + 'static,
    T: TemplateStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<D>,
        templates: Arc<T>,
        variables: Arc<dyn VariableSource>,
        provider: Arc<dyn MailProvider>,
        config: DispatchConfig,
    ) -> Self {
        let dispatcher = ContactDispatcher::new(provider, &config);
        Self {
            repository,
            directory,
            templates,
            variables,
            dispatcher,
            config,
        }
    }

    /// Create a Draft campaign. The tag filter is fixed here and never
    /// re-evaluated after queue time.
    pub fn create(
        &self,
        draft: CampaignDraft,
        now: DateTime<Utc>,
    ) -> Result<Campaign, CampaignError> {
        if draft.contact_tag_ids.is_empty() {
            return Err(CampaignError::EmptyTagSet);
        }
        if let Some(scheduled_at) = draft.scheduled_at {
            if scheduled_at < now {
                return Err(CampaignError::ScheduledInPast);
            }
        }

        let campaign = Campaign {
            id: CampaignId::generate(),
            company_id: draft.company_id,
            subject: draft.subject,
            preheader_text: draft.preheader_text,
            from_address_id: draft.from_address_id,
            email_template_id: draft.email_template_id,
            reply_to: draft.reply_to,
            contact_tag_ids: draft.contact_tag_ids,
            status: CampaignStatus::Draft,
            scheduled_at: draft.scheduled_at,
            claimed_at: None,
            sent_at: None,
            error_message: None,
        };

        self.repository.insert_campaign(campaign.clone())?;
        info!(campaign = %campaign.id.0, "campaign created");
        Ok(campaign)
    }

    /// Explicit send action: Draft -> Queued (or Failed -> Queued for a whole
    /// campaign retry). Snapshots matching customers into Pending contact
    /// rows; the `(campaign, customer)` unique key makes re-queueing
    /// idempotent. Any unmet precondition leaves the campaign untouched.
    pub fn queue(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Campaign, CampaignError> {
        let mut campaign = self
            .repository
            .campaign(id)?
            .ok_or(RepositoryError::NotFound)?;

        if !campaign.status.can_transition(CampaignStatus::Queued) {
            // Both Draft -> Queued and the Failed -> Queued retry are legal.
            return Err(CampaignError::InvalidState {
                expected: "draft or failed",
                actual: campaign.status.label(),
            });
        }

        if self
            .templates
            .fetch(&campaign.email_template_id)?
            .is_none()
        {
            return Err(CampaignError::MissingTemplate);
        }

        let identity = self
            .repository
            .from_address(&campaign.from_address_id)?
            .ok_or(CampaignError::UnverifiedFromAddress)?;
        if !identity.sendable() {
            return Err(CampaignError::UnverifiedFromAddress);
        }

        let recipients = self
            .directory
            .customers_tagged(&campaign.contact_tag_ids)?;
        if recipients.is_empty() {
            return Err(CampaignError::NoRecipients);
        }

        let contacts: Vec<CampaignContact> = recipients
            .into_iter()
            .map(|recipient| {
                CampaignContact::pending(*id, recipient.customer_id, recipient.email, now)
            })
            .collect();
        let inserted = self.repository.insert_contacts(contacts)?;

        campaign.status = CampaignStatus::Queued;
        campaign.claimed_at = None;
        campaign.error_message = None;
        self.repository.update_campaign(campaign.clone())?;

        info!(
            campaign = %campaign.id.0,
            recipients = inserted,
            "campaign queued"
        );
        Ok(campaign)
    }

    /// Claim and drive one campaign. Returns `Ok(None)` when the claim is not
    /// won: another worker got there first, the schedule has not passed, or
    /// the campaign is not Queued.
    pub fn run(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, CampaignError> {
        let Some(campaign) = self.repository.claim_queued(id, now)? else {
            return Ok(None);
        };

        let template = match self.templates.fetch(&campaign.email_template_id)? {
            Some(template) => template,
            None => {
                return self
                    .fail_campaign(campaign, "email template was deleted".to_string())
                    .map(Some);
            }
        };

        let identity = match self.repository.from_address(&campaign.from_address_id)? {
            Some(identity) if identity.sendable() => identity,
            _ => {
                return self
                    .fail_campaign(campaign, "from address is no longer sendable".to_string())
                    .map(Some);
            }
        };

        // One snapshot of company variables per run; rendering is pure, so
        // every recipient of this run sees identical compiled output.
        let variables = self.variables.variables_for(&campaign.company_id)?;
        let rendered = render(&template.layout, &variables);
        let subject = substitute(&campaign.subject, &variables);
        let preheader = substitute(&campaign.preheader_text, &variables);

        for contact in self.repository.contacts(id)? {
            if contact.status != ContactStatus::Pending {
                continue;
            }

            let message = self.compose(&campaign, &identity, &contact, &rendered, &subject, &preheader);
            match self.dispatcher.dispatch(&message) {
                DispatchOutcome::Delivered { provider_message_id } => {
                    let mut updated = contact;
                    if updated.mark_sent(provider_message_id, now).is_ok() {
                        self.repository.update_contact(updated)?;
                    }
                }
                DispatchOutcome::Exhausted { error: reason } => {
                    warn!(
                        campaign = %campaign.id.0,
                        customer = %contact.customer_id.0,
                        %reason,
                        "recipient dispatch failed permanently"
                    );
                    let mut updated = contact;
                    if updated.mark_failed(reason).is_ok() {
                        self.repository.update_contact(updated)?;
                    }
                }
                DispatchOutcome::Aborted { error: reason } => {
                    // Campaign-wide failure: unattempted contacts stay Pending
                    // so a future re-queue can pick them up.
                    return self.fail_campaign(campaign, reason).map(Some);
                }
            }
        }

        self.finalize(campaign, now).map(Some)
    }

    /// Worker sweep: claim and run every due campaign, then time out stale
    /// contacts of campaigns a crashed worker left Sending.
    pub fn poll(&self, now: DateTime<Utc>) -> Result<Vec<CampaignId>, CampaignError> {
        let mut driven = Vec::new();

        for id in self.repository.due_queued(now)? {
            if self.run(&id, now)?.is_some() {
                driven.push(id);
            }
        }

        for id in self.repository.sending_campaigns()? {
            self.reconcile(&id, now)?;
        }

        Ok(driven)
    }

    /// Reconciliation sweep for the crashed-worker case: Pending contacts of
    /// a Sending campaign older than the stale timeout are failed so the
    /// campaign cannot hang in Sending forever, then completion is
    /// re-evaluated.
    pub fn reconcile(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, CampaignError> {
        let Some(campaign) = self.repository.campaign(id)? else {
            return Ok(None);
        };
        if campaign.status != CampaignStatus::Sending {
            return Ok(None);
        }

        // Staleness is anchored to the claim, not queue time: a scheduled
        // campaign may have been Queued for hours before any worker touched
        // it, and its Pending contacts are not stale until dispatch has
        // actually had the timeout's worth of time since the claim.
        let Some(claimed_at) = campaign.claimed_at else {
            return Ok(Some(campaign));
        };
        let stale_at = claimed_at
            + chrono::Duration::from_std(self.config.stale_pending_after)
                .unwrap_or_else(|_| chrono::Duration::seconds(900));

        for contact in self.repository.contacts(id)? {
            if contact.status != ContactStatus::Pending {
                continue;
            }
            if stale_at <= now {
                warn!(
                    campaign = %campaign.id.0,
                    customer = %contact.customer_id.0,
                    "timing out stale pending contact"
                );
                let mut updated = contact;
                if updated
                    .mark_failed("dispatch timed out".to_string())
                    .is_ok()
                {
                    self.repository.update_contact(updated)?;
                }
            }
        }

        self.finalize(campaign, now).map(Some)
    }

    /// Discard a campaign outright; only Draft campaigns qualify. There is no
    /// cancellation of an in-flight campaign.
    pub fn discard(&self, id: &CampaignId) -> Result<(), CampaignError> {
        let campaign = self
            .repository
            .campaign(id)?
            .ok_or(RepositoryError::NotFound)?;

        if campaign.status != CampaignStatus::Draft {
            return Err(CampaignError::InvalidState {
                expected: CampaignStatus::Draft.label(),
                actual: campaign.status.label(),
            });
        }

        self.repository.delete_campaign(id)?;
        Ok(())
    }

    pub fn get(&self, id: &CampaignId) -> Result<Campaign, CampaignError> {
        Ok(self
            .repository
            .campaign(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    fn compose(
        &self,
        campaign: &Campaign,
        identity: &FromIdentity,
        contact: &CampaignContact,
        rendered: &RenderedEmail,
        subject: &str,
        preheader: &str,
    ) -> OutgoingMessage {
        OutgoingMessage {
            idempotency_key: ContactDispatcher::idempotency_key(
                &campaign.id,
                &contact.customer_id,
            ),
            from: identity.email(),
            reply_to: campaign.reply_to.clone(),
            to: contact.email.clone(),
            subject: subject.to_string(),
            preheader: preheader.to_string(),
            html: rendered.html.clone(),
            text: rendered.text.clone(),
        }
    }

    /// Partial-success completion: once every contact is settled (Sent,
    /// Opened, Clicked, Bounced, or Failed) the campaign is Sent, regardless
    /// of how many individual recipients failed.
    fn finalize(
        &self,
        mut campaign: Campaign,
        now: DateTime<Utc>,
    ) -> Result<Campaign, CampaignError> {
        let contacts = self.repository.contacts(&campaign.id)?;
        let pending = contacts
            .iter()
            .filter(|contact| !contact.status.is_settled())
            .count();

        if pending > 0 {
            return Ok(campaign);
        }

        if campaign.status.can_transition(CampaignStatus::Sent) {
            let delivered = contacts
                .iter()
                .filter(|contact| contact.status != ContactStatus::Failed)
                .count();
            campaign.status = CampaignStatus::Sent;
            campaign.sent_at = Some(now);
            self.repository.update_campaign(campaign.clone())?;
            info!(
                campaign = %campaign.id.0,
                delivered,
                failed = contacts.len() - delivered,
                "campaign completed"
            );
        }

        Ok(campaign)
    }

    fn fail_campaign(
        &self,
        mut campaign: Campaign,
        reason: String,
    ) -> Result<Campaign, CampaignError> {
        error!(campaign = %campaign.id.0, %reason, "campaign failed");
        if campaign.status.can_transition(CampaignStatus::Failed) {
            campaign.status = CampaignStatus::Failed;
            campaign.error_message = Some(reason);
            self.repository.update_campaign(campaign.clone())?;
        }
        Ok(campaign)
    }
}
