#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use mailcraft::campaigns::{
    Campaign, CampaignContact, CampaignEvent, CampaignId, CampaignRecipient, CampaignRepository,
    CustomerDirectory, CustomerId, DirectoryError, DomainState, FromAddress, FromAddressId,
    FromIdentity, MailProvider, OutgoingMessage, ProviderReceipt, ProviderSendError,
    RepositoryError, SendingDomain, TagId,
};
use mailcraft::email::{
    Block, BlockContent, CompanyId, EmailTemplate, LayoutDocument, StoreError, TemplateId,
    TemplateStore, VariableLookupError, VariableMap, VariableSource,
};

#[derive(Default)]
pub struct MemoryCampaignRepository {
    campaigns: Mutex<HashMap<CampaignId, Campaign>>,
    contacts: Mutex<Vec<CampaignContact>>,
    events: Mutex<Vec<CampaignEvent>>,
    identities: Mutex<HashMap<FromAddressId, FromIdentity>>,
}

impl MemoryCampaignRepository {
    pub fn register_identity(&self, identity: FromIdentity) {
        let mut guard = self.identities.lock().expect("identity mutex");
        guard.insert(identity.address.id, identity);
    }

    pub fn contact(
        &self,
        campaign: &CampaignId,
        customer: &CustomerId,
    ) -> Option<CampaignContact> {
        let guard = self.contacts.lock().expect("contact mutex");
        guard
            .iter()
            .find(|contact| contact.campaign_id == *campaign && contact.customer_id == *customer)
            .cloned()
    }

    pub fn all_events(&self) -> Vec<CampaignEvent> {
        self.events.lock().expect("event mutex").clone()
    }
}

impl CampaignRepository for MemoryCampaignRepository {
    fn insert_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaign mutex");
        if guard.contains_key(&campaign.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(campaign.id, campaign);
        Ok(())
    }

    fn update_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaign mutex");
        if !guard.contains_key(&campaign.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(campaign.id, campaign);
        Ok(())
    }

    fn delete_campaign(&self, id: &CampaignId) -> Result<(), RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaign mutex");
        guard.remove(id).ok_or(RepositoryError::NotFound)?;
        Ok(())
    }

    fn campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaign mutex");
        Ok(guard.get(id).cloned())
    }

    fn claim_queued(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaign mutex");
        match guard.get_mut(id) {
            Some(campaign) if campaign.due(now) => {
                campaign.status = mailcraft::campaigns::CampaignStatus::Sending;
                campaign.claimed_at = Some(now);
                Ok(Some(campaign.clone()))
            }
            _ => Ok(None),
        }
    }

    fn due_queued(&self, now: DateTime<Utc>) -> Result<Vec<CampaignId>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaign mutex");
        Ok(guard
            .values()
            .filter(|campaign| campaign.due(now))
            .map(|campaign| campaign.id)
            .collect())
    }

    fn sending_campaigns(&self) -> Result<Vec<CampaignId>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaign mutex");
        Ok(guard
            .values()
            .filter(|campaign| {
                campaign.status == mailcraft::campaigns::CampaignStatus::Sending
            })
            .map(|campaign| campaign.id)
            .collect())
    }

    fn insert_contacts(&self, contacts: Vec<CampaignContact>) -> Result<usize, RepositoryError> {
        let mut guard = self.contacts.lock().expect("contact mutex");
        let mut inserted = 0;
        for contact in contacts {
            let exists = guard.iter().any(|existing| {
                existing.campaign_id == contact.campaign_id
                    && existing.customer_id == contact.customer_id
            });
            if !exists {
                guard.push(contact);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn contacts(&self, campaign: &CampaignId) -> Result<Vec<CampaignContact>, RepositoryError> {
        let guard = self.contacts.lock().expect("contact mutex");
        Ok(guard
            .iter()
            .filter(|contact| contact.campaign_id == *campaign)
            .cloned()
            .collect())
    }

    fn update_contact(&self, contact: CampaignContact) -> Result<(), RepositoryError> {
        let mut guard = self.contacts.lock().expect("contact mutex");
        match guard.iter_mut().find(|existing| {
            existing.campaign_id == contact.campaign_id
                && existing.customer_id == contact.customer_id
        }) {
            Some(existing) => {
                *existing = contact;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn contact_by_message_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<CampaignContact>, RepositoryError> {
        let guard = self.contacts.lock().expect("contact mutex");
        Ok(guard
            .iter()
            .find(|contact| {
                contact.provider_message_id.as_deref() == Some(provider_message_id)
            })
            .cloned())
    }

    fn append_event(&self, event: CampaignEvent) -> Result<(), RepositoryError> {
        let mut guard = self.events.lock().expect("event mutex");
        guard.push(event);
        Ok(())
    }

    fn events(
        &self,
        campaign: &CampaignId,
        customer: &CustomerId,
    ) -> Result<Vec<CampaignEvent>, RepositoryError> {
        let guard = self.events.lock().expect("event mutex");
        Ok(guard
            .iter()
            .filter(|event| event.campaign_id == *campaign && event.customer_id == *customer)
            .cloned()
            .collect())
    }

    fn from_address(&self, id: &FromAddressId) -> Result<Option<FromIdentity>, RepositoryError> {
        let guard = self.identities.lock().expect("identity mutex");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<HashMap<TemplateId, EmailTemplate>>,
}

impl TemplateStore for MemoryTemplateStore {
    fn insert(&self, template: EmailTemplate) -> Result<(), StoreError> {
        let mut guard = self.templates.lock().expect("template mutex");
        if guard.contains_key(&template.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(template.id, template);
        Ok(())
    }

    fn update(&self, template: EmailTemplate) -> Result<(), StoreError> {
        let mut guard = self.templates.lock().expect("template mutex");
        if !guard.contains_key(&template.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(template.id, template);
        Ok(())
    }

    fn fetch(&self, id: &TemplateId) -> Result<Option<EmailTemplate>, StoreError> {
        let guard = self.templates.lock().expect("template mutex");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_name(
        &self,
        company: &CompanyId,
        name: &str,
    ) -> Result<Option<EmailTemplate>, StoreError> {
        let guard = self.templates.lock().expect("template mutex");
        Ok(guard
            .values()
            .find(|template| template.company_id == *company && template.name == name)
            .cloned())
    }
}

/// Variable source whose snapshot tests can swap between saves.
#[derive(Default)]
pub struct StaticVariables {
    map: Mutex<VariableMap>,
}

impl StaticVariables {
    pub fn new(map: VariableMap) -> Self {
        Self {
            map: Mutex::new(map),
        }
    }

    pub fn replace(&self, map: VariableMap) {
        *self.map.lock().expect("variable mutex") = map;
    }
}

impl VariableSource for StaticVariables {
    fn variables_for(&self, _company: &CompanyId) -> Result<VariableMap, VariableLookupError> {
        Ok(self.map.lock().expect("variable mutex").clone())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    tagged: Mutex<HashMap<TagId, Vec<CampaignRecipient>>>,
}

impl MemoryDirectory {
    pub fn tag(&self, tag: TagId, recipients: Vec<CampaignRecipient>) {
        let mut guard = self.tagged.lock().expect("directory mutex");
        guard.insert(tag, recipients);
    }
}

impl CustomerDirectory for MemoryDirectory {
    fn customers_tagged(&self, tags: &[TagId]) -> Result<Vec<CampaignRecipient>, DirectoryError> {
        let guard = self.tagged.lock().expect("directory mutex");
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for tag in tags {
            for recipient in guard.get(tag).into_iter().flatten() {
                if seen.insert(recipient.customer_id.clone()) {
                    recipients.push(recipient.clone());
                }
            }
        }
        Ok(recipients)
    }
}

/// Provider fake: successful sends record the message and hand back a
/// sequential message id; individual recipients can be scripted to fail.
#[derive(Default)]
pub struct FakeProvider {
    sent: Mutex<Vec<OutgoingMessage>>,
    sequence: AtomicU64,
    always_transient: Mutex<HashSet<String>>,
    auth_down: AtomicBool,
}

impl FakeProvider {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().expect("sent mutex").clone()
    }

    pub fn fail_transiently(&self, email: &str) {
        let mut guard = self.always_transient.lock().expect("failure mutex");
        guard.insert(email.to_string());
    }

    pub fn break_auth(&self) {
        self.auth_down.store(true, Ordering::SeqCst);
    }
}

impl MailProvider for FakeProvider {
    fn send(&self, message: &OutgoingMessage) -> Result<ProviderReceipt, ProviderSendError> {
        if self.auth_down.load(Ordering::SeqCst) {
            return Err(ProviderSendError::Auth("invalid api key".to_string()));
        }

        let failing = self.always_transient.lock().expect("failure mutex");
        if failing.contains(&message.to) {
            return Err(ProviderSendError::Transient("connection reset".to_string()));
        }
        drop(failing);

        let mut guard = self.sent.lock().expect("sent mutex");
        guard.push(message.clone());
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ProviderReceipt {
            provider_message_id: format!("msg-{id:04}"),
        })
    }
}

pub fn company() -> CompanyId {
    CompanyId("co-ankeny".to_string())
}

pub fn sendable_identity() -> FromIdentity {
    let mut domain = SendingDomain::create(company(), "hilltopauto.example".to_string());
    domain.state = DomainState::Active;
    FromIdentity {
        address: FromAddress {
            id: FromAddressId::generate(),
            sending_domain_id: domain.id,
            local_part: "service".to_string(),
            verified: true,
        },
        domain,
    }
}

pub fn recipient(customer: &str, email: &str) -> CampaignRecipient {
    CampaignRecipient {
        customer_id: CustomerId(customer.to_string()),
        email: email.to_string(),
        name: customer.to_string(),
    }
}

/// Scenario layout: a header greeting followed by a plain text block.
pub fn greeting_layout() -> LayoutDocument {
    LayoutDocument::new(vec![
        Block::new(
            1,
            BlockContent::Header(mailcraft::email::blocks::HeaderContent {
                heading: "Hi {{COMPANY_NAME}}".to_string(),
                subheading: None,
            }),
        ),
        Block::new(
            2,
            BlockContent::Text(mailcraft::email::blocks::TextContent {
                text: "Hello".to_string(),
            }),
        ),
    ])
}
