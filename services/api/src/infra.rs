use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use mailcraft::campaigns::{
    Campaign, CampaignContact, CampaignEvent, CampaignId, CampaignRecipient, CampaignRepository,
    CampaignStatus, CustomerDirectory, CustomerId, DirectoryError, DomainState, FromAddress,
    FromAddressId, FromIdentity, MailProvider, OutgoingMessage, ProviderReceipt,
    ProviderSendError, RepositoryError, SendingDomain, TagId,
};
use mailcraft::email::{
    CompanyId, CompanyVariable, EmailTemplate, StoreError, TemplateId, TemplateStore,
    VariableKind, VariableLookupError, VariableMap, VariableSource,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
pub(crate) struct InMemoryTemplateStore {
    templates: Mutex<HashMap<TemplateId, EmailTemplate>>,
}

impl TemplateStore for InMemoryTemplateStore {
    fn insert(&self, template: EmailTemplate) -> Result<(), StoreError> {
        let mut guard = self.templates.lock().expect("template mutex poisoned");
        if guard.contains_key(&template.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(template.id, template);
        Ok(())
    }

    fn update(&self, template: EmailTemplate) -> Result<(), StoreError> {
        let mut guard = self.templates.lock().expect("template mutex poisoned");
        if !guard.contains_key(&template.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(template.id, template);
        Ok(())
    }

    fn fetch(&self, id: &TemplateId) -> Result<Option<EmailTemplate>, StoreError> {
        let guard = self.templates.lock().expect("template mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_name(
        &self,
        company: &CompanyId,
        name: &str,
    ) -> Result<Option<EmailTemplate>, StoreError> {
        let guard = self.templates.lock().expect("template mutex poisoned");
        Ok(guard
            .values()
            .find(|template| template.company_id == *company && template.name == name)
            .cloned())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryCampaignRepository {
    campaigns: Mutex<HashMap<CampaignId, Campaign>>,
    contacts: Mutex<HashMap<(CampaignId, CustomerId), CampaignContact>>,
    events: Mutex<Vec<CampaignEvent>>,
    identities: Mutex<HashMap<FromAddressId, FromIdentity>>,
}

impl InMemoryCampaignRepository {
    pub(crate) fn register_identity(&self, identity: FromIdentity) {
        let mut guard = self.identities.lock().expect("identity mutex poisoned");
        guard.insert(identity.address.id, identity);
    }
}

impl CampaignRepository for InMemoryCampaignRepository {
    fn insert_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaign mutex poisoned");
        if guard.contains_key(&campaign.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(campaign.id, campaign);
        Ok(())
    }

    fn update_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaign mutex poisoned");
        if !guard.contains_key(&campaign.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(campaign.id, campaign);
        Ok(())
    }

    fn delete_campaign(&self, id: &CampaignId) -> Result<(), RepositoryError> {
        let mut guard = self.campaigns.lock().expect("campaign mutex poisoned");
        guard.remove(id).ok_or(RepositoryError::NotFound)?;
        Ok(())
    }

    fn campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaign mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn claim_queued(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, RepositoryError> {
        // The lock plays the role the conditional UPDATE plays in SQL: the
        // check and the status flip are one atomic step.
        let mut guard = self.campaigns.lock().expect("campaign mutex poisoned");
        match guard.get_mut(id) {
            Some(campaign) if campaign.due(now) => {
                campaign.status = CampaignStatus::Sending;
                campaign.claimed_at = Some(now);
                Ok(Some(campaign.clone()))
            }
            _ => Ok(None),
        }
    }

    fn due_queued(&self, now: DateTime<Utc>) -> Result<Vec<CampaignId>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaign mutex poisoned");
        Ok(guard
            .values()
            .filter(|campaign| campaign.due(now))
            .map(|campaign| campaign.id)
            .collect())
    }

    fn sending_campaigns(&self) -> Result<Vec<CampaignId>, RepositoryError> {
        let guard = self.campaigns.lock().expect("campaign mutex poisoned");
        Ok(guard
            .values()
            .filter(|campaign| campaign.status == CampaignStatus::Sending)
            .map(|campaign| campaign.id)
            .collect())
    }

    fn insert_contacts(&self, contacts: Vec<CampaignContact>) -> Result<usize, RepositoryError> {
        let mut guard = self.contacts.lock().expect("contact mutex poisoned");
        let mut inserted = 0;
        for contact in contacts {
            let key = (contact.campaign_id, contact.customer_id.clone());
            if !guard.contains_key(&key) {
                guard.insert(key, contact);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn contacts(&self, campaign: &CampaignId) -> Result<Vec<CampaignContact>, RepositoryError> {
        let guard = self.contacts.lock().expect("contact mutex poisoned");
        let mut matching: Vec<CampaignContact> = guard
            .values()
            .filter(|contact| contact.campaign_id == *campaign)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.customer_id.0.cmp(&b.customer_id.0));
        Ok(matching)
    }

    fn update_contact(&self, contact: CampaignContact) -> Result<(), RepositoryError> {
        let mut guard = self.contacts.lock().expect("contact mutex poisoned");
        let key = (contact.campaign_id, contact.customer_id.clone());
        if !guard.contains_key(&key) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(key, contact);
        Ok(())
    }

    fn contact_by_message_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<CampaignContact>, RepositoryError> {
        let guard = self.contacts.lock().expect("contact mutex poisoned");
        Ok(guard
            .values()
            .find(|contact| contact.provider_message_id.as_deref() == Some(provider_message_id))
            .cloned())
    }

    fn append_event(&self, event: CampaignEvent) -> Result<(), RepositoryError> {
        let mut guard = self.events.lock().expect("event mutex poisoned");
        guard.push(event);
        Ok(())
    }

    fn events(
        &self,
        campaign: &CampaignId,
        customer: &CustomerId,
    ) -> Result<Vec<CampaignEvent>, RepositoryError> {
        let guard = self.events.lock().expect("event mutex poisoned");
        Ok(guard
            .iter()
            .filter(|event| event.campaign_id == *campaign && event.customer_id == *customer)
            .cloned()
            .collect())
    }

    fn from_address(&self, id: &FromAddressId) -> Result<Option<FromIdentity>, RepositoryError> {
        let guard = self.identities.lock().expect("identity mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryDirectory {
    tagged: Mutex<HashMap<TagId, Vec<CampaignRecipient>>>,
}

impl InMemoryDirectory {
    pub(crate) fn tag(&self, tag: TagId, recipients: Vec<CampaignRecipient>) {
        let mut guard = self.tagged.lock().expect("directory mutex poisoned");
        guard.insert(tag, recipients);
    }
}

impl CustomerDirectory for InMemoryDirectory {
    fn customers_tagged(&self, tags: &[TagId]) -> Result<Vec<CampaignRecipient>, DirectoryError> {
        let guard = self.tagged.lock().expect("directory mutex poisoned");
        let mut recipients: Vec<CampaignRecipient> = Vec::new();
        for tag in tags {
            for recipient in guard.get(tag).into_iter().flatten() {
                if !recipients
                    .iter()
                    .any(|existing| existing.customer_id == recipient.customer_id)
                {
                    recipients.push(recipient.clone());
                }
            }
        }
        Ok(recipients)
    }
}

#[derive(Default)]
pub(crate) struct InMemoryVariableSource {
    variables: Mutex<HashMap<CompanyId, VariableMap>>,
}

impl InMemoryVariableSource {
    pub(crate) fn set(&self, company: CompanyId, variables: Vec<CompanyVariable>) {
        let mut guard = self.variables.lock().expect("variable mutex poisoned");
        guard.insert(company, VariableMap::from_variables(variables));
    }
}

impl VariableSource for InMemoryVariableSource {
    fn variables_for(&self, company: &CompanyId) -> Result<VariableMap, VariableLookupError> {
        let guard = self.variables.lock().expect("variable mutex poisoned");
        Ok(guard.get(company).cloned().unwrap_or_default())
    }
}

/// Stand-in delivery provider: accepts every message and logs it instead of
/// sending, so the whole pipeline can be exercised without credentials.
#[derive(Default)]
pub(crate) struct SandboxMailProvider {
    sequence: AtomicU64,
}

impl MailProvider for SandboxMailProvider {
    fn send(&self, message: &OutgoingMessage) -> Result<ProviderReceipt, ProviderSendError> {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let provider_message_id = format!("sandbox-{id:06}");
        info!(
            to = %message.to,
            subject = %message.subject,
            %provider_message_id,
            "sandbox provider accepted message"
        );
        Ok(ProviderReceipt {
            provider_message_id,
        })
    }
}

pub(crate) fn demo_company() -> CompanyId {
    CompanyId("co-demo".to_string())
}

/// Seed the in-memory world with one tenant so the API is usable immediately:
/// brand variables, a verified sending identity, and a tagged customer list.
pub(crate) fn seed_demo_tenant(
    repository: &InMemoryCampaignRepository,
    directory: &InMemoryDirectory,
    variables: &InMemoryVariableSource,
) -> FromAddressId {
    let company = demo_company();

    variables.set(
        company.clone(),
        vec![
            CompanyVariable {
                company_id: company.clone(),
                key: "COMPANY_NAME".to_string(),
                value: "Demo Garage".to_string(),
                kind: VariableKind::Text,
                can_be_deleted: false,
            },
            CompanyVariable {
                company_id: company.clone(),
                key: "PRIMARY_COLOR".to_string(),
                value: "#1f6f43".to_string(),
                kind: VariableKind::Color,
                can_be_deleted: false,
            },
            CompanyVariable {
                company_id: company.clone(),
                key: "BOOKING_URL".to_string(),
                value: "https://demo-garage.example/book".to_string(),
                kind: VariableKind::Url,
                can_be_deleted: true,
            },
        ],
    );

    directory.tag(
        TagId("all-customers".to_string()),
        vec![
            CampaignRecipient {
                customer_id: CustomerId("cust-1".to_string()),
                email: "amy@example.com".to_string(),
                name: "Amy".to_string(),
            },
            CampaignRecipient {
                customer_id: CustomerId("cust-2".to_string()),
                email: "ben@example.com".to_string(),
                name: "Ben".to_string(),
            },
            CampaignRecipient {
                customer_id: CustomerId("cust-3".to_string()),
                email: "cara@example.com".to_string(),
                name: "Cara".to_string(),
            },
        ],
    );

    let mut domain = SendingDomain::create(company, "demo-garage.example".to_string());
    domain.state = DomainState::Active;
    let identity = FromIdentity {
        address: FromAddress {
            id: FromAddressId::generate(),
            sending_domain_id: domain.id,
            local_part: "service".to_string(),
            verified: true,
        },
        domain,
    };
    let from_address_id = identity.address.id;
    repository.register_identity(identity);

    from_address_id
}
