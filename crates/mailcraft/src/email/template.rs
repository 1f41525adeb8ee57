use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::email::blocks::{validate_layout, LayoutDocument, LayoutErrors};
use crate::email::render::render;
use crate::email::revisions::{RevisionId, RevisionStore, TemplateRevision};
use crate::email::tokens::substitute;
use crate::email::variables::{CompanyId, VariableLookupError, VariableSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub Uuid);

impl TemplateId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Identifier of the back-office user who authored a save.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Persisted template row. `subject` and `preview_text` keep their raw token
/// form for editing; the `compiled` cache, when present, always equals the
/// token-resolved compile of this row as of the last save, and every layout
/// write recomputes it before the write completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: TemplateId,
    pub company_id: CompanyId,
    pub name: String,
    pub subject: String,
    pub preview_text: String,
    pub layout: LayoutDocument,
    pub compiled: Option<CompiledEmail>,
    pub created_by: UserId,
}

/// Render-time artifact of one save: the compiled HTML and plain-text body
/// plus the subject and preview text with `{{TOKEN}}`s resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledEmail {
    pub subject: String,
    pub preview_text: String,
    pub html: String,
    pub text: String,
}

/// Input for creating a template.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDraft {
    pub company_id: CompanyId,
    pub name: String,
    pub subject: String,
    pub preview_text: String,
    pub layout: LayoutDocument,
    pub created_by: UserId,
}

/// Editable fields for a template save.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateUpdate {
    pub name: String,
    pub subject: String,
    pub preview_text: String,
    pub layout: LayoutDocument,
    pub edited_by: UserId,
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait TemplateStore: Send + Sync {
    fn insert(&self, template: EmailTemplate) -> Result<(), StoreError>;
    fn update(&self, template: EmailTemplate) -> Result<(), StoreError>;
    fn fetch(&self, id: &TemplateId) -> Result<Option<EmailTemplate>, StoreError>;
    fn fetch_by_name(
        &self,
        company: &CompanyId,
        name: &str,
    ) -> Result<Option<EmailTemplate>, StoreError>;
}

/// Error enumeration for template storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("template name already in use")]
    Conflict,
    #[error("template not found")]
    NotFound,
    #[error("template store unavailable: {0}")]
    Unavailable(String),
}

/// Error raised by the template service.
#[derive(Debug, thiserror::Error)]
pub enum TemplateServiceError {
    #[error("layout validation failed: {0}")]
    Validation(#[from] LayoutErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("revision does not belong to this template")]
    RevisionNotFound,
    #[error(transparent)]
    Variables(#[from] VariableLookupError),
}

/// Service composing validation, the render pipeline, the template store, and
/// the append-only revision log.
pub struct TemplateService<S> {
    store: Arc<S>,
    revisions: Arc<RevisionStore>,
    variables: Arc<dyn VariableSource>,
}

impl<S> TemplateService<S>
where
    S: TemplateStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        revisions: Arc<RevisionStore>,
        variables: Arc<dyn VariableSource>,
    ) -> Self {
        Self {
            store,
            revisions,
            variables,
        }
    }

    pub fn revisions(&self) -> &RevisionStore {
        &self.revisions
    }

    /// Create a template: validate, compile, persist, and record the first
    /// revision. Validation failures block the save with no partial write.
    pub fn create(
        &self,
        draft: TemplateDraft,
        now: DateTime<Utc>,
    ) -> Result<EmailTemplate, TemplateServiceError> {
        validate_layout(&draft.layout)?;

        if self
            .store
            .fetch_by_name(&draft.company_id, &draft.name)?
            .is_some()
        {
            return Err(StoreError::Conflict.into());
        }

        let compiled = self.compile(
            &draft.company_id,
            &draft.subject,
            &draft.preview_text,
            &draft.layout,
        )?;
        let template = EmailTemplate {
            id: TemplateId::generate(),
            company_id: draft.company_id,
            name: draft.name,
            subject: draft.subject,
            preview_text: draft.preview_text,
            layout: draft.layout,
            compiled: Some(compiled.clone()),
            created_by: draft.created_by.clone(),
        };

        self.store.insert(template.clone())?;
        self.revisions.append(
            template.id,
            template.layout.clone(),
            &compiled,
            draft.created_by,
            now,
        );

        info!(template = %template.id.0, name = %template.name, "template created");
        Ok(template)
    }

    /// Save a template edit. The compiled cache is recomputed against current
    /// variables before the write is considered complete, and every
    /// successful save appends one revision.
    pub fn save(
        &self,
        id: &TemplateId,
        update: TemplateUpdate,
        now: DateTime<Utc>,
    ) -> Result<EmailTemplate, TemplateServiceError> {
        validate_layout(&update.layout)?;

        let mut template = self.store.fetch(id)?.ok_or(StoreError::NotFound)?;

        if update.name != template.name {
            if let Some(existing) = self.store.fetch_by_name(&template.company_id, &update.name)? {
                if existing.id != template.id {
                    return Err(StoreError::Conflict.into());
                }
            }
        }

        let compiled = self.compile(
            &template.company_id,
            &update.subject,
            &update.preview_text,
            &update.layout,
        )?;
        template.name = update.name;
        template.subject = update.subject;
        template.preview_text = update.preview_text;
        template.layout = update.layout;
        template.compiled = Some(compiled.clone());

        self.store.update(template.clone())?;
        self.revisions.append(
            template.id,
            template.layout.clone(),
            &compiled,
            update.edited_by,
            now,
        );

        Ok(template)
    }

    pub fn get(&self, id: &TemplateId) -> Result<EmailTemplate, TemplateServiceError> {
        Ok(self.store.fetch(id)?.ok_or(StoreError::NotFound)?)
    }

    pub fn history(&self, id: &TemplateId) -> Result<Vec<TemplateRevision>, TemplateServiceError> {
        self.get(id)?;
        Ok(self.revisions.list(id))
    }

    /// Copy a past snapshot forward as the new live state. The snapshot's
    /// layout is re-rendered against *current* variables, and the restore is
    /// a normal save, so it appends a new revision of its own.
    pub fn restore(
        &self,
        id: &TemplateId,
        revision_id: RevisionId,
        restored_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<EmailTemplate, TemplateServiceError> {
        let mut template = self.store.fetch(id)?.ok_or(StoreError::NotFound)?;
        let revision = self
            .revisions
            .fetch(id, revision_id)
            .ok_or(TemplateServiceError::RevisionNotFound)?;

        // Restore brings back the layout only; subject and preview text keep
        // their current values and recompile alongside it.
        let compiled = self.compile(
            &template.company_id,
            &template.subject,
            &template.preview_text,
            &revision.layout,
        )?;
        template.layout = revision.layout;
        template.compiled = Some(compiled.clone());

        self.store.update(template.clone())?;
        self.revisions.append(
            template.id,
            template.layout.clone(),
            &compiled,
            restored_by,
            now,
        );

        info!(template = %template.id.0, revision = revision_id.0, "template restored");
        Ok(template)
    }

    fn compile(
        &self,
        company: &CompanyId,
        subject: &str,
        preview_text: &str,
        layout: &LayoutDocument,
    ) -> Result<CompiledEmail, TemplateServiceError> {
        let variables = self.variables.variables_for(company)?;
        let rendered = render(layout, &variables);
        Ok(CompiledEmail {
            subject: substitute(subject, &variables),
            preview_text: substitute(preview_text, &variables),
            html: rendered.html,
            text: rendered.text,
        })
    }
}
