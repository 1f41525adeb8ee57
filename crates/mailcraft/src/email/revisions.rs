use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::email::blocks::LayoutDocument;
use crate::email::template::{CompiledEmail, TemplateId, UserId};

/// 1-based position of a revision within its template's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub struct RevisionId(pub u32);

/// Immutable snapshot of a template's layout and compiled output at save time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateRevision {
    pub revision_id: RevisionId,
    pub template_id: TemplateId,
    pub layout: LayoutDocument,
    pub html: String,
    pub text: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Append-only log of template snapshots, indexed by template id and creation
/// order. The store exposes no mutation or deletion; "never mutated" is
/// enforced structurally rather than by convention.
#[derive(Debug, Default)]
pub struct RevisionStore {
    log: Mutex<HashMap<TemplateId, Vec<TemplateRevision>>>,
}

impl RevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one snapshot; called once per successful template save.
    pub fn append(
        &self,
        template_id: TemplateId,
        layout: LayoutDocument,
        compiled: &CompiledEmail,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> TemplateRevision {
        let mut log = self.log.lock().expect("revision log mutex poisoned");
        let history = log.entry(template_id).or_default();

        let revision = TemplateRevision {
            revision_id: RevisionId(history.len() as u32 + 1),
            template_id,
            layout,
            html: compiled.html.clone(),
            text: compiled.text.clone(),
            created_by,
            created_at,
        };
        history.push(revision.clone());
        revision
    }

    /// Full history for a template, oldest first.
    pub fn list(&self, template_id: &TemplateId) -> Vec<TemplateRevision> {
        let log = self.log.lock().expect("revision log mutex poisoned");
        log.get(template_id).cloned().unwrap_or_default()
    }

    /// Lookup one revision; `None` when the id does not belong to the template.
    pub fn fetch(
        &self,
        template_id: &TemplateId,
        revision_id: RevisionId,
    ) -> Option<TemplateRevision> {
        let log = self.log.lock().expect("revision log mutex poisoned");
        log.get(template_id)?
            .iter()
            .find(|revision| revision.revision_id == revision_id)
            .cloned()
    }

    pub fn latest(&self, template_id: &TemplateId) -> Option<TemplateRevision> {
        let log = self.log.lock().expect("revision log mutex poisoned");
        log.get(template_id)?.last().cloned()
    }
}
