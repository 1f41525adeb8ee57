//! Email composition: block schema, token substitution, render pipeline,
//! template persistence, and revision history.

pub mod blocks;
pub mod render;
pub mod revisions;
pub mod template;
pub mod tokens;
pub mod variables;

pub use blocks::{
    validate_layout, Block, BlockContent, BlockKind, BlockValidationError, FieldErrors,
    LayoutDocument, LayoutErrors,
};
pub use render::{render, RenderedEmail};
pub use revisions::{RevisionId, RevisionStore, TemplateRevision};
pub use template::{
    CompiledEmail, EmailTemplate, StoreError, TemplateDraft, TemplateId, TemplateService,
    TemplateServiceError, TemplateStore, TemplateUpdate, UserId,
};
pub use tokens::{substitute, PROVIDER_RESERVED_PREFIX};
pub use variables::{
    CompanyId, CompanyVariable, VariableKind, VariableLookupError, VariableMap, VariableSource,
};
