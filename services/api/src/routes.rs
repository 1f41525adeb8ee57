use std::sync::Arc;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::infra::{AppState, InMemoryCampaignRepository, InMemoryDirectory, InMemoryTemplateStore};
use mailcraft::campaigns::{
    Campaign, CampaignDraft, CampaignId, CampaignOrchestrator, CampaignRepository, ContactStatus,
    EventIngestor, WebhookEvent,
};
use mailcraft::email::{
    EmailTemplate, RevisionId, TemplateDraft, TemplateId, TemplateRevision, TemplateService,
    TemplateUpdate, UserId,
};
use mailcraft::error::AppError;

/// Handle bundle shared by every endpoint. The in-memory adapters fix the
/// generic parameters here; swapping in real storage means swapping this type.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) templates: Arc<TemplateService<InMemoryTemplateStore>>,
    pub(crate) orchestrator:
        Arc<CampaignOrchestrator<InMemoryCampaignRepository, InMemoryDirectory, InMemoryTemplateStore>>,
    pub(crate) ingestor: Arc<EventIngestor<InMemoryCampaignRepository>>,
    pub(crate) repository: Arc<InMemoryCampaignRepository>,
}

pub(crate) fn router(services: Services) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/templates",
            axum::routing::post(create_template_endpoint),
        )
        .route(
            "/api/v1/templates/:id",
            axum::routing::get(get_template_endpoint).put(save_template_endpoint),
        )
        .route(
            "/api/v1/templates/:id/revisions",
            axum::routing::get(template_history_endpoint),
        )
        .route(
            "/api/v1/templates/:id/revisions/:revision/restore",
            axum::routing::post(restore_template_endpoint),
        )
        .route(
            "/api/v1/campaigns",
            axum::routing::post(create_campaign_endpoint),
        )
        .route(
            "/api/v1/campaigns/:id",
            axum::routing::get(get_campaign_endpoint).delete(discard_campaign_endpoint),
        )
        .route(
            "/api/v1/campaigns/:id/send",
            axum::routing::post(send_campaign_endpoint),
        )
        .route(
            "/api/v1/webhooks/email",
            axum::routing::post(webhook_endpoint),
        )
        .layer(Extension(services))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn create_template_endpoint(
    Extension(services): Extension<Services>,
    Json(draft): Json<TemplateDraft>,
) -> Result<(StatusCode, Json<EmailTemplate>), AppError> {
    let template = services.templates.create(draft, Utc::now())?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub(crate) async fn get_template_endpoint(
    Extension(services): Extension<Services>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmailTemplate>, AppError> {
    let template = services.templates.get(&TemplateId(id))?;
    Ok(Json(template))
}

pub(crate) async fn save_template_endpoint(
    Extension(services): Extension<Services>,
    Path(id): Path<Uuid>,
    Json(update): Json<TemplateUpdate>,
) -> Result<Json<EmailTemplate>, AppError> {
    let template = services.templates.save(&TemplateId(id), update, Utc::now())?;
    Ok(Json(template))
}

pub(crate) async fn template_history_endpoint(
    Extension(services): Extension<Services>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TemplateRevision>>, AppError> {
    let revisions = services.templates.history(&TemplateId(id))?;
    Ok(Json(revisions))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestoreRequest {
    pub(crate) restored_by: UserId,
}

pub(crate) async fn restore_template_endpoint(
    Extension(services): Extension<Services>,
    Path((id, revision)): Path<(Uuid, u32)>,
    Json(request): Json<RestoreRequest>,
) -> Result<Json<EmailTemplate>, AppError> {
    let template = services.templates.restore(
        &TemplateId(id),
        RevisionId(revision),
        request.restored_by,
        Utc::now(),
    )?;
    Ok(Json(template))
}

pub(crate) async fn create_campaign_endpoint(
    Extension(services): Extension<Services>,
    Json(draft): Json<CampaignDraft>,
) -> Result<(StatusCode, Json<Campaign>), AppError> {
    let campaign = services.orchestrator.create(draft, Utc::now())?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub(crate) async fn send_campaign_endpoint(
    Extension(services): Extension<Services>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Campaign>), AppError> {
    let campaign = services.orchestrator.queue(&CampaignId(id), Utc::now())?;
    Ok((StatusCode::ACCEPTED, Json(campaign)))
}

/// Per-status recipient tally reported alongside the campaign.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct ContactTally {
    pub(crate) pending: usize,
    pub(crate) sent: usize,
    pub(crate) opened: usize,
    pub(crate) clicked: usize,
    pub(crate) bounced: usize,
    pub(crate) failed: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct CampaignStatusResponse {
    pub(crate) campaign: Campaign,
    pub(crate) contacts: ContactTally,
}

pub(crate) async fn get_campaign_endpoint(
    Extension(services): Extension<Services>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignStatusResponse>, AppError> {
    let id = CampaignId(id);
    let campaign = services.orchestrator.get(&id)?;

    let mut tally = ContactTally::default();
    for contact in services
        .repository
        .contacts(&id)
        .map_err(mailcraft::campaigns::CampaignError::from)?
    {
        match contact.status {
            ContactStatus::Pending => tally.pending += 1,
            ContactStatus::Sent => tally.sent += 1,
            ContactStatus::Opened => tally.opened += 1,
            ContactStatus::Clicked => tally.clicked += 1,
            ContactStatus::Bounced => tally.bounced += 1,
            ContactStatus::Failed => tally.failed += 1,
        }
    }

    Ok(Json(CampaignStatusResponse {
        campaign,
        contacts: tally,
    }))
}

pub(crate) async fn discard_campaign_endpoint(
    Extension(services): Extension<Services>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services.orchestrator.discard(&CampaignId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub(crate) struct WebhookResponse {
    pub(crate) status: &'static str,
    pub(crate) status_changed: bool,
}

pub(crate) async fn webhook_endpoint(
    Extension(services): Extension<Services>,
    Json(event): Json<WebhookEvent>,
) -> Result<Json<WebhookResponse>, AppError> {
    let outcome = services.ingestor.ingest(event, Utc::now())?;
    Ok(Json(WebhookResponse {
        status: outcome.status.label(),
        status_changed: outcome.status_changed,
    }))
}
