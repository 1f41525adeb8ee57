use crate::campaigns::events::IngestError;
use crate::campaigns::orchestrator::CampaignError;
use crate::campaigns::repository::RepositoryError;
use crate::config::ConfigError;
use crate::email::template::{StoreError, TemplateServiceError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Template(TemplateServiceError),
    Campaign(CampaignError),
    Ingest(IngestError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Template(err) => write!(f, "template error: {}", err),
            AppError::Campaign(err) => write!(f, "campaign error: {}", err),
            AppError::Ingest(err) => write!(f, "webhook ingest error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Template(err) => Some(err),
            AppError::Campaign(err) => Some(err),
            AppError::Ingest(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Template(TemplateServiceError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Template(TemplateServiceError::Store(StoreError::NotFound))
            | AppError::Template(TemplateServiceError::RevisionNotFound) => StatusCode::NOT_FOUND,
            AppError::Template(TemplateServiceError::Store(StoreError::Conflict)) => {
                StatusCode::CONFLICT
            }
            AppError::Campaign(CampaignError::Repository(RepositoryError::NotFound))
            | AppError::Campaign(CampaignError::MissingTemplate) => StatusCode::NOT_FOUND,
            AppError::Campaign(
                CampaignError::InvalidState { .. }
                | CampaignError::EmptyTagSet
                | CampaignError::NoRecipients
                | CampaignError::UnverifiedFromAddress
                | CampaignError::ScheduledInPast,
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Ingest(IngestError::UnknownMessage { .. }) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Template(_)
            | AppError::Campaign(_)
            | AppError::Ingest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<TemplateServiceError> for AppError {
    fn from(value: TemplateServiceError) -> Self {
        Self::Template(value)
    }
}

impl From<CampaignError> for AppError {
    fn from(value: CampaignError) -> Self {
        Self::Campaign(value)
    }
}

impl From<IngestError> for AppError {
    fn from(value: IngestError) -> Self {
        Self::Ingest(value)
    }
}
