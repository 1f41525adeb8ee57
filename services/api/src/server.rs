use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::infra::{
    seed_demo_tenant, AppState, InMemoryCampaignRepository, InMemoryDirectory,
    InMemoryTemplateStore, InMemoryVariableSource, SandboxMailProvider,
};
use crate::routes::{router, Services};
use mailcraft::campaigns::{CampaignOrchestrator, EventIngestor};
use mailcraft::config::AppConfig;
use mailcraft::email::{RevisionStore, TemplateService};
use mailcraft::error::AppError;
use mailcraft::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryTemplateStore::default());
    let repository = Arc::new(InMemoryCampaignRepository::default());
    let directory = Arc::new(InMemoryDirectory::default());
    let variables = Arc::new(InMemoryVariableSource::default());
    let from_address_id = seed_demo_tenant(&repository, &directory, &variables);
    info!(from_address = %from_address_id.0, "demo tenant seeded");

    let templates = Arc::new(TemplateService::new(
        store.clone(),
        Arc::new(RevisionStore::new()),
        variables.clone(),
    ));
    let orchestrator = Arc::new(CampaignOrchestrator::new(
        repository.clone(),
        directory,
        store,
        variables,
        Arc::new(SandboxMailProvider::default()),
        config.dispatch.clone(),
    ));
    let ingestor = Arc::new(EventIngestor::new(repository.clone()));

    spawn_dispatch_worker(orchestrator.clone(), config.dispatch.worker_poll_interval);

    let services = Services {
        templates,
        orchestrator,
        ingestor,
        repository,
    };

    let app = router(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "campaign dispatch service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Background sweep that claims due campaigns and reconciles stale contacts.
/// Dispatch blocks on provider retries, so each tick runs off the async
/// runtime's worker threads.
fn spawn_dispatch_worker(
    orchestrator: Arc<
        CampaignOrchestrator<InMemoryCampaignRepository, InMemoryDirectory, InMemoryTemplateStore>,
    >,
    poll_interval: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let orchestrator = orchestrator.clone();
            let outcome =
                tokio::task::spawn_blocking(move || orchestrator.poll(Utc::now())).await;

            match outcome {
                Ok(Ok(driven)) if !driven.is_empty() => {
                    info!(campaigns = driven.len(), "dispatch sweep drove campaigns");
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "dispatch sweep failed"),
                Err(err) => warn!(error = %err, "dispatch sweep panicked"),
            }
        }
    });
}
