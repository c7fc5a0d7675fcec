use crate::cli::ServeArgs;
use crate::infra::{AppState, ConfiguredExport};
use crate::routes::with_assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use probation_risk::config::AppConfig;
use probation_risk::error::AppError;
use probation_risk::telemetry;
use probation_risk::workflows::assessment::{
    AssessmentWizard, InMemorySessionStore, JsonReportRenderer, SessionStore, WizardSettings,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let exporter = ConfiguredExport::from_config(&config.assessment)?;
    let wizard = Arc::new(AssessmentWizard::new(
        Arc::new(InMemorySessionStore::default()),
        Arc::new(exporter),
        Box::new(JsonReportRenderer),
        WizardSettings::from(&config.assessment),
    ));
    spawn_session_sweeper(wizard.clone());

    let app = with_assessment_routes(wizard)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "probation risk assessment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_session_sweeper<S>(wizard: Arc<AssessmentWizard<S, ConfiguredExport>>)
where
    S: SessionStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match wizard.progress().expire_idle() {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired idle assessment sessions"),
                Err(err) => warn!(error = %err, "session sweep failed"),
            }
        }
    });
}
