use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use probation_risk::config::AssessmentConfig;
use probation_risk::workflows::assessment::{
    DisabledExportSink, ExportError, ExportRecord, ExportSink, HttpExportSink,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Export target chosen from configuration at startup.
pub(crate) enum ConfiguredExport {
    Http(HttpExportSink),
    Disabled(DisabledExportSink),
}

impl ConfiguredExport {
    pub(crate) fn from_config(config: &AssessmentConfig) -> Result<Self, ExportError> {
        match config.export_url.as_deref() {
            Some(url) => {
                info!(endpoint = url, timeout = ?config.export_timeout, "assessment export enabled");
                Ok(Self::Http(HttpExportSink::new(url, config.export_timeout)?))
            }
            None => Ok(Self::Disabled(DisabledExportSink)),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        matches!(self, ConfiguredExport::Http(_))
    }
}

#[async_trait]
impl ExportSink for ConfiguredExport {
    async fn submit(&self, record: &ExportRecord) -> Result<(), ExportError> {
        match self {
            ConfiguredExport::Http(sink) => sink.submit(record).await,
            ConfiguredExport::Disabled(sink) => sink.submit(record).await,
        }
    }
}
