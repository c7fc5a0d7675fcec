use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDateTime;
use serde_json::Value;

use crate::workflows::assessment::export::{ExportError, ExportRecord, ExportSink};
use crate::workflows::assessment::report::{
    AssessmentReport, JsonReportRenderer, RenderError, RenderedDocument, ReportRenderer,
};
use crate::workflows::assessment::segments::question_count;
use crate::workflows::assessment::session::RespondentProfile;
use crate::workflows::assessment::store::InMemorySessionStore;
use crate::workflows::assessment::tokens::TokenAuthority;
use crate::workflows::assessment::wizard::{field_name, AssessmentWizard, WizardSettings};

#[derive(Default, Clone)]
pub(super) struct MemoryExport {
    records: Arc<Mutex<Vec<ExportRecord>>>,
}

impl MemoryExport {
    pub(super) fn records(&self) -> Vec<ExportRecord> {
        self.records.lock().expect("export mutex poisoned").clone()
    }
}

#[async_trait]
impl ExportSink for MemoryExport {
    async fn submit(&self, record: &ExportRecord) -> Result<(), ExportError> {
        self.records
            .lock()
            .expect("export mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}

pub(super) struct FailingExport;

#[async_trait]
impl ExportSink for FailingExport {
    async fn submit(&self, _record: &ExportRecord) -> Result<(), ExportError> {
        Err(ExportError::Status(500))
    }
}

pub(super) struct SlowExport;

#[async_trait]
impl ExportSink for SlowExport {
    async fn submit(&self, _record: &ExportRecord) -> Result<(), ExportError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

pub(super) struct FailingRenderer;

impl ReportRenderer for FailingRenderer {
    fn render(
        &self,
        _report: &AssessmentReport,
        _now: NaiveDateTime,
    ) -> Result<RenderedDocument, RenderError> {
        Err(RenderError::Backend("typesetter offline".to_string()))
    }
}

pub(super) fn settings() -> WizardSettings {
    WizardSettings {
        export_timeout: Duration::from_millis(50),
        session_ttl: Duration::from_secs(1800),
        token_history: 8,
    }
}

/// Token authority pinned to one time bucket.
pub(super) fn fixed_authority() -> TokenAuthority {
    TokenAuthority::with_clock(Arc::new(|| 1_700_000_000))
}

pub(super) fn build_wizard_with<E>(
    exporter: E,
    renderer: Box<dyn ReportRenderer>,
) -> (
    AssessmentWizard<InMemorySessionStore, E>,
    InMemorySessionStore,
    Arc<E>,
)
where
    E: ExportSink + 'static,
{
    let store = InMemorySessionStore::default();
    let exporter = Arc::new(exporter);
    let wizard = AssessmentWizard::with_authority(
        Arc::new(store.clone()),
        exporter.clone(),
        renderer,
        settings(),
        fixed_authority(),
    );
    (wizard, store, exporter)
}

pub(super) fn build_wizard() -> (
    AssessmentWizard<InMemorySessionStore, MemoryExport>,
    InMemorySessionStore,
    Arc<MemoryExport>,
) {
    build_wizard_with(MemoryExport::default(), Box::new(JsonReportRenderer))
}

pub(super) fn respondent() -> RespondentProfile {
    RespondentProfile {
        email: "officer@example.org".to_string(),
        client_name: "Juan Dela Cruz".to_string(),
        length_of_sentence: "2-years-or-less".to_string(),
        officer_name: "PO2 Reyes".to_string(),
        chief_name: "Chief Santos".to_string(),
    }
}

/// Form fields for `segment` carrying `scores` in question order.
pub(super) fn answers(segment: u8, scores: &[i32]) -> HashMap<String, String> {
    scores
        .iter()
        .enumerate()
        .map(|(position, score)| (field_name(segment, position + 1), score.to_string()))
        .collect()
}

pub(super) fn zero_answers(segment: u8) -> HashMap<String, String> {
    let count = question_count(u32::from(segment)).expect("known segment");
    answers(segment, &vec![0; count])
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body collects");
    serde_json::from_slice(&bytes).expect("json body")
}
