//! Flat record handed to the external spreadsheet collaborator at the end of
//! segment 8, plus the sinks that deliver it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use super::scoring::AssessmentSummary;
use super::segments::segments;
use super::session::Session;

/// Field name → value pairs in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRecord {
    fields: Vec<(String, String)>,
}

impl ExportRecord {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds the record from a finished session and its freshly computed summary.
    pub fn from_session(
        session: &Session,
        summary: &AssessmentSummary,
        timestamp: NaiveDateTime,
    ) -> Self {
        let respondent = &session.respondent;
        let mut record = ExportRecord::default();
        record.push("Timestamp", timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
        record.push("Email Address", respondent.email.as_str());
        record.push(
            "Name of Petitioner/Probation/Parole",
            respondent.client_name.as_str(),
        );
        record.push("Length of Sentence", respondent.length_of_sentence.as_str());
        record.push(
            "Name & Position of Inv/Supvg Officer",
            respondent.officer_name.as_str(),
        );
        record.push(
            "Chief Probation Officer/Officer-in-Charge",
            respondent.chief_name.as_str(),
        );

        for segment in segments() {
            let scores = session.answers.scores(segment.index);
            for (position, question) in segment.questions.iter().enumerate() {
                let value = scores.get(position).copied().unwrap_or(0);
                record.push(question.export_label, value.to_string());
            }
            let total: i32 = scores.iter().sum();
            record.push(format!("Segment {} Total", segment.index), total.to_string());
        }

        record.push("Total Risk Score", summary.total_score.to_string());
        record.push("Risk Level", summary.classification.level.as_str());
        record.push(
            "Probation Period",
            summary.classification.probation_period.as_str(),
        );
        record.push(
            "Supervision Intensity",
            summary.classification.supervision.as_str(),
        );
        record
    }
}

impl Serialize for ExportRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export client could not be built: {0}")]
    Client(String),
    #[error("export transport failed: {0}")]
    Transport(String),
    #[error("export endpoint answered with status {0}")]
    Status(u16),
    #[error("export timed out after {0:?}")]
    Timeout(Duration),
}

/// Outbound hook for finalized records.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn submit(&self, record: &ExportRecord) -> Result<(), ExportError>;
}

/// Posts the record as JSON to a web endpoint (e.g. a spreadsheet script).
#[derive(Debug, Clone)]
pub struct HttpExportSink {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpExportSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ExportError::Client(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

#[async_trait]
impl ExportSink for HttpExportSink {
    async fn submit(&self, record: &ExportRecord) -> Result<(), ExportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ExportError::Timeout(self.timeout)
                } else {
                    ExportError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Status(status.as_u16()));
        }

        debug!(endpoint = %self.endpoint, fields = record.len(), "assessment exported");
        Ok(())
    }
}

/// Used when no export endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledExportSink;

#[async_trait]
impl ExportSink for DisabledExportSink {
    async fn submit(&self, record: &ExportRecord) -> Result<(), ExportError> {
        info!(fields = record.len(), "export endpoint not configured; record kept local");
        Ok(())
    }
}
