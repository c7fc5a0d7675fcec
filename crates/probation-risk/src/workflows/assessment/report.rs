use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::scoring::AssessmentSummary;
use super::segments::scored_slots;
use super::session::{RespondentProfile, Session};

/// Input for the document-rendering collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub session_id: String,
    pub generated_on: String,
    pub respondent: RespondentProfile,
    pub length_of_sentence: String,
    pub summary: AssessmentSummary,
    pub sections: Vec<ReportSection>,
    pub education_score: i32,
    pub employment_score: i32,
    pub notes: String,
}

/// One split-aware slot with the answers behind its subtotal.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub slot: u8,
    pub title: String,
    pub threshold: i32,
    pub max_subtotal: i32,
    pub subtotal: i32,
    pub answers: Vec<ReportAnswer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportAnswer {
    pub prompt: &'static str,
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice: Option<&'static str>,
}

impl AssessmentReport {
    /// Segments that were never submitted are shown with zero per question.
    pub fn build(session: &Session, summary: AssessmentSummary, now: NaiveDateTime) -> Self {
        let sections = scored_slots()
            .iter()
            .map(|slot| {
                let stored = slot.span.select(session.answers.scores(slot.segment));
                let answers = slot
                    .questions()
                    .iter()
                    .enumerate()
                    .map(|(position, question)| {
                        let score = stored.get(position).copied().unwrap_or(0);
                        ReportAnswer {
                            prompt: question.prompt,
                            score,
                            choice: question.choice_label(score),
                        }
                    })
                    .collect();

                ReportSection {
                    slot: slot.slot,
                    title: slot.name.to_string(),
                    threshold: slot.rule.threshold,
                    max_subtotal: slot.max_subtotal(),
                    subtotal: summary.subtotal(slot.slot),
                    answers,
                }
            })
            .collect();

        Self {
            session_id: session.id.to_string(),
            generated_on: now.format("%B %d, %Y").to_string(),
            respondent: session.respondent.clone(),
            length_of_sentence: session.respondent.sentence_category().to_string(),
            education_score: summary.subtotal(5),
            employment_score: summary.subtotal(6),
            summary,
            sections,
            notes: session.notes.clone(),
        }
    }
}

/// File name `risk_assessment_<timestamp>_<session digest>.<extension>`.
pub fn report_file_name(session_id: &str, now: NaiveDateTime, extension: &str) -> String {
    let digest = hex::encode(Sha256::digest(session_id.as_bytes()));
    format!(
        "risk_assessment_{}_{}.{extension}",
        now.format("%Y%m%d%H%M%S"),
        &digest[..8]
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("report could not be rendered: {0}")]
    Backend(String),
}

/// Produces a human-facing document from a computed report.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &AssessmentReport, now: NaiveDateTime)
        -> Result<RenderedDocument, RenderError>;
}

/// Emits the report as pretty-printed JSON for downstream typesetting.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportRenderer;

impl ReportRenderer for JsonReportRenderer {
    fn render(
        &self,
        report: &AssessmentReport,
        now: NaiveDateTime,
    ) -> Result<RenderedDocument, RenderError> {
        let body = serde_json::to_vec_pretty(report)
            .map_err(|err| RenderError::Backend(err.to_string()))?;
        Ok(RenderedDocument {
            file_name: report_file_name(&report.session_id, now, "json"),
            content_type: mime::APPLICATION_JSON.to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::assessment::scoring::ScoringEngine;
    use chrono::{NaiveDate, Utc};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .and_then(|date| date.and_hms_opt(14, 5, 9))
            .expect("valid timestamp")
    }

    #[test]
    fn report_fills_missing_segments_with_zeroes() {
        let mut session = Session::new(RespondentProfile::default(), Utc::now());
        session.answers.set(5, vec![1, 1, 0, 2, 2, 2]);
        let summary = ScoringEngine::new().summarize(&session.answers, "2-years-or-less");
        let report = AssessmentReport::build(&session, summary, now());

        assert_eq!(report.sections.len(), 9);
        assert_eq!(report.sections[0].answers.len(), 6);
        assert!(report.sections[0].answers.iter().all(|answer| answer.score == 0));
        assert_eq!(report.education_score, 2);
        assert_eq!(report.employment_score, 6);
        assert_eq!(report.sections[5].answers[0].choice, Some("Unemployed"));
        assert_eq!(report.generated_on, "June 02, 2025");
        assert_eq!(report.length_of_sentence, "2-years-or-less");
    }

    #[test]
    fn file_name_embeds_timestamp_and_digest() {
        let name = report_file_name("session-1", now(), "json");
        assert!(name.starts_with("risk_assessment_20250602140509_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "risk_assessment_20250602140509_".len() + 8 + ".json".len());
    }

    #[test]
    fn json_renderer_produces_attachment() {
        let session = Session::new(RespondentProfile::default(), Utc::now());
        let summary = ScoringEngine::new().summarize(&session.answers, "2-years-or-less");
        let report = AssessmentReport::build(&session, summary, now());
        let document = JsonReportRenderer.render(&report, now()).expect("renders");
        assert_eq!(document.content_type, "application/json");
        let parsed: serde_json::Value = serde_json::from_slice(&document.body).expect("json body");
        assert_eq!(parsed["summary"]["total_score"], 0);
    }
}
