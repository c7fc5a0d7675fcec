//! Segment-by-segment progression gated by step tokens.
//!
//! Every failure inside the wizard resolves to [`WizardOutcome::Restart`]:
//! the caller sends the respondent back to the start with a notice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::export::{ExportRecord, ExportSink};
use super::report::{AssessmentReport, RenderedDocument, ReportRenderer};
use super::scoring::{AssessmentSummary, ScoringEngine};
use super::segments::{self, Question, SEGMENT_COUNT};
use super::session::{RespondentProfile, Session, SessionId};
use super::store::{ProgressStore, SessionStore, StoreError};
use super::tokens::{StepToken, TokenAuthority, TokenPurpose};
use crate::config::AssessmentConfig;

pub const EXPIRED_NOTICE: &str = "Your session has expired. Please start a new assessment.";
pub const INVALID_TOKEN_NOTICE: &str =
    "Security token is invalid or expired. Please start over for your security.";
pub const INVALID_SEGMENT_NOTICE: &str = "Invalid segment ID. Please start over.";
pub const LOCKED_SEGMENT_NOTICE: &str =
    "Please complete the earlier segments first. Start over to continue.";
pub const UNREADABLE_SUBMISSION_NOTICE: &str =
    "Your answers could not be read. Please start over.";
pub const INVALID_NAVIGATION_NOTICE: &str = "Invalid navigation request.";
pub const EXPORT_WARNING: &str = "Failed to save responses to the export service, but continuing to results.";
pub const REPORT_WARNING: &str = "Error generating the report. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "segment")]
pub enum WizardState {
    Start,
    Segment(u8),
    Finalizing,
    Results,
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("session expired or unknown")]
    ExpiredSession,
    #[error("{purpose} token rejected")]
    InvalidToken { purpose: TokenPurpose },
    #[error("segment {0} is out of range")]
    SegmentOutOfRange(u32),
    #[error("segment {requested} is not unlocked yet")]
    SegmentLocked { requested: u8 },
    #[error("unknown navigation target {0:?}")]
    UnknownTarget(String),
    #[error("session store unavailable: {0}")]
    Store(String),
}

impl WizardError {
    pub fn notice(&self) -> &'static str {
        match self {
            WizardError::ExpiredSession | WizardError::Store(_) => EXPIRED_NOTICE,
            WizardError::InvalidToken { .. } => INVALID_TOKEN_NOTICE,
            WizardError::SegmentOutOfRange(_) => INVALID_SEGMENT_NOTICE,
            WizardError::SegmentLocked { .. } => LOCKED_SEGMENT_NOTICE,
            WizardError::UnknownTarget(_) => INVALID_NAVIGATION_NOTICE,
        }
    }
}

impl From<StoreError> for WizardError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Expired => WizardError::ExpiredSession,
            StoreError::Unavailable(reason) => WizardError::Store(reason),
        }
    }
}

/// Sends the respondent back to [`WizardState::Start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Restart {
    pub notice: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome<T> {
    Proceed(T),
    Restart(Restart),
}

impl<T> WizardOutcome<T> {
    pub fn proceeded(self) -> Option<T> {
        match self {
            WizardOutcome::Proceed(value) => Some(value),
            WizardOutcome::Restart(_) => None,
        }
    }

    pub fn is_restart(&self) -> bool {
        matches!(self, WizardOutcome::Restart(_))
    }
}

fn recover<T>(operation: &'static str, result: Result<T, WizardError>) -> WizardOutcome<T> {
    match result {
        Ok(value) => WizardOutcome::Proceed(value),
        Err(err) => {
            match &err {
                WizardError::Store(_) => error!(operation, error = %err, "wizard restart"),
                _ => warn!(operation, error = %err, "wizard restart"),
            }
            WizardOutcome::Restart(Restart {
                notice: err.notice().to_string(),
            })
        }
    }
}

/// Entry point of the wizard.
#[derive(Debug, Clone, Serialize)]
pub struct Started {
    pub session_id: SessionId,
    pub state: WizardState,
    pub token: StepToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    /// Form field carrying the answer, `seg{n}_q{i}`.
    pub field: String,
    pub question: &'static Question,
}

/// Everything needed to render one segment form.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentPage {
    pub session_id: SessionId,
    pub state: WizardState,
    pub title: &'static str,
    pub next_segment: Option<u8>,
    pub questions: Vec<QuestionView>,
    /// Previously stored answers, empty until the segment is submitted.
    pub stored_scores: Vec<i32>,
    pub token: StepToken,
}

/// Where a successful submission leads.
#[derive(Debug, Clone, Serialize)]
pub struct Advanced {
    pub session_id: SessionId,
    pub state: WizardState,
    pub token: StepToken,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsView {
    pub session_id: SessionId,
    pub state: WizardState,
    pub respondent: RespondentProfile,
    pub summary: AssessmentSummary,
    pub segment_titles: Vec<(u8, &'static str)>,
    pub notes: String,
    pub token: StepToken,
}

#[derive(Debug, Clone)]
pub enum ReportStep {
    Document(RenderedDocument),
    /// Rendering failed; the respondent goes back to the results page.
    Unavailable {
        warning: String,
        results_token: StepToken,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "target")]
pub enum Navigation {
    Start,
    Segment { segment: u8, token: StepToken },
    Results { token: StepToken },
}

/// Tunables for the wizard, normally taken from [`AssessmentConfig`].
#[derive(Debug, Clone)]
pub struct WizardSettings {
    pub export_timeout: Duration,
    pub session_ttl: Duration,
    pub token_history: usize,
}

impl From<&AssessmentConfig> for WizardSettings {
    fn from(config: &AssessmentConfig) -> Self {
        Self {
            export_timeout: config.export_timeout,
            session_ttl: config.session_ttl,
            token_history: config.token_history,
        }
    }
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self::from(&AssessmentConfig::default())
    }
}

/// Extracts per-question scores for `segment` from submitted form fields.
///
/// Iterates the registry's question count; absent or unparsable values count
/// as zero, and values outside a question's choices are clamped into
/// `0..=max_points`. The result is in question order.
pub fn extract_scores(segment: u8, fields: &HashMap<String, String>) -> Vec<i32> {
    let Ok(definition) = segments::segment(u32::from(segment)) else {
        return Vec::new();
    };
    definition
        .questions
        .iter()
        .enumerate()
        .map(|(position, question)| {
            let field = field_name(segment, position + 1);
            let points = fields
                .get(&field)
                .and_then(|raw| raw.trim().parse::<i32>().ok())
                .unwrap_or(0);
            clamp_points(&field, question, points)
        })
        .collect()
}

fn clamp_points(field: &str, question: &Question, points: i32) -> i32 {
    if question.choice_label(points).is_some() {
        return points;
    }
    let clamped = points.clamp(0, question.max_points());
    if clamped != points {
        warn!(field, submitted = points, clamped, "answer outside question choices");
    }
    clamped
}

pub fn field_name(segment: u8, question: usize) -> String {
    format!("seg{segment}_q{question}")
}

/// Orchestrates the assessment over a session store and export sink.
pub struct AssessmentWizard<S, E> {
    progress: ProgressStore<S>,
    tokens: TokenAuthority,
    engine: ScoringEngine,
    exporter: Arc<E>,
    renderer: Box<dyn ReportRenderer>,
    export_timeout: Duration,
}

impl<S, E> AssessmentWizard<S, E>
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        exporter: Arc<E>,
        renderer: Box<dyn ReportRenderer>,
        settings: WizardSettings,
    ) -> Self {
        Self::with_authority(store, exporter, renderer, settings, TokenAuthority::new())
    }

    pub fn with_authority(
        store: Arc<S>,
        exporter: Arc<E>,
        renderer: Box<dyn ReportRenderer>,
        settings: WizardSettings,
        tokens: TokenAuthority,
    ) -> Self {
        Self {
            progress: ProgressStore::new(store, settings.session_ttl, settings.token_history),
            tokens,
            engine: ScoringEngine::new(),
            exporter,
            renderer,
            export_timeout: settings.export_timeout,
        }
    }

    pub fn progress(&self) -> &ProgressStore<S> {
        &self.progress
    }

    /// `Start -> Segment(1)`.
    pub fn start(&self, respondent: RespondentProfile) -> WizardOutcome<Started> {
        recover("start", self.try_start(respondent))
    }

    fn try_start(&self, respondent: RespondentProfile) -> Result<Started, WizardError> {
        let session = self.progress.open(respondent)?;
        let token = self.issue(&session.id, TokenPurpose::Segment)?;
        info!(session_id = %session.id, "assessment started");
        Ok(Started {
            session_id: session.id,
            state: WizardState::Segment(1),
            token,
        })
    }

    /// Re-renders segment `segment` without touching stored scores.
    pub fn show_segment(
        &self,
        session_id: &SessionId,
        segment: u32,
        token: &str,
    ) -> WizardOutcome<SegmentPage> {
        recover("show_segment", self.try_show_segment(session_id, segment, token))
    }

    fn try_show_segment(
        &self,
        session_id: &SessionId,
        segment: u32,
        token: &str,
    ) -> Result<SegmentPage, WizardError> {
        let session = self.progress.load(session_id)?;
        self.verify(&session, TokenPurpose::Segment, token)?;
        let index = self.unlocked_segment(&session, segment)?;

        let presented = StepToken(token.to_string());
        self.progress
            .record_token(session_id, TokenPurpose::Segment, presented.clone())?;
        debug!(session_id = %session_id, segment = index, "segment rendered");

        segment_page(&session, index, presented)
    }

    /// `Segment(n) -> Segment(n+1)`, or `Segment(8) -> Finalizing -> Results`.
    pub async fn submit_segment(
        &self,
        session_id: &SessionId,
        segment: u32,
        token: &str,
        fields: &HashMap<String, String>,
    ) -> WizardOutcome<Advanced> {
        let result = self.try_submit_segment(session_id, segment, token, fields).await;
        recover("submit_segment", result)
    }

    async fn try_submit_segment(
        &self,
        session_id: &SessionId,
        segment: u32,
        token: &str,
        fields: &HashMap<String, String>,
    ) -> Result<Advanced, WizardError> {
        let session = self.progress.load(session_id)?;
        self.verify(&session, TokenPurpose::Segment, token)?;
        let index = self.unlocked_segment(&session, segment)?;

        let scores = extract_scores(index, fields);
        debug!(session_id = %session_id, segment = index, ?scores, "segment submitted");
        let session = self.progress.update(session_id, |session| {
            session.answers.set(index, scores);
            session.unlocked_segment = session.unlocked_segment.max((index + 1).min(SEGMENT_COUNT));
        })?;

        if index < SEGMENT_COUNT {
            let token = self.issue(session_id, TokenPurpose::Segment)?;
            return Ok(Advanced {
                session_id: session_id.clone(),
                state: WizardState::Segment(index + 1),
                token,
                warnings: Vec::new(),
            });
        }

        debug!(session_id = %session_id, state = ?WizardState::Finalizing, "finalizing assessment");
        let mut warnings = Vec::new();
        if let Some(warning) = self.export(&session).await {
            warnings.push(warning);
        }
        let token = self.issue(session_id, TokenPurpose::Results)?;
        info!(session_id = %session_id, "assessment completed");

        Ok(Advanced {
            session_id: session_id.clone(),
            state: WizardState::Results,
            token,
            warnings,
        })
    }

    /// Summary for the results page, recomputed from stored answers.
    pub fn results(&self, session_id: &SessionId, token: &str) -> WizardOutcome<ResultsView> {
        recover("results", self.try_results(session_id, token))
    }

    fn try_results(&self, session_id: &SessionId, token: &str) -> Result<ResultsView, WizardError> {
        let session = self.progress.load(session_id)?;
        self.verify(&session, TokenPurpose::Results, token)?;

        let presented = StepToken(token.to_string());
        let session = self
            .progress
            .record_token(session_id, TokenPurpose::Results, presented.clone())?;
        let summary = self.summarize(&session);

        Ok(ResultsView {
            session_id: session.id.clone(),
            state: WizardState::Results,
            respondent: session.respondent.clone(),
            summary,
            segment_titles: segments::segments()
                .iter()
                .map(|segment| (segment.index, segment.title))
                .collect(),
            notes: session.notes.clone(),
            token: presented,
        })
    }

    /// Issues a fresh `generate_pdf` token for a session.
    pub fn report_token(&self, session_id: &SessionId) -> WizardOutcome<StepToken> {
        recover("report_token", self.try_report_token(session_id))
    }

    fn try_report_token(&self, session_id: &SessionId) -> Result<StepToken, WizardError> {
        self.progress.load(session_id)?;
        self.issue(session_id, TokenPurpose::GeneratePdf)
    }

    /// Hands the freshly computed report to the rendering collaborator.
    pub fn report(&self, session_id: &SessionId, token: &str) -> WizardOutcome<ReportStep> {
        recover("report", self.try_report(session_id, token))
    }

    fn try_report(&self, session_id: &SessionId, token: &str) -> Result<ReportStep, WizardError> {
        let session = self.progress.load(session_id)?;
        self.verify(&session, TokenPurpose::GeneratePdf, token)?;

        let now = Local::now().naive_local();
        let summary = self.summarize(&session);
        let report = AssessmentReport::build(&session, summary, now);

        match self.renderer.render(&report, now) {
            Ok(document) => {
                info!(session_id = %session_id, file = %document.file_name, "report rendered");
                Ok(ReportStep::Document(document))
            }
            Err(err) => {
                error!(session_id = %session_id, error = %err, "report rendering failed");
                let results_token = self.issue(session_id, TokenPurpose::Results)?;
                Ok(ReportStep::Unavailable {
                    warning: REPORT_WARNING.to_string(),
                    results_token,
                })
            }
        }
    }

    /// Issues a fresh token for `index`, `segment_<n>`, or `results`.
    pub fn navigate(&self, session_id: &SessionId, target: &str) -> WizardOutcome<Navigation> {
        recover("navigate", self.try_navigate(session_id, target))
    }

    fn try_navigate(&self, session_id: &SessionId, target: &str) -> Result<Navigation, WizardError> {
        let session = self.progress.load(session_id)?;

        if target == "index" {
            return Ok(Navigation::Start);
        }

        if let Some(raw) = target.strip_prefix("segment_") {
            let requested = raw
                .parse::<u32>()
                .map_err(|_| WizardError::UnknownTarget(target.to_string()))?;
            let segment = self.unlocked_segment(&session, requested)?;
            let token = self.issue(session_id, TokenPurpose::Segment)?;
            return Ok(Navigation::Segment { segment, token });
        }

        if target == "results" {
            if !session.answers.is_finished() {
                return Err(WizardError::SegmentLocked {
                    requested: session.unlocked_segment,
                });
            }
            let token = self.issue(session_id, TokenPurpose::Results)?;
            return Ok(Navigation::Results { token });
        }

        Err(WizardError::UnknownTarget(target.to_string()))
    }

    pub fn save_notes(&self, session_id: &SessionId, notes: String) -> WizardOutcome<()> {
        let result = self
            .progress
            .record_notes(session_id, notes)
            .map(|_| ())
            .map_err(WizardError::from);
        recover("save_notes", result)
    }

    pub fn summarize(&self, session: &Session) -> AssessmentSummary {
        self.engine
            .summarize(&session.answers, session.respondent.sentence_category())
    }

    fn issue(&self, session_id: &SessionId, purpose: TokenPurpose) -> Result<StepToken, WizardError> {
        let token = self.tokens.issue(session_id, purpose);
        self.progress.record_token(session_id, purpose, token.clone())?;
        Ok(token)
    }

    fn verify(&self, session: &Session, purpose: TokenPurpose, token: &str) -> Result<(), WizardError> {
        if self.tokens.verify(token, &session.id, purpose, &session.tokens) {
            Ok(())
        } else {
            Err(WizardError::InvalidToken { purpose })
        }
    }

    fn unlocked_segment(&self, session: &Session, requested: u32) -> Result<u8, WizardError> {
        let definition =
            segments::segment(requested).map_err(|_| WizardError::SegmentOutOfRange(requested))?;
        if definition.index > session.unlocked_segment {
            return Err(WizardError::SegmentLocked {
                requested: definition.index,
            });
        }
        Ok(definition.index)
    }

    /// Best-effort, time-bounded export. Returns a warning on failure.
    async fn export(&self, session: &Session) -> Option<String> {
        let summary = self.summarize(session);
        let record = ExportRecord::from_session(session, &summary, Local::now().naive_local());

        match tokio::time::timeout(self.export_timeout, self.exporter.submit(&record)).await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => {
                warn!(session_id = %session.id, error = %err, "export failed");
                Some(EXPORT_WARNING.to_string())
            }
            Err(_) => {
                warn!(
                    session_id = %session.id,
                    timeout = ?self.export_timeout,
                    "export timed out"
                );
                Some(EXPORT_WARNING.to_string())
            }
        }
    }
}

fn segment_page(session: &Session, index: u8, token: StepToken) -> Result<SegmentPage, WizardError> {
    let definition = segments::segment(u32::from(index))
        .map_err(|_| WizardError::SegmentOutOfRange(u32::from(index)))?;
    let questions = definition
        .questions
        .iter()
        .enumerate()
        .map(|(position, question)| QuestionView {
            field: field_name(index, position + 1),
            question,
        })
        .collect();

    Ok(SegmentPage {
        session_id: session.id.clone(),
        state: WizardState::Segment(index),
        title: definition.title,
        next_segment: (index < SEGMENT_COUNT).then_some(index + 1),
        questions,
        stored_scores: session.answers.scores(index).to_vec(),
        token,
    })
}
