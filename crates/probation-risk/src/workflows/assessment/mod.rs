//! Probation risk assessment: an eight-segment questionnaire walked in order
//! under step tokens, scored into a risk tier and program recommendations.

pub mod export;
pub mod report;
pub mod router;
pub mod scoring;
pub mod segments;
pub mod session;
pub mod store;
pub mod tokens;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use export::{DisabledExportSink, ExportError, ExportRecord, ExportSink, HttpExportSink};
pub use report::{
    report_file_name, AssessmentReport, JsonReportRenderer, RenderError, RenderedDocument,
    ReportRenderer,
};
pub use router::assessment_router;
pub use scoring::{
    AssessmentSummary, RiskAssessmentResult, RiskClassification, RiskTier, ScoringEngine,
    SlotSubtotal,
};
pub use segments::{SegmentDefinition, SegmentError, SEGMENT_COUNT};
pub use session::{RespondentProfile, SegmentAnswers, Session, SessionId, SHORT_SENTENCE};
pub use store::{InMemorySessionStore, ProgressStore, SessionStore, StoreError};
pub use tokens::{StepToken, TokenAuthority, TokenPurpose};
pub use wizard::{
    AssessmentWizard, Navigation, ReportStep, Restart, WizardError, WizardOutcome,
    WizardSettings, WizardState,
};
