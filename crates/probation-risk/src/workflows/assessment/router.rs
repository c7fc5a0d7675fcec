use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::export::ExportSink;
use super::session::{RespondentProfile, SessionId};
use super::store::SessionStore;
use super::wizard::{
    AssessmentWizard, Restart, ReportStep, WizardOutcome, WizardState, INVALID_SEGMENT_NOTICE,
    UNREADABLE_SUBMISSION_NOTICE,
};

/// Header set by the sign-in collaborator in front of the service.
pub const AUTHENTICATED_EMAIL_HEADER: &str = "x-authenticated-email";
pub const START_PATH: &str = "/api/v1/assessments";

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub length_of_sentence: String,
    #[serde(default)]
    pub officer_name: String,
    #[serde(default)]
    pub chief_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

/// Answers may arrive as strings, numbers, or anything else; only integral
/// values survive [`SegmentSubmission::answer_fields`].
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SegmentSubmission {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub answers: HashMap<String, Value>,
}

impl SegmentSubmission {
    /// Form-field view of the answers. Values that are neither strings nor
    /// integers become empty and later count as zero.
    pub fn answer_fields(&self) -> HashMap<String, String> {
        self.answers
            .iter()
            .map(|(field, value)| {
                let raw = match value {
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number
                        .as_i64()
                        .map(|integer| integer.to_string())
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                (field.clone(), raw)
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: String,
}

/// Router builder exposing the assessment wizard.
pub fn assessment_router<S, E>(wizard: Arc<AssessmentWizard<S, E>>) -> Router
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    Router::new()
        .route(START_PATH, post(start_handler::<S, E>))
        .route(
            "/api/v1/assessments/:session_id/segments/:segment",
            get(show_segment_handler::<S, E>).post(submit_segment_handler::<S, E>),
        )
        .route(
            "/api/v1/assessments/:session_id/results",
            get(results_handler::<S, E>),
        )
        .route(
            "/api/v1/assessments/:session_id/report-token",
            get(report_token_handler::<S, E>),
        )
        .route(
            "/api/v1/assessments/:session_id/report",
            get(report_handler::<S, E>),
        )
        .route(
            "/api/v1/assessments/:session_id/navigate/:target",
            get(navigate_handler::<S, E>),
        )
        .route(
            "/api/v1/assessments/:session_id/notes",
            post(notes_handler::<S, E>),
        )
        .with_state(wizard)
}

/// `303 See Other` back to the start of the wizard.
pub fn restart_response(restart: Restart) -> Response {
    let payload = json!({
        "state": WizardState::Start,
        "notice": restart.notice,
    });
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, START_PATH)],
        axum::Json(payload),
    )
        .into_response()
}

fn respond<T: Serialize>(status: StatusCode, outcome: WizardOutcome<T>) -> Response {
    match outcome {
        WizardOutcome::Proceed(view) => (status, axum::Json(view)).into_response(),
        WizardOutcome::Restart(restart) => restart_response(restart),
    }
}

fn parse_segment(raw: &str) -> Result<u32, Response> {
    raw.trim().parse::<u32>().map_err(|_| {
        restart_response(Restart {
            notice: INVALID_SEGMENT_NOTICE.to_string(),
        })
    })
}

pub(crate) async fn start_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<StartRequest>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    let email = headers
        .get(AUTHENTICATED_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let respondent = RespondentProfile {
        email,
        client_name: request.client_name,
        length_of_sentence: request.length_of_sentence,
        officer_name: request.officer_name,
        chief_name: request.chief_name,
    };

    respond(StatusCode::CREATED, wizard.start(respondent))
}

pub(crate) async fn show_segment_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    Path((session_id, segment)): Path<(String, String)>,
    Query(query): Query<TokenQuery>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    let segment = match parse_segment(&segment) {
        Ok(segment) => segment,
        Err(response) => return response,
    };
    let outcome = wizard.show_segment(&SessionId(session_id), segment, &query.token);
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn submit_segment_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    Path((session_id, segment)): Path<(String, String)>,
    submission: Result<axum::Json<SegmentSubmission>, JsonRejection>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    let segment = match parse_segment(&segment) {
        Ok(segment) => segment,
        Err(response) => return response,
    };
    let axum::Json(submission) = match submission {
        Ok(submission) => submission,
        Err(rejection) => {
            warn!(error = %rejection, "segment submission body rejected");
            return restart_response(Restart {
                notice: UNREADABLE_SUBMISSION_NOTICE.to_string(),
            });
        }
    };
    let outcome = wizard
        .submit_segment(
            &SessionId(session_id),
            segment,
            &submission.token,
            &submission.answer_fields(),
        )
        .await;
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn results_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    Path(session_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    respond(
        StatusCode::OK,
        wizard.results(&SessionId(session_id), &query.token),
    )
}

pub(crate) async fn report_token_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    let outcome = match wizard.report_token(&SessionId(session_id)) {
        WizardOutcome::Proceed(token) => WizardOutcome::Proceed(json!({ "token": token })),
        WizardOutcome::Restart(restart) => WizardOutcome::Restart(restart),
    };
    respond(StatusCode::OK, outcome)
}

pub(crate) async fn report_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    Path(session_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    match wizard.report(&SessionId(session_id), &query.token) {
        WizardOutcome::Proceed(ReportStep::Document(document)) => {
            let disposition = format!("attachment; filename=\"{}\"", document.file_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, document.content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                document.body,
            )
                .into_response()
        }
        WizardOutcome::Proceed(ReportStep::Unavailable {
            warning,
            results_token,
        }) => {
            let payload = json!({
                "state": WizardState::Results,
                "token": results_token,
                "warnings": [warning],
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        WizardOutcome::Restart(restart) => restart_response(restart),
    }
}

pub(crate) async fn navigate_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    Path((session_id, target)): Path<(String, String)>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    respond(
        StatusCode::OK,
        wizard.navigate(&SessionId(session_id), &target),
    )
}

pub(crate) async fn notes_handler<S, E>(
    State(wizard): State<Arc<AssessmentWizard<S, E>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<NotesRequest>,
) -> Response
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    let outcome = match wizard.save_notes(&SessionId(session_id), request.notes) {
        WizardOutcome::Proceed(()) => WizardOutcome::Proceed(json!({ "status": "saved" })),
        WizardOutcome::Restart(restart) => WizardOutcome::Restart(restart),
    };
    respond(StatusCode::OK, outcome)
}
