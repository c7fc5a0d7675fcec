use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use probation_risk::error::AppError;
use probation_risk::workflows::assessment::segments;
use probation_risk::workflows::assessment::{
    assessment_router, AssessmentSummary, AssessmentWizard, ExportSink, ScoringEngine,
    SegmentAnswers, SessionStore, SHORT_SENTENCE,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    /// Scores keyed by nominal segment index.
    #[serde(default)]
    pub(crate) segments: BTreeMap<u8, Vec<i32>>,
    #[serde(default)]
    pub(crate) length_of_sentence: Option<String>,
}

pub(crate) fn with_assessment_routes<S, E>(
    wizard: Arc<AssessmentWizard<S, E>>,
) -> axum::Router
where
    S: SessionStore + 'static,
    E: ExportSink + 'static,
{
    assessment_router(wizard)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/assessments/score",
            axum::routing::post(score_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Stateless scoring of a complete answer set, outside the wizard.
pub(crate) async fn score_endpoint(
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<AssessmentSummary>, AppError> {
    let ScoreRequest {
        segments: submitted,
        length_of_sentence,
    } = payload;

    let mut answers = SegmentAnswers::default();
    for (segment, scores) in submitted {
        let expected = segments::question_count(u32::from(segment))?;
        if scores.len() > expected {
            return Err(AppError::Input(format!(
                "segment {segment} has {expected} questions but {} scores were given",
                scores.len()
            )));
        }
        answers.set(segment, scores);
    }

    let sentence = length_of_sentence
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| SHORT_SENTENCE.to_string());
    Ok(Json(ScoringEngine::new().summarize(&answers, &sentence)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ConfiguredExport;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use probation_risk::workflows::assessment::{
        DisabledExportSink, InMemorySessionStore, JsonReportRenderer, RiskTier, WizardSettings,
    };
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let wizard = Arc::new(AssessmentWizard::new(
            Arc::new(InMemorySessionStore::default()),
            Arc::new(ConfiguredExport::Disabled(DisabledExportSink)),
            Box::new(JsonReportRenderer),
            WizardSettings::default(),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_assessment_routes(wizard).layer(Extension(state))
    }

    fn score_request(segments: serde_json::Value) -> ScoreRequest {
        serde_json::from_value(json!({ "segments": segments })).expect("valid request")
    }

    #[tokio::test]
    async fn score_endpoint_returns_summary() {
        let request = score_request(json!({
            "1": [1, 1, 1, 1, 1, 1],
            "2": [1, 1, 0],
            "5": [1, 1, 0, 2, 2, 2],
        }));

        let Json(summary) = score_endpoint(Json(request)).await.expect("scores");

        assert_eq!(summary.total_score, 16);
        assert_eq!(summary.classification.tier, RiskTier::Low);
        assert_eq!(summary.classification.probation_period, "6 months");
        assert!(summary
            .recommended_programs
            .contains(&"LEAP (EMPLOYMENT)".to_string()));
    }

    #[tokio::test]
    async fn score_endpoint_rejects_unknown_segments() {
        let request = score_request(json!({ "9": [1] }));
        let err = score_endpoint(Json(request)).await.expect_err("segment 9 rejected");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let response = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn assessment_routes_are_mounted() {
        let response = app(true)
            .oneshot(
                Request::post("/api/v1/assessments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
