use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::assessment::router::{
    assessment_router, show_segment_handler, TokenQuery, AUTHENTICATED_EMAIL_HEADER, START_PATH,
};
use crate::workflows::assessment::store::InMemorySessionStore;
use crate::workflows::assessment::session::SessionId;
use crate::workflows::assessment::wizard::{
    INVALID_SEGMENT_NOTICE, INVALID_TOKEN_NOTICE, UNREADABLE_SUBMISSION_NOTICE,
};

fn router() -> Router {
    let (wizard, _, _) = build_wizard();
    assessment_router(Arc::new(wizard))
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

async fn start(router: &Router) -> (String, String) {
    let request = Request::post(START_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .header(AUTHENTICATED_EMAIL_HEADER, "officer@example.org")
        .body(Body::from(
            json!({
                "client_name": "Juan Dela Cruz",
                "length_of_sentence": "2-years-or-less",
            })
            .to_string(),
        ))
        .expect("request builds");

    let response = router.clone().oneshot(request).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["state"]["state"], "segment");
    assert_eq!(payload["state"]["segment"], 1);
    (
        payload["session_id"].as_str().expect("session id").to_string(),
        payload["token"].as_str().expect("token").to_string(),
    )
}

fn assert_restart(response: &axum::response::Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some(START_PATH)
    );
}

#[tokio::test]
async fn start_route_creates_session() {
    let router = router();
    let (session_id, token) = start(&router).await;
    assert!(!session_id.is_empty());
    assert_eq!(token.len(), 16);
}

#[tokio::test]
async fn segment_routes_render_and_accept_answers() {
    let router = router();
    let (session_id, token) = start(&router).await;

    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/v1/assessments/{session_id}/segments/1?token={token}"
        )))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let page = read_json_body(response).await;
    assert_eq!(page["title"], "CRIMINAL HISTORY");
    assert_eq!(page["questions"].as_array().map(Vec::len), Some(6));

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/assessments/{session_id}/segments/1"),
            json!({
                "token": token,
                "answers": { "seg1_q1": "2", "seg1_q2": "1" },
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let advanced = read_json_body(response).await;
    assert_eq!(advanced["state"]["segment"], 2);
    assert!(advanced["warnings"].as_array().is_some_and(Vec::is_empty));
}

#[tokio::test]
async fn numeric_and_null_answers_are_accepted() {
    let (wizard, _, _) = build_wizard();
    let wizard = Arc::new(wizard);
    let router = assessment_router(Arc::clone(&wizard));
    let (session_id, token) = start(&router).await;

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/assessments/{session_id}/segments/1"),
            json!({
                "token": token,
                "answers": {
                    "seg1_q1": 2,
                    "seg1_q2": "1",
                    "seg1_q3": null,
                    "seg1_q4": true,
                    "seg1_q5": 1.5,
                },
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["state"]["segment"], 2);

    let stored = wizard
        .progress()
        .get_scores(&SessionId(session_id), 1)
        .expect("scores load");
    assert_eq!(stored, vec![2, 1, 0, 0, 0, 0]);
}

#[tokio::test]
async fn unreadable_submission_redirects_to_start() {
    let router = router();
    let (session_id, token) = start(&router).await;

    let uri = format!("/api/v1/assessments/{session_id}/segments/1");
    let bodies = [
        Body::from("{not json"),
        Body::from(json!({ "token": token, "answers": ["2", "1"] }).to_string()),
    ];
    for body in bodies {
        let request = Request::post(uri.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .expect("request builds");
        let response = router.clone().oneshot(request).await.expect("route executes");
        assert_restart(&response);
        let payload = read_json_body(response).await;
        assert_eq!(payload["notice"], UNREADABLE_SUBMISSION_NOTICE);
        assert_eq!(payload["state"]["state"], "start");
    }
}

#[tokio::test]
async fn bad_segment_index_redirects_to_start() {
    let router = router();
    let (session_id, token) = start(&router).await;

    for segment in ["9", "0", "nine"] {
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/assessments/{session_id}/segments/{segment}"),
                json!({ "token": token, "answers": {} }),
            ))
            .await
            .expect("route executes");
        assert_restart(&response);
        let payload = read_json_body(response).await;
        assert_eq!(payload["notice"], INVALID_SEGMENT_NOTICE);
        assert_eq!(payload["state"]["state"], "start");
    }
}

#[tokio::test]
async fn missing_token_redirects_to_start() {
    let router = router();
    let (session_id, _) = start(&router).await;

    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/assessments/{session_id}/segments/1")))
        .await
        .expect("route executes");
    assert_restart(&response);
    let payload = read_json_body(response).await;
    assert_eq!(payload["notice"], INVALID_TOKEN_NOTICE);
}

#[tokio::test]
async fn show_segment_handler_restarts_unknown_sessions() {
    let (wizard, _, _) = build_wizard();
    let response = show_segment_handler::<InMemorySessionStore, MemoryExport>(
        State(Arc::new(wizard)),
        Path(("missing".to_string(), "1".to_string())),
        Query(TokenQuery {
            token: "abc".to_string(),
        }),
    )
    .await;
    assert_restart(&response);
}

#[tokio::test]
async fn report_route_returns_attachment() {
    let router = router();
    let (session_id, mut token) = start(&router).await;

    for segment in 1..=8u8 {
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/assessments/{session_id}/segments/{segment}"),
                json!({ "token": token, "answers": zero_answers(segment) }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        token = read_json_body(response).await["token"]
            .as_str()
            .expect("token")
            .to_string();
    }

    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/v1/assessments/{session_id}/results?token={token}"
        )))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let results = read_json_body(response).await;
    assert_eq!(results["summary"]["total_score"], 0);
    assert_eq!(results["summary"]["classification"]["level"], "Low Risk (Level 1)");

    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/assessments/{session_id}/report-token")))
        .await
        .expect("route executes");
    let report_token = read_json_body(response).await["token"]
        .as_str()
        .expect("token")
        .to_string();

    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/v1/assessments/{session_id}/report?token={report_token}"
        )))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .expect("attachment header")
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"risk_assessment_"));
}

#[tokio::test]
async fn notes_and_navigation_routes() {
    let router = router();
    let (session_id, _) = start(&router).await;

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/assessments/{session_id}/notes"),
            json!({ "notes": "Follow up with family." }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["status"], "saved");

    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/v1/assessments/{session_id}/navigate/segment_1"
        )))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["target"], "segment");
    assert_eq!(payload["segment"], 1);

    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/v1/assessments/{session_id}/navigate/results"
        )))
        .await
        .expect("route executes");
    assert_restart(&response);
}
