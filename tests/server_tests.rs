mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::{ScriptedModel, context_with};
use deepresearch_rs::ResearchEvent;
use deepresearch_rs::server::{AppState, build_router};
use deepresearch_rs::stream::decode_all;
use serde_json::Value;
use tower::ServiceExt;

fn app() -> axum::Router {
    let context = context_with(Arc::new(ScriptedModel::default()));
    build_router(AppState::new(context).unwrap())
}

fn post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_deep_research_rejects_invalid_json() {
    let response = app()
        .oneshot(post("/api/deep-research", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_deep_research_requires_query() {
    for body in [r#"{"query":"   "}"#, r#"{"query":42}"#, "{}"] {
        let response = app().oneshot(post("/api/deep-research", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(json_body(response).await["error"], "Query is required");
    }
}

#[tokio::test]
async fn test_person_images_requires_query() {
    let response = app()
        .oneshot(post("/api/person-images", r#"{"query":""}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["error"], "Query is required");
}

#[tokio::test]
async fn test_deep_research_streams_ndjson() {
    let response = app()
        .oneshot(post(
            "/api/deep-research",
            r#"{"query":"Ada Lovelace","locale":"ja"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.ends_with(b"\n"));

    let events: Vec<ResearchEvent> = decode_all(&bytes)
        .into_iter()
        .map(Result::unwrap)
        .collect();
    let kinds: Vec<_> = events.iter().map(ResearchEvent::kind).collect();

    assert_eq!(kinds.first(), Some(&"status"));
    assert_eq!(kinds.last(), Some(&"done"));
    assert_eq!(kinds.iter().filter(|k| **k == "search").count(), 4);
    assert_eq!(kinds.iter().filter(|k| **k == "final").count(), 1);
}

#[tokio::test]
async fn test_person_search_requires_full_name() {
    for body in [r#"{"fullName":"  "}"#, r#"{"company":"Acme"}"#, r#"{"fullName":7}"#] {
        let response = app().oneshot(post("/api/person-search", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(json_body(response).await["error"], "Full name is required");
    }

    let response = app()
        .oneshot(post("/api/person-search", "not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_person_search_without_serpapi_returns_links() {
    let response = app()
        .oneshot(post(
            "/api/person-search",
            r#"{"fullName":"Ada Lovelace","company":"Analytical Engine","position":""}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["provider"], "links");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 16);
    assert_eq!(results[0]["title"], "Google 検索");
    assert_eq!(results[0]["query"], "\"Ada Lovelace\" \"Analytical Engine\"");
    assert!(results[0]["thumbnail"].is_null());
    assert!(results[0].get("snippet").is_none());
}

#[tokio::test]
async fn test_dropping_unread_stream_cancels_run() {
    let model = Arc::new(ScriptedModel {
        hang_plan: true,
        ..Default::default()
    });
    let router = build_router(AppState::new(context_with(model.clone())).unwrap());

    let response = router
        .oneshot(post("/api/deep-research", r#"{"query":"Ada Lovelace"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    model.started.notified().await;
    drop(response);

    // 计划超时为5秒，1秒内放弃说明取消来自响应体被丢弃
    for _ in 0..100 {
        if model.abandoned() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(model.abandoned(), 1);
    assert_eq!(model.prompts().len(), 1);
}
