use emotion_decoder::UpstreamKind;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{spawn_app, test_config, CountingModel, PNG_B64};

const JOY_REPLY: &str = r#"{"primary_emotion": "joy", "confidence": 91, "intensity": "high",
    "secondary_emotions": ["excitement"], "explanation": "Exclamations and positive words."}"#;

#[tokio::test]
async fn test_health_check() {
    let model = CountingModel::replying(JOY_REPLY);
    let address = spawn_app(test_config(), model.clone()).await;

    let response = reqwest::get(format!("{}/api/health", address)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "GCP Emotion Decoding Chatbot");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_analyze_text() {
    let model = CountingModel::replying(JOY_REPLY);
    let address = spawn_app(test_config(), model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analyze/text", address))
        .json(&json!({ "text": "I feel great and excited!" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["primary_emotion"], "joy");
    assert_eq!(body["confidence"], 91.0);
    assert_eq!(body["intensity"], "high");
    assert_eq!(body["secondary_emotions"], json!(["excitement"]));
    assert_eq!(body["input_type"], "text");
    assert!(body.get("consistency").is_none());
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_missing_fields_never_reach_the_model() {
    let model = CountingModel::replying(JOY_REPLY);
    let address = spawn_app(test_config(), model.clone()).await;
    let client = reqwest::Client::new();

    let cases = [
        ("/api/analyze/text", json!({}), "text"),
        ("/api/analyze/text", json!({ "text": "   " }), "text"),
        ("/api/analyze/image", json!({ "text": "no image here" }), "image"),
        ("/api/analyze/image", json!({ "image": "%%%" }), "image"),
        ("/api/analyze/multimodal", json!({}), "text|image"),
        ("/api/analyze/multimodal", json!({ "text": "", "image": "" }), "text|image"),
    ];

    for (path, payload, field) in cases {
        let response = client
            .post(format!("{}{}", address, path))
            .json(&payload)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path} {payload}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
        assert_eq!(body["field"], field, "{path} {payload}");
    }

    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let model = CountingModel::replying(JOY_REPLY);
    let address = spawn_app(test_config(), model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analyze/text", address))
        .header("Content-Type", "application/json")
        .body("{\"text\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["field"], "body");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_analyze_image_inline() {
    let model = CountingModel::replying(
        r#"{"primary_emotion": "sadness", "confidence": 0.6, "visual_cues": ["tears"]}"#,
    );
    let address = spawn_app(test_config(), model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analyze/image", address))
        .json(&json!({ "image": PNG_B64 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["primary_emotion"], "sadness");
    assert_eq!(body["confidence"], 60.0);
    assert_eq!(body["intensity"], "low");
    assert_eq!(body["visual_cues"], json!(["tears"]));
    assert_eq!(body["input_type"], "image");
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_analyze_multimodal_reports_consistency() {
    let model = CountingModel::replying(
        r#"```json
{"primary_emotion": "joy", "confidence": 77, "text_emotion": "joy",
 "image_emotion": "neutral", "consistency": false, "consistency_score": 35}
```"#,
    );
    let address = spawn_app(test_config(), model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analyze/multimodal", address))
        .json(&json!({ "text": "Got the job!", "image_uri": "gs://photos/me.png" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["input_type"], "multimodal");
    assert_eq!(body["text_emotion"], "joy");
    assert_eq!(body["image_emotion"], "neutral");
    assert_eq!(body["consistency"], false);
    assert_eq!(body["consistency_score"], 35.0);
}

#[tokio::test]
async fn test_multimodal_accepts_text_alone() {
    let model = CountingModel::replying(JOY_REPLY);
    let address = spawn_app(test_config(), model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analyze/multimodal", address))
        .json(&json!({ "text": "Only words today" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_unparseable_reply_still_returns_ok() {
    let model = CountingModel::replying("I'm sorry, I can't help with that.");
    let address = spawn_app(test_config(), model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analyze/text", address))
        .json(&json!({ "text": "whatever" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["primary_emotion"], "unknown");
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["raw_response"], "I'm sorry, I can't help with that.");
}

#[tokio::test]
async fn test_upstream_failures_map_to_5xx() {
    let cases = [
        (UpstreamKind::Timeout, StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
        (UpstreamKind::AccessDenied, StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
        (UpstreamKind::Status(503), StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
    ];

    for (kind, status, code) in cases {
        let model = CountingModel::failing(kind);
        let address = spawn_app(test_config(), model.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/analyze/text", address))
            .json(&json!({ "text": "hello" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), status);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error_code"], code);
        assert!(!body["error"].as_str().unwrap().contains("fake upstream failure"));
        assert_eq!(model.calls(), 1);
    }
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config();
    config.max_body_bytes = 1024;
    let model = CountingModel::replying(JOY_REPLY);
    let address = spawn_app(config, model.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analyze/image", address))
        .json(&json!({ "image": "A".repeat(4096) }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let model = CountingModel::replying(JOY_REPLY);
    let address = spawn_app(test_config(), model).await;

    let response = reqwest::get(format!("{}/api/analyze/audio", address))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error_code"], "NOT_FOUND");
}
