//! HTTP-level tests against a mock server: preflight, response validation,
//! completion, the downgrade retry, the repair pass and the cache dump.

use std::sync::Once;
use std::time::Duration;

use llm_structured::{
    CallMode, CompletionRequest, Error, LlmClient, ResponseError, Stage,
};
use mockito::{Matcher, Server, ServerGuard};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Point {
    x: i64,
    y: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PointAnswer {
    points: Vec<Point>,
}

fn client(mode: CallMode, server: &ServerGuard) -> LlmClient {
    init_tracing();
    LlmClient::builder()
        .mode(mode)
        .base_url(server.url())
        .api_key("sk-test")
        .model("gemini-2.5-pro")
        .timeout(Duration::from_secs(5))
        .default_shapes()
        .build()
        .unwrap()
}

fn chat_reply(content: &str) -> String {
    json!({"choices": [{"message": {"content": content}}]}).to_string()
}

#[tokio::test]
async fn preflight_succeeds_on_json_models_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/models")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    client.preflight().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn preflight_uses_native_models_url_and_key_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models")
        .match_header("x-goog-api-key", "sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"models": []}"#)
        .create_async()
        .await;

    let client = client(CallMode::GeminiNative, &server);
    client.preflight().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn html_body_fails_as_non_json_not_decode() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/models")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>gateway interstitial</html>")
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let err = client.preflight().await.unwrap_err();
    match err {
        Error::Response(ResponseError::NonJson { snippet, .. }) => {
            assert!(snippet.contains("gateway interstitial"));
        }
        other => panic!("expected NonJson, got: {other}"),
    }
}

#[tokio::test]
async fn empty_json_body_fails_as_empty_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("")
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let err = client.preflight().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Response(ResponseError::EmptyBody { .. })
    ));
}

#[tokio::test]
async fn malformed_json_body_fails_as_decode() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"truncated": "#)
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let err = client.preflight().await.unwrap_err();
    match err {
        Error::Response(ResponseError::Decode { snippet, .. }) => {
            assert!(snippet.contains("truncated"));
        }
        other => panic!("expected Decode, got: {other}"),
    }
}

#[tokio::test]
async fn error_status_carries_decoded_json_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/models")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"message": "key revoked"}}"#)
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let err = client.preflight().await.unwrap_err();
    match err {
        Error::Response(ResponseError::Status { status, body, .. }) => {
            assert_eq!(status, 403);
            assert_eq!(body["error"]["message"], "key revoked");
        }
        other => panic!("expected Status, got: {other}"),
    }
}

#[tokio::test]
async fn complete_parses_fenced_json_from_chat_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJsonString(
            r#"{"temperature": 0, "response_format": {"type": "json_object"}}"#.into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            "Here you go:\n```json\n{\"points\":[{\"x\":3,\"y\":4}]}\n```",
        ))
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click the bird");
    let answer: PointAnswer = client.complete(&request).await.unwrap();
    assert_eq!(answer.points.len(), 1);
    assert_eq!(answer.points[0].x, 3);
    assert_eq!(answer.points[0].y, 4);
    mock.assert_async().await;
}

#[tokio::test]
async fn complete_parses_gemini_native_candidates() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-2.5-pro:generateContent")
        .match_header("x-goog-api-key", "sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"candidates": [{"content": {"parts": [
                {"text": "{\"points\":[{\"x\":7,\"y\":9}]}"}
            ]}}]})
            .to_string(),
        )
        .create_async()
        .await;

    let client = client(CallMode::GeminiNative, &server);
    let request = CompletionRequest::new().with_prompt("click the bird");
    let answer: PointAnswer = client.complete(&request).await.unwrap();
    assert_eq!(answer.points[0].x, 7);
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_response_format_triggers_exactly_one_downgrade_retry() {
    let mut server = Server::new_async().await;
    // Mocks match in declaration order, so the body matcher goes first: it
    // serves while the request still carries the response_format feature.
    let reject_mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJsonString(
            r#"{"response_format": {"type": "json_object"}}"#.into(),
        ))
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "response_format is not supported"}"#)
        .expect(1)
        .create_async()
        .await;
    // Catch-all for the downgraded retry, whose body no longer matches above.
    let retry_mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("{\"points\":[{\"x\":1,\"y\":2}]}"))
        .expect(1)
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click");
    let answer: PointAnswer = client.complete(&request).await.unwrap();
    assert_eq!(answer.points[0].x, 1);

    reject_mock.assert_async().await;
    retry_mock.assert_async().await;
}

#[tokio::test]
async fn persistent_server_error_surfaces_after_single_downgrade_retry() {
    let mut server = Server::new_async().await;
    // Every request fails; after the single downgrade retry the call must
    // surface the error instead of looping.
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "upstream down"}"#)
        .expect(2)
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click");
    let err = client
        .complete_value(&request, &json!({"type": "object"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Response(ResponseError::Status { status: 500, .. })
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn free_text_coordinates_are_salvaged_against_point_schema() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("The point is x=10, y=20 on the image."))
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click");
    let answer: PointAnswer = client.complete(&request).await.unwrap();
    assert_eq!(answer.points[0].x, 10);
    assert_eq!(answer.points[0].y, 20);
}

#[tokio::test]
async fn repair_pass_recovers_when_text_and_salvage_fail() {
    let mut server = Server::new_async().await;
    // The repair request carries the conversion instruction; its matcher is
    // declared first so the catch-all below only sees the primary request.
    let repair_mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Convert the following content".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("{\"points\":[{\"x\":5,\"y\":6}]}"))
        .expect(1)
        .create_async()
        .await;
    // Primary completion: no JSON, no coordinates.
    let primary_mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("I believe the answer involves two birds."))
        .expect(1)
        .create_async()
        .await;

    // No recognizers registered: salvage cannot fire, forcing the repair path.
    init_tracing();
    let client = LlmClient::builder()
        .mode(CallMode::OpenAiCompatible)
        .base_url(server.url())
        .api_key("sk-test")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let request = CompletionRequest::new().with_prompt("click");
    let answer: PointAnswer = client.complete(&request).await.unwrap();
    assert_eq!(answer.points[0].x, 5);

    primary_mock.assert_async().await;
    repair_mock.assert_async().await;
}

#[tokio::test]
async fn repair_exchange_feeds_salvage_and_cache() {
    let mut server = Server::new_async().await;
    // Repair reply: the bracket scan yields a wrong-shaped object, so
    // validation fails and salvage must run over the repaired text, where
    // the coordinates live. The primary text has none.
    let _repair_mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Convert the following content".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("{\"pts\": []} near x=10, y=20"))
        .create_async()
        .await;
    let _primary_mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("free prose, nothing structured"))
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click");
    let answer: PointAnswer = client.complete(&request).await.unwrap();
    assert_eq!(answer.points[0].x, 10);
    assert_eq!(answer.points[0].y, 20);

    // The snapshot holds the repair exchange, not the primary one.
    let dir = std::env::temp_dir().join("llm-structured-http-repair-cache");
    let _ = std::fs::remove_dir_all(&dir);
    let path = dir.join("last.json");
    client.cache_response(&path);
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let text = written["response_text"].as_str().unwrap();
    assert!(text.contains("x=10"));
    assert!(!text.contains("free prose"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unparsable_output_after_repair_fails_with_snippet() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("still nothing structured here"))
        .expect(2)
        .create_async()
        .await;

    init_tracing();
    let client = LlmClient::builder()
        .mode(CallMode::OpenAiCompatible)
        .base_url(server.url())
        .api_key("sk-test")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let request = CompletionRequest::new().with_prompt("click");
    let err = client
        .complete_value(&request, &json!({"type": "object"}))
        .await
        .unwrap_err();
    match err {
        Error::UnparsableOutput { snippet } => {
            assert!(snippet.contains("still nothing structured"));
        }
        other => panic!("expected UnparsableOutput, got: {other}"),
    }
}

#[tokio::test]
async fn wrong_shape_json_falls_back_to_salvage_before_validation_error() {
    let mut server = Server::new_async().await;
    // Bracket scan finds the wrong object first; validation then fails and
    // the schema-aware salvage over the raw text recovers the coordinates.
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            "{\"reasoning\": \"target sits at\"} ... best guess x=10, y=20 done",
        ))
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click");
    let answer: PointAnswer = client.complete(&request).await.unwrap();
    assert_eq!(answer.points[0].x, 10);
}

#[tokio::test]
async fn no_text_in_response_fails_with_no_text_found() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click");
    let err = client
        .complete_value(&request, &json!({"type": "object"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoTextFound { .. }));
}

#[tokio::test]
async fn cache_response_dumps_last_exchange() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("{\"points\":[{\"x\":3,\"y\":4}]}"))
        .create_async()
        .await;

    let client = client(CallMode::OpenAiCompatible, &server);
    let request = CompletionRequest::new().with_prompt("click");
    let _: PointAnswer = client.complete(&request).await.unwrap();

    let dir = std::env::temp_dir().join("llm-structured-http-cache-test");
    let _ = std::fs::remove_dir_all(&dir);
    let path = dir.join("last.json");
    client.cache_response(&path);

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["mode"], "openai");
    assert_eq!(written["model"], "gemini-2.5-pro");
    assert!(written["response_text"]
        .as_str()
        .unwrap()
        .contains("points"));
    assert!(written["response_json"]["choices"].is_array());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn gemini_native_without_model_fails_before_any_request() {
    init_tracing();
    let server = Server::new_async().await;
    let client = LlmClient::builder()
        .mode(CallMode::GeminiNative)
        .base_url(server.url())
        .api_key("sk-test")
        .build()
        .unwrap();
    let err = client
        .complete_value(&CompletionRequest::new(), &json!({"type": "object"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn extraction_stage_names_are_stable() {
    assert_eq!(Stage::Direct.as_str(), "direct");
    assert_eq!(Stage::Salvage.as_str(), "salvage");
    assert_eq!(Stage::Repair.as_str(), "repair");
}
