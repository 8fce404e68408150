//! Chat-completions client tests against a local stand-in server

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use pestopia_api::services::{
    extract_recommendation, ChatCompletionsClient, GenerationError, PesticideLookup,
    RecommendationGenerator, TextGenerator,
};

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

const GUIDANCE: &str = "# PEST INFO\nThrips rasp leaf surfaces.\n\n# IPM SOLUTIONS\n- Blue sticky traps.\n\n# CHEMICAL SOLUTIONS\n- Spinosad: rotate modes of action.\nCRITICAL DISCLAIMER: follow the label.\n\n# PREVENTION TIPS\n- Remove weeds.\n";

async fn completions(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    captured.requests.lock().unwrap().push((auth, body));

    Json(json!({
        "id": "chatcmpl-test",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": GUIDANCE },
            "finish_reason": "stop"
        }]
    }))
}

async fn failing() -> (StatusCode, &'static str) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "model overloaded for key sk-live-abc123",
    )
}

async fn no_choices() -> Json<Value> {
    Json(json!({ "choices": [] }))
}

/// Serve `router` on an ephemeral port and return its base URL
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

#[tokio::test]
async fn test_client_posts_prompt_with_bearer_key() {
    let captured = Captured::default();
    let base = serve(
        Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(captured.clone()),
    )
    .await;

    let client = ChatCompletionsClient::new(
        &base,
        "test-model",
        Some("sk-test".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let text = client.generate("Tell me about thrips").await.unwrap();
    assert_eq!(text, GUIDANCE);

    let requests = captured.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Tell me about thrips");
}

#[tokio::test]
async fn test_client_omits_auth_without_key() {
    let captured = Captured::default();
    let base = serve(
        Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(captured.clone()),
    )
    .await;

    let client =
        ChatCompletionsClient::new(&format!("{}/", base), "local", None, Duration::from_secs(5))
            .unwrap();
    client.generate("hi").await.unwrap();

    assert_eq!(captured.requests.lock().unwrap()[0].0, None);
}

#[tokio::test]
async fn test_http_error_is_failure() {
    let base = serve(Router::new().route("/v1/chat/completions", post(failing))).await;
    let client = ChatCompletionsClient::new(&base, "m", None, Duration::from_secs(5)).unwrap();

    match client.generate("hi").await {
        Err(GenerationError::Failed(msg)) => {
            assert!(msg.contains("500"));
            // Upstream body is logged, never returned
            assert!(!msg.contains("model overloaded"));
            assert!(!msg.contains("sk-live-abc123"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_choices_is_failure() {
    let base = serve(Router::new().route("/v1/chat/completions", post(no_choices))).await;
    let client = ChatCompletionsClient::new(&base, "m", None, Duration::from_secs(5)).unwrap();

    assert!(matches!(
        client.generate("hi").await,
        Err(GenerationError::Failed(_))
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_failure() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ChatCompletionsClient::new(
        &format!("http://{}/v1", addr),
        "m",
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    assert!(matches!(
        client.generate("hi").await,
        Err(GenerationError::Failed(_))
    ));
}

#[tokio::test]
async fn test_generator_and_extractor_end_to_end() {
    let captured = Captured::default();
    let base = serve(
        Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(captured.clone()),
    )
    .await;

    let client = ChatCompletionsClient::new(&base, "m", None, Duration::from_secs(5)).unwrap();
    let generator = RecommendationGenerator::new(Arc::new(client), Duration::from_secs(5));

    let text = generator.generate("thrips").await.unwrap();
    let extraction = extract_recommendation("thrips", &text, &PesticideLookup::empty());

    assert!(!extraction.is_degraded());
    assert_eq!(extraction.record.pest_name, "Thrips");
    assert_eq!(extraction.record.chemical_solutions.len(), 1);
    assert_eq!(extraction.record.chemical_solutions[0].pesticide, "Spinosad");

    let prompt = captured.requests.lock().unwrap()[0].1["messages"][0]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(prompt.contains("# CHEMICAL SOLUTIONS"));
    assert!(prompt.contains("\"thrips\""));
}
