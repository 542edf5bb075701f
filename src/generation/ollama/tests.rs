use super::*;
use crate::conversation::{Message, Role};
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generator_for(server: &MockServer) -> OllamaGenerator {
    let address = server.address();
    let config = OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        timeout_secs: 5,
        ..OllamaConfig::default()
    };
    OllamaGenerator::new(&config, "llama3.2", 0.0).expect("should create generator")
}

fn message(role: Role, content: &str, sequence: u64) -> Message {
    Message {
        role,
        content: content.to_string(),
        sequence,
        created_at: Utc::now(),
    }
}

fn request_with_history() -> GenerationRequest {
    GenerationRequest::new(
        "Cats purr.".to_string(),
        vec![
            message(Role::User, "Hi", 1),
            message(Role::Assistant, "Hello", 2),
        ],
        "What do cats do?",
    )
}

#[test]
fn generator_configuration() {
    let generator = OllamaGenerator::new(&OllamaConfig::default(), "mistral", 0.3)
        .expect("should create generator");
    assert_eq!(generator.model(), "mistral");
    assert_eq!(generator.client().base_url().as_str(), "http://localhost:11434/");
    assert!(generator.describe().contains("mistral"));
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_request_layout() {
    let server = MockServer::start().await;
    let system = format!("{}\n\nCats purr.", crate::generation::SYSTEM_PROMPT);

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.2",
            "stream": false,
            "options": { "temperature": 0.0 },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": "Hi" },
                { "role": "assistant", "content": "Hello" },
                { "role": "user", "content": "What do cats do?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "message": { "role": "assistant", "content": "  Cats purr.\n" },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = tokio::task::spawn_blocking(move || generator.generate(&request_with_history()))
        .await
        .expect("task should join")
        .expect("should generate");

    assert_eq!(answer, "Cats purr.");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let result = tokio::task::spawn_blocking(move || generator.generate(&request_with_history()))
        .await
        .expect("task should join");

    match result {
        Err(QaError::Generation(message)) => assert!(message.contains("500")),
        other => panic!("expected generation error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_and_empty_responses_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "messages": [{ "role": "system" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "   " }
        })))
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let result = tokio::task::spawn_blocking(move || generator.generate(&request_with_history()))
        .await
        .expect("task should join");
    assert!(matches!(result, Err(QaError::Generation(_))));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let result = tokio::task::spawn_blocking(move || generator.generate(&request_with_history()))
        .await
        .expect("task should join");
    assert!(matches!(result, Err(QaError::Generation(_))));
}
