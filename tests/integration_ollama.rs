#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use docqa::config::{Config, EmbeddingBackendKind, GenerationBackendKind, OllamaConfig};
use docqa::database::VectorIndex;
use docqa::document::Document;
use docqa::embeddings::{Chunk, Embedder, OllamaEmbedder};
use docqa::ollama::OllamaClient;
use docqa::service::QaService;
use std::env;
use std::time::Duration;
use tempfile::TempDir;
use tracing::info;

const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_CHAT_MODEL: &str = "llama3.2";

fn ollama_config() -> OllamaConfig {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(11434);

    OllamaConfig {
        host,
        port,
        timeout_secs: 120,
        ..OllamaConfig::default()
    }
}

fn embedding_model() -> String {
    env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string())
}

fn chat_model() -> String {
    env::var("OLLAMA_CHAT_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string())
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = OllamaClient::new(&ollama_config())
        .expect("should create client")
        .with_timeout(Duration::from_secs(10));

    let embedding = embedding_model();
    let chat = chat_model();
    client
        .health_check(&[embedding.as_str(), chat.as_str()])
        .expect("Ollama should be reachable with both models pulled");

    let models = client.list_models().expect("should list models");
    info!("Ollama reports {} models", models.len());
    assert!(!models.is_empty());
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_embeddings_are_consistent() {
    init_test_tracing();

    let embedder =
        OllamaEmbedder::new(&ollama_config(), &embedding_model(), 4).expect("should create embedder");

    let texts: Vec<String> = ["Cats purr.", "Dogs bark.", "Cows moo.", "Birds sing.", "Fish swim."]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    let embeddings = embedder.embed(&texts).expect("should embed");
    assert_eq!(embeddings.len(), texts.len());

    let query = embedder.embed_query("Cats purr.").expect("should embed query");
    assert_eq!(query.len(), embeddings[0].len());

    let entries = texts
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(position, (text, embedding))| {
            let chunk = Chunk {
                text: text.clone(),
                source_offset: 0,
                source_doc_id: "animals".to_string(),
                chunk_index: position,
            };
            (chunk, embedding)
        })
        .collect();
    let index = VectorIndex::build(entries).expect("should build index");
    let hits = index.search(&query, 1).expect("should search");
    assert_eq!(hits[0].chunk.text, "Cats purr.");
    assert!(hits[0].score > 0.99, "same text should embed identically, got {}", hits[0].score);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_question_answering() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.ollama = ollama_config();
    config.embedding.backend = EmbeddingBackendKind::Ollama;
    config.embedding.model = embedding_model();
    config.generation.backend = GenerationBackendKind::Ollama;
    config.generation.model = chat_model();
    config.chunking.chunk_size = 120;
    config.chunking.overlap = 20;

    let service = QaService::from_config(&config)
        .await
        .expect("should build service");
    service
        .ingest(&Document::from_text(
            "tower",
            "The Eiffel Tower is in Paris. It was completed in 1889 for the World's Fair. \
             It is about 330 metres tall.",
        ))
        .await
        .expect("should ingest");

    let answer = service
        .ask("tower", "When was the Eiffel Tower completed?")
        .await
        .expect("should answer");
    info!("Answer: {}", answer.content);
    assert!(answer.content.contains("1889"));
}
