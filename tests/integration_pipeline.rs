#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests of ingest and ask with offline backends

use docqa::QaError;
use docqa::config::{Config, EmbeddingBackendKind, GenerationBackendKind};
use docqa::conversation::{
    ConversationStore, DEFAULT_THREAD_ID, InMemoryConversationStore, Role, SqliteConversationStore,
};
use docqa::document::{Document, load_text_file};
use docqa::embeddings::{ChunkingConfig, HashingEmbedder, chunk_document};
use docqa::generation::{EchoGenerator, GenerationRequest, Generator};
use docqa::service::QaService;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const DOCUMENT: &str = "Cats purr. Dogs bark. Cows moo.";

struct UnavailableGenerator;

impl Generator for UnavailableGenerator {
    fn generate(&self, _request: &GenerationRequest) -> docqa::Result<String> {
        Err(QaError::Generation("model is not loaded".to_string()))
    }

    fn describe(&self) -> String {
        "unavailable".to_string()
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn offline_service(
    generator: Arc<dyn Generator>,
    conversations: Arc<dyn ConversationStore>,
) -> QaService {
    QaService::new(
        Arc::new(HashingEmbedder::new(128).expect("valid dimension")),
        generator,
        conversations,
        ChunkingConfig::new(20, 5).expect("valid chunking"),
        3,
    )
    .expect("should create service")
}

fn offline_config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::load(data_dir).expect("should load defaults");
    config.embedding.backend = EmbeddingBackendKind::Hashing;
    config.embedding.dimension = 128;
    config.generation.backend = GenerationBackendKind::Echo;
    config.chunking = ChunkingConfig::new(20, 5).expect("valid chunking");
    config
}

#[tokio::test]
async fn three_sentence_document_end_to_end() {
    init_test_tracing();

    let document = Document::from_text("animals", DOCUMENT);
    let chunks = chunk_document(&document, &ChunkingConfig::new(20, 5).expect("valid chunking"))
        .expect("should chunk");
    assert_eq!(chunks.len(), 2);

    let service = offline_service(
        Arc::new(EchoGenerator),
        Arc::new(InMemoryConversationStore::new()),
    );
    let report = service.ingest(&document).await.expect("should ingest");
    assert_eq!(report.chunks, 2);

    let answer = service
        .ask("animals-thread", "Which animal says moo?")
        .await
        .expect("should answer");
    assert!(answer.content.contains("Cows moo."));

    let history = service.history("animals-thread").await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "Which animal says moo?");
    assert_eq!(history[1].role, Role::Assistant);
}

#[tokio::test]
async fn ask_before_ingest_appends_nothing() {
    let store = Arc::new(InMemoryConversationStore::new());
    let service = offline_service(Arc::new(EchoGenerator), Arc::clone(&store) as Arc<dyn ConversationStore>);

    let result = service.ask(DEFAULT_THREAD_ID, "Anyone there?").await;
    assert!(matches!(result, Err(QaError::NoDocumentLoaded)));
    assert!(store.history(DEFAULT_THREAD_ID).await.expect("history").is_empty());
}

#[tokio::test]
async fn failing_generator_keeps_history_length() {
    let store = Arc::new(InMemoryConversationStore::new());

    let working = offline_service(Arc::new(EchoGenerator), Arc::clone(&store) as Arc<dyn ConversationStore>);
    working
        .ingest(&Document::from_text("animals", DOCUMENT))
        .await
        .expect("should ingest");
    working
        .ask("t", "Do dogs bark?")
        .await
        .expect("should answer");

    let broken = offline_service(Arc::new(UnavailableGenerator), Arc::clone(&store) as Arc<dyn ConversationStore>);
    broken
        .ingest(&Document::from_text("animals", DOCUMENT))
        .await
        .expect("should ingest");
    let result = broken.ask("t", "Do cats purr?").await;

    assert!(matches!(result, Err(QaError::Generation(_))));
    assert_eq!(store.history("t").await.expect("history").len(), 2);
}

#[tokio::test]
async fn conversations_and_index_survive_restart() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = offline_config(temp_dir.path());

    let source = temp_dir.path().join("animals.txt");
    fs::write(&source, "Cats purr.\x0cDogs bark. Cows moo.").expect("should write document");

    {
        let service = QaService::from_config(&config)
            .await
            .expect("should build service");
        let document = load_text_file(&source, None).expect("should load document");
        assert_eq!(document.id, "animals.txt");
        service.ingest(&document).await.expect("should ingest");
        service
            .ask("resume-me", "What do cats do?")
            .await
            .expect("should answer");
    }

    let service = QaService::from_config(&config)
        .await
        .expect("should rebuild service");
    let stats = service
        .load_persisted_index()
        .await
        .expect("should load index")
        .expect("index persisted");
    assert_eq!(stats.documents, vec!["animals.txt".to_string()]);

    let answer = service
        .ask("resume-me", "And what do cows do?")
        .await
        .expect("should answer");
    assert_eq!(answer.sequence, 4);
    assert!(answer.content.contains("Cows moo."));

    let history = service.history("resume-me").await.expect("history");
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_questions_on_separate_threads() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(
        SqliteConversationStore::open(temp_dir.path())
            .await
            .expect("should open store"),
    );
    let service = Arc::new(offline_service(Arc::new(EchoGenerator), store));
    service
        .ingest(&Document::from_text("animals", DOCUMENT))
        .await
        .expect("should ingest");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let thread_id = format!("thread-{}", i % 4);
                service.ask(&thread_id, "Do cows moo?").await
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("task should join").expect("should answer");
    }

    let threads = service.threads().await.expect("threads");
    assert_eq!(threads.len(), 4);
    for thread_id in threads {
        let history = service.history(&thread_id).await.expect("history");
        assert_eq!(history.len(), 4);
        let sequences: Vec<u64> = history.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }
}
