use super::*;
use crate::conversation::{InMemoryConversationStore, Role};
use crate::embeddings::{Chunk, Embedding, HashingEmbedder};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(256).expect("valid dimension"),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(texts)
    }

    fn describe(&self) -> String {
        "counting".to_string()
    }
}

#[derive(Default)]
struct RecordingGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
}

impl Generator for RecordingGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("lock should not be poisoned")
            .push(request.clone());
        Ok(format!("answer to {}", request.question))
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(QaError::Generation("backend unavailable".to_string()))
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

fn build_index(embedder: &dyn Embedder, texts: &[&str]) -> VectorIndex {
    let owned: Vec<String> = texts.iter().map(|t| (*t).to_string()).collect();
    let embeddings = embedder.embed(&owned).expect("should embed");
    let entries = owned
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(position, (text, embedding))| {
            (
                Chunk {
                    text,
                    source_offset: position * 100,
                    source_doc_id: "facts".to_string(),
                    chunk_index: position,
                },
                embedding,
            )
        })
        .collect();
    VectorIndex::build(entries).expect("should build index")
}

const FACTS: [&str; 3] = [
    "Cats purr when they are content.",
    "Dogs bark at the mail carrier.",
    "Cows moo in the green field.",
];

#[tokio::test]
async fn missing_index_fails_before_any_backend_call() {
    let embedder = CountingEmbedder::new();
    let generator = RecordingGenerator::default();
    let store = InMemoryConversationStore::new();
    let engine = AnswerEngine::new(&embedder, &generator, &store);

    let result = engine.answer("t", "What do cats do?", None, 2).await;
    assert!(matches!(result, Err(QaError::NoDocumentLoaded)));

    let empty = VectorIndex::with_dimension(64).expect("valid dimension");
    let result = engine.answer("t", "What do cats do?", Some(&empty), 2).await;
    assert!(matches!(result, Err(QaError::NoDocumentLoaded)));

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(generator.requests.lock().expect("lock").is_empty());
    assert!(store.history("t").await.expect("history").is_empty());
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let embedder = CountingEmbedder::new();
    let generator = RecordingGenerator::default();
    let store = InMemoryConversationStore::new();
    let index = build_index(&embedder, &FACTS);
    let engine = AnswerEngine::new(&embedder, &generator, &store);

    let result = engine.answer("t", "   \n", Some(&index), 2).await;
    assert!(matches!(result, Err(QaError::InvalidConfig(_))));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn answer_appends_exchange_and_uses_best_context() {
    let embedder = CountingEmbedder::new();
    let generator = RecordingGenerator::default();
    let store = InMemoryConversationStore::new();
    let index = build_index(&embedder, &FACTS);
    let engine = AnswerEngine::new(&embedder, &generator, &store);

    let answer = engine
        .answer("t", "Why do cats purr?", Some(&index), 2)
        .await
        .expect("should answer");

    assert_eq!(answer.role, Role::Assistant);
    assert_eq!(answer.content, "answer to Why do cats purr?");
    assert_eq!(answer.sequence, 2);

    let requests = generator.requests.lock().expect("lock");
    let request = &requests[0];
    let context_parts: Vec<&str> = request.context.split(CONTEXT_SEPARATOR).collect();
    assert_eq!(context_parts.len(), 2);
    assert_eq!(context_parts[0], FACTS[0]);
    assert!(request.history.is_empty());

    let history = store.history("t").await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "Why do cats purr?");
    assert_eq!(history[1], answer);
}

#[tokio::test]
async fn prior_history_is_passed_to_generator() {
    let embedder = CountingEmbedder::new();
    let generator = RecordingGenerator::default();
    let store = InMemoryConversationStore::new();
    let index = build_index(&embedder, &FACTS);
    let engine = AnswerEngine::new(&embedder, &generator, &store);

    engine
        .answer("t", "Why do cats purr?", Some(&index), 1)
        .await
        .expect("should answer");
    engine
        .answer("other", "Do dogs bark?", Some(&index), 1)
        .await
        .expect("should answer");
    engine
        .answer("t", "And cows?", Some(&index), 1)
        .await
        .expect("should answer");

    let requests = generator.requests.lock().expect("lock");
    let history: Vec<&str> = requests[2]
        .history
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        history,
        vec!["Why do cats purr?", "answer to Why do cats purr?"]
    );
    assert_eq!(store.history("t").await.expect("history").len(), 4);
}

#[tokio::test]
async fn failed_generation_leaves_history_unchanged() {
    let embedder = CountingEmbedder::new();
    let store = InMemoryConversationStore::new();
    let index = build_index(&embedder, &FACTS);

    let working = RecordingGenerator::default();
    AnswerEngine::new(&embedder, &working, &store)
        .answer("t", "Why do cats purr?", Some(&index), 1)
        .await
        .expect("should answer");

    let engine = AnswerEngine::new(&embedder, &FailingGenerator, &store);
    let result = engine.answer("t", "Do dogs bark?", Some(&index), 1).await;

    assert!(matches!(result, Err(QaError::Generation(_))));
    assert_eq!(store.history("t").await.expect("history").len(), 2);
}

#[tokio::test]
async fn zero_k_is_rejected_without_history_change() {
    let embedder = CountingEmbedder::new();
    let generator = RecordingGenerator::default();
    let store = InMemoryConversationStore::new();
    let index = build_index(&embedder, &FACTS);
    let engine = AnswerEngine::new(&embedder, &generator, &store);

    let result = engine.answer("t", "Why do cats purr?", Some(&index), 0).await;
    assert!(matches!(result, Err(QaError::InvalidConfig(_))));
    assert!(store.history("t").await.expect("history").is_empty());
}

#[test]
fn context_joins_hits_in_order() {
    let hit = |text: &str, score: f32| SearchHit {
        chunk: Chunk {
            text: text.to_string(),
            source_offset: 0,
            source_doc_id: "d".to_string(),
            chunk_index: 0,
        },
        score,
    };

    let context = build_context(&[hit("best", 0.9), hit("second", 0.5)]);
    assert_eq!(context, "best\n\nsecond");
    assert_eq!(build_context(&[]), "");
}
