use super::*;
use tempfile::TempDir;

async fn create_test_store() -> (TempDir, SqliteConversationStore) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = SqliteConversationStore::open(temp_dir.path())
        .await
        .expect("should open store");
    (temp_dir, store)
}

#[tokio::test]
async fn exchange_is_stored_in_order() {
    let (_temp_dir, store) = create_test_store().await;

    let (user, assistant) = store
        .append_exchange("t", "What do cats do?", "Cats purr.")
        .await
        .expect("append exchange");
    assert_eq!((user.sequence, assistant.sequence), (1, 2));

    let history = store.history("t").await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "What do cats do?");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Cats purr.");
}

#[tokio::test]
async fn unknown_thread_is_empty() {
    let (_temp_dir, store) = create_test_store().await;
    assert!(store.history("missing").await.expect("history").is_empty());
}

#[tokio::test]
async fn history_survives_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    {
        let store = SqliteConversationStore::open(temp_dir.path())
            .await
            .expect("should open store");
        store
            .append_exchange("resume", "first?", "first.")
            .await
            .expect("append exchange");
        store.database().close().await;
    }

    let store = SqliteConversationStore::open(temp_dir.path())
        .await
        .expect("should reopen store");
    let (user, _) = store
        .append_exchange("resume", "second?", "second.")
        .await
        .expect("append exchange");

    assert_eq!(user.sequence, 3);
    let contents: Vec<String> = store
        .history("resume")
        .await
        .expect("history")
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["first?", "first.", "second?", "second."]);
}

#[tokio::test]
async fn threads_are_isolated_and_sorted() {
    let (_temp_dir, store) = create_test_store().await;

    store
        .append_message("zeta", Role::User, "z")
        .await
        .expect("append");
    store
        .append_message("alpha", Role::User, "a")
        .await
        .expect("append");

    assert_eq!(
        store.threads().await.expect("threads"),
        vec!["alpha".to_string(), "zeta".to_string()]
    );
    assert_eq!(store.history("zeta").await.expect("history").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exchanges_stay_paired() {
    let (_temp_dir, store) = create_test_store().await;
    let store = Arc::new(store);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .append_exchange("shared", &format!("q{}", i), &format!("a{}", i))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("task").expect("append exchange");
    }

    let history = store.history("shared").await.expect("history");
    assert_eq!(history.len(), 20);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[0].content[1..], pair[1].content[1..]);
    }
}
