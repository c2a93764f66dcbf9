use std::sync::Arc;

use super::*;
use crate::RagError;
use crate::database::PATH_KEY;
use tempfile::TempDir;

fn metadata(path: &str) -> Metadata {
    Metadata::from([(PATH_KEY.to_string(), path.to_string())])
}

fn batch(
    count: usize,
    dimension: usize,
    path: &str,
) -> (Vec<Vec<f32>>, Vec<String>, Vec<Metadata>) {
    let vectors = (0..count)
        .map(|i| {
            let mut v = vec![0.0; dimension];
            v[i % dimension] = 1.0;
            v
        })
        .collect();
    let texts = (0..count).map(|i| format!("{} chunk {}", path, i)).collect();
    let metadatas = (0..count).map(|_| metadata(path)).collect();
    (vectors, texts, metadatas)
}

#[tokio::test]
async fn add_batch_persists_immediately() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    let store = SharedVectorStore::open(&location).await.expect("should open");

    let (vectors, texts, metadatas) = batch(3, 4, "a.txt");
    let added = store
        .add_batch(vectors, texts, metadatas)
        .await
        .expect("add should succeed");
    assert_eq!(added, 3);

    let reopened = SharedVectorStore::open(&location).await.expect("should reopen");
    assert_eq!(reopened.stats().await.entries, 3);
}

#[tokio::test]
async fn failed_add_does_not_touch_disk_or_memory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    let store = SharedVectorStore::open(&location).await.expect("should open");

    let (vectors, texts, metadatas) = batch(2, 4, "a.txt");
    store
        .add_batch(vectors, texts, metadatas)
        .await
        .expect("add should succeed");

    let (vectors, texts, metadatas) = batch(2, 3, "b.txt");
    let result = store.add_batch(vectors, texts, metadatas).await;
    assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));

    assert_eq!(store.stats().await.entries, 2);
    let reopened = SharedVectorStore::open(&location).await.expect("should reopen");
    assert_eq!(reopened.stats().await.entries, 2);
}

#[tokio::test]
async fn save_failure_rolls_back_the_batch() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    // A regular file where the index directory should be makes every save fail
    let location = temp_dir.path().join("blocked");
    std::fs::write(&location, b"").expect("should create blocking file");
    let store = SharedVectorStore {
        location,
        inner: Arc::new(RwLock::new(VectorStore::new())),
    };

    let (vectors, texts, metadatas) = batch(2, 4, "a.txt");
    assert!(store.add_batch(vectors, texts, metadatas).await.is_err());

    let stats = store.stats().await;
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.dimension, None);
}

#[tokio::test]
async fn stats_count_distinct_sources() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = SharedVectorStore::open(temp_dir.path().join("index"))
        .await
        .expect("should open");

    for path in ["a.txt", "b.txt", "a.txt"] {
        let (vectors, texts, metadatas) = batch(2, 4, path);
        store
            .add_batch(vectors, texts, metadatas)
            .await
            .expect("add should succeed");
    }

    assert_eq!(
        store.stats().await,
        IndexStats {
            entries: 6,
            dimension: Some(4),
            sources: 2,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_searches_never_observe_partial_batches() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(
        SharedVectorStore::open(temp_dir.path().join("index"))
            .await
            .expect("should open"),
    );
    const BATCH: usize = 5;

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for round in 0..10 {
                let (vectors, texts, metadatas) = batch(BATCH, 4, &format!("doc{}.txt", round));
                store
                    .add_batch(vectors, texts, metadatas)
                    .await
                    .expect("add should succeed");
            }
        })
    };

    let readers = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let results = store
                        .search(&[1.0, 0.0, 0.0, 0.0], usize::MAX)
                        .await
                        .expect("search should succeed");
                    assert_eq!(results.len() % BATCH, 0, "observed a partial batch");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect::<Vec<_>>();

    writer.await.expect("writer should finish");
    for reader in readers {
        reader.await.expect("reader should finish");
    }
    assert_eq!(store.stats().await.entries, 10 * BATCH);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_all_succeed() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    let store = Arc::new(SharedVectorStore::open(&location).await.expect("should open"));

    let (vectors, texts, metadatas) = batch(2000, 16, "big.txt");
    store
        .add_batch(vectors, texts, metadatas)
        .await
        .expect("add should succeed");

    for _ in 0..5 {
        let saves = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.save().await })
            })
            .collect::<Vec<_>>();
        for save in saves {
            save.await
                .expect("save task should finish")
                .expect("save should succeed");
        }
    }

    assert!(!location.join("index.json.tmp").exists());
    let reopened = SharedVectorStore::open(&location).await.expect("should reopen");
    assert_eq!(reopened.stats().await, store.stats().await);
}

#[tokio::test]
async fn open_reports_corrupt_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    std::fs::create_dir_all(&location).expect("should create dir");
    std::fs::write(VectorStore::index_file(&location), "[]").expect("should write");

    let result = SharedVectorStore::open(&location).await;
    assert!(matches!(result, Err(RagError::CorruptIndex { .. })));
}
