//! End-to-end tests driving [`SearchService`] against a temp-file
//! SQLite database, with a deterministic in-process embedding provider
//! standing in for a real model.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use recall::config::RetrievalConfig;
use recall::embedding::EmbeddingProvider;
use recall::records::MemoryRecordStore;
use recall::vector::VectorBackend;
use recall::{db, migrate, ContentKey, ContentType, Error, SearchOptions, SearchService};

const DIMS: usize = 32;

/// Deterministic bag-of-words embedder: each token increments a hashed
/// bucket and the vector is L2-normalized, so identical texts embed
/// identically and disjoint texts are (near-)orthogonal.
struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for token in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() % DIMS as u64) as usize] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

struct Harness {
    _tmp: TempDir,
    service: SearchService,
    records: Arc<MemoryRecordStore>,
}

async fn setup(with_vectors: bool) -> Harness {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("recall.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let vector = if with_vectors {
        let backend = VectorBackend::new(
            pool.clone(),
            Box::new(HashEmbedder),
            Duration::from_millis(400),
        )
        .await
        .unwrap();
        Some(Arc::new(backend))
    } else {
        None
    };

    let records = Arc::new(MemoryRecordStore::new());
    let service = SearchService::assemble(
        pool,
        records.clone(),
        vector,
        RetrievalConfig::default(),
    );

    Harness {
        _tmp: tmp,
        service,
        records,
    }
}

/// Create the record and mirror it into the indexes, the way the record
/// store's CRUD layer would.
async fn add(h: &Harness, ct: ContentType, id: i64, project: i64, text: &str, title: &str) {
    h.records
        .insert(ContentKey::new(ct, id), project, text, title, text);
    h.service
        .index_content(ct, id, project, text)
        .await
        .unwrap();
}

fn lexical_only() -> SearchOptions {
    SearchOptions {
        lexical_weight: Some(1.0),
        vector_weight: Some(0.0),
        ..SearchOptions::default()
    }
}

#[tokio::test]
async fn index_search_remove_round_trip() {
    let h = setup(false).await;
    add(
        &h,
        ContentType::Problem,
        1,
        1,
        "token expiration too short",
        "Token expiration too short",
    )
    .await;

    let hits = h
        .service
        .search("token expiration", &lexical_only())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        hits[0].result.key,
        ContentKey::new(ContentType::Problem, 1)
    );
    assert_eq!(hits[0].result.breakdown.source(), "lexical");
    assert_eq!(hits[0].title, "Token expiration too short");
    assert!(hits[0].result.combined_score > 0.0);

    h.service
        .remove_from_index(ContentType::Problem, 1)
        .await
        .unwrap();

    let hits = h
        .service
        .search("token expiration", &lexical_only())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn removing_an_absent_key_is_a_no_op() {
    let h = setup(false).await;
    h.service
        .remove_from_index(ContentType::Solution, 99)
        .await
        .unwrap();
    h.service
        .remove_from_index(ContentType::Solution, 99)
        .await
        .unwrap();
}

#[tokio::test]
async fn reindexing_a_key_replaces_its_old_text() {
    let h = setup(false).await;
    add(
        &h,
        ContentType::Learning,
        1,
        1,
        "alpha retry loop",
        "Alpha",
    )
    .await;
    add(
        &h,
        ContentType::Learning,
        1,
        1,
        "gamma backoff policy",
        "Gamma",
    )
    .await;

    let stale = h.service.search("alpha", &lexical_only()).await.unwrap();
    assert!(stale.is_empty(), "old text must not match after re-index");

    let fresh = h.service.search("gamma", &lexical_only()).await.unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].title, "Gamma");
}

#[tokio::test]
async fn reindexing_keeps_one_entry_per_index() {
    let h = setup(true).await;
    add(&h, ContentType::Problem, 1, 1, "first version", "P1").await;
    add(&h, ContentType::Problem, 1, 1, "second version", "P1").await;

    let status = h.service.status().await.unwrap();
    assert_eq!(status.lexical_entries, 1);
    assert_eq!(status.vector_entries, 1);
    assert!(status.vector_available);
}

#[tokio::test]
async fn search_works_without_a_vector_backend() {
    let h = setup(false).await;
    add(
        &h,
        ContentType::Problem,
        1,
        1,
        "deadlock in writer queue",
        "Deadlock",
    )
    .await;

    // Default weights leave the vector weight non-zero; the absent
    // path must contribute nothing and never raise.
    let hits = h
        .service
        .search("deadlock", &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].result.breakdown.source(), "lexical");
    assert!(hits[0].result.combined_score > 0.0);
    assert!(!h.service.vector_available());
}

#[tokio::test]
async fn matching_both_paths_yields_hybrid_with_exact_weighted_sum() {
    let h = setup(true).await;
    add(
        &h,
        ContentType::Problem,
        1,
        1,
        "database connection pool exhausted",
        "Pool exhausted",
    )
    .await;

    let opts = SearchOptions {
        lexical_weight: Some(0.4),
        vector_weight: Some(0.6),
        ..SearchOptions::default()
    };
    let hits = h
        .service
        .search("database connection pool exhausted", &opts)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    let r = &hits[0].result;
    assert_eq!(r.breakdown.source(), "hybrid");
    let ls = r.breakdown.lexical_score().unwrap();
    let vs = r.breakdown.vector_score().unwrap();
    assert!((r.combined_score - (ls * 0.4 + vs * 0.6)).abs() < 1e-9);
    // the query is the document text, so the embeddings coincide
    assert!(vs > 0.99);
}

#[tokio::test]
async fn candidates_missed_by_the_lexical_path_carry_the_vector_tag() {
    let h = setup(true).await;
    add(
        &h,
        ContentType::Problem,
        1,
        1,
        "token refresh logic",
        "Refresh",
    )
    .await;
    add(
        &h,
        ContentType::Learning,
        2,
        1,
        "unrelated quantum biscuits",
        "Biscuits",
    )
    .await;

    let hits = h
        .service
        .search("token refresh logic", &SearchOptions::default())
        .await
        .unwrap();

    let refresh = hits
        .iter()
        .find(|hit| hit.result.key.content_id == 1)
        .expect("lexical+vector match present");
    assert_eq!(refresh.result.breakdown.source(), "hybrid");

    // The nearest-neighbor pass returns the other document too, with
    // near-zero similarity and no lexical evidence.
    if let Some(other) = hits.iter().find(|hit| hit.result.key.content_id == 2) {
        assert_eq!(other.result.breakdown.source(), "vector");
        assert!(other.result.combined_score < refresh.result.combined_score);
    }
}

#[tokio::test]
async fn identical_documents_tie_break_on_content_id() {
    let h = setup(true).await;
    // inserted in descending id order to make the tie-break do the work
    add(&h, ContentType::Problem, 2, 1, "flaky timeout in ci", "P2").await;
    add(&h, ContentType::Problem, 1, 1, "flaky timeout in ci", "P1").await;

    let opts = SearchOptions {
        limit: Some(1),
        ..SearchOptions::default()
    };
    let hits = h
        .service
        .search("flaky timeout in ci", &opts)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].result.key.content_id, 1);
}

#[tokio::test]
async fn results_stay_sorted_and_hybrid_outranks_equal_single_source() {
    let h = setup(true).await;
    add(&h, ContentType::Problem, 1, 1, "cache miss storm", "P1").await;
    add(&h, ContentType::Problem, 2, 1, "cache eviction policy", "P2").await;
    add(&h, ContentType::Learning, 3, 1, "warm the cache on boot", "L3").await;

    let hits = h
        .service
        .search("cache eviction", &SearchOptions::default())
        .await
        .unwrap();
    assert!(!hits.is_empty());

    for pair in hits.windows(2) {
        let (a, b) = (&pair[0].result, &pair[1].result);
        assert!(a.combined_score >= b.combined_score);
        if (a.combined_score - b.combined_score).abs() < 1e-12 {
            assert!(
                !(a.breakdown.source() != "hybrid" && b.breakdown.source() == "hybrid"),
                "hybrid result ordered after equal-scored single-source result"
            );
        }
    }
}

#[tokio::test]
async fn deleting_the_record_drops_the_result_at_enrichment() {
    let h = setup(false).await;
    add(
        &h,
        ContentType::Solution,
        1,
        1,
        "pin the compiler version",
        "Pin compiler",
    )
    .await;

    // the record vanishes but the index entry survives (the race the
    // enricher guards against)
    h.records.remove(ContentKey::new(ContentType::Solution, 1));

    let hits = h
        .service
        .search("pin the compiler", &lexical_only())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn filters_restrict_project_and_content_types() {
    let h = setup(false).await;
    add(&h, ContentType::Problem, 1, 1, "login throttling bug", "P1").await;
    add(&h, ContentType::Problem, 2, 2, "login redirect bug", "P2").await;
    add(&h, ContentType::Learning, 3, 1, "login flows need fuzzing", "L3").await;

    let by_project = SearchOptions {
        project_id: Some(1),
        ..lexical_only()
    };
    let hits = h.service.search("login", &by_project).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| hit.result.project_id == 1));

    let by_type = SearchOptions {
        content_types: Some(vec![ContentType::Learning]),
        ..lexical_only()
    };
    let hits = h.service.search("login", &by_type).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        hits[0].result.key.content_type,
        ContentType::Learning
    );
}

#[tokio::test]
async fn reindex_all_backfills_from_the_record_store() {
    let h = setup(true).await;

    // records exist but were never mirrored into the indexes
    h.records.insert(
        ContentKey::new(ContentType::Problem, 1),
        1,
        "orphaned sockets leak handles",
        "P1",
        "orphaned sockets leak handles",
    );
    h.records.insert(
        ContentKey::new(ContentType::Learning, 2),
        1,
        "close sockets in drop",
        "L2",
        "close sockets in drop",
    );
    // nothing searchable: skipped and not counted
    h.records.insert(
        ContentKey::new(ContentType::Change, 3),
        1,
        "   ",
        "C3",
        "",
    );

    let count = h.service.reindex_all().await.unwrap();
    assert_eq!(count, 2);

    let hits = h.service.search("sockets", &lexical_only()).await.unwrap();
    assert_eq!(hits.len(), 2);

    // re-running resumes cleanly and converges on the same state
    let count = h.service.reindex_all().await.unwrap();
    assert_eq!(count, 2);
    let status = h.service.status().await.unwrap();
    assert_eq!(status.lexical_entries, 2);
    assert_eq!(status.vector_entries, 2);
}

#[tokio::test]
async fn empty_queries_and_zero_limit_short_circuit() {
    let h = setup(false).await;
    add(&h, ContentType::Problem, 1, 1, "anything at all", "P1").await;

    assert!(h
        .service
        .search("", &SearchOptions::default())
        .await
        .unwrap()
        .is_empty());
    assert!(h
        .service
        .search("   \t ", &SearchOptions::default())
        .await
        .unwrap()
        .is_empty());

    let zero = SearchOptions {
        limit: Some(0),
        ..SearchOptions::default()
    };
    assert!(h.service.search("anything", &zero).await.unwrap().is_empty());
}

#[tokio::test]
async fn negative_weights_are_an_invalid_request() {
    let h = setup(false).await;
    let opts = SearchOptions {
        lexical_weight: Some(-1.0),
        ..SearchOptions::default()
    };
    let err = h.service.search("anything", &opts).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn empty_text_is_not_indexed() {
    let h = setup(false).await;
    h.service
        .index_content(ContentType::Problem, 1, 1, "  \n\t ")
        .await
        .unwrap();

    let status = h.service.status().await.unwrap();
    assert_eq!(status.lexical_entries, 0);
}
