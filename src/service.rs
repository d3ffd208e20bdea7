//! The service facade the transport layer consumes.
//!
//! [`SearchService`] is constructed explicitly at process start (no
//! lazily initialized globals) and owns the storage pool, the optional
//! vector backend, the record-store handle, and retrieval defaults.
//! Everything the tool surface needs goes through it.

use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::error::Result;
use crate::indexer::Indexer;
use crate::lexical::LexicalIndex;
use crate::migrate;
use crate::models::{ContentKey, ContentType, IndexableDocument, SearchHit};
use crate::records::{RecordStore, SqliteRecordStore};
use crate::search::{QueryEngine, QueryRequest};
use crate::vector::VectorBackend;

/// Per-call search options; unset fields fall back to the configured
/// retrieval defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub project_id: Option<i64>,
    pub content_types: Option<Vec<ContentType>>,
    pub limit: Option<usize>,
    pub lexical_weight: Option<f64>,
    pub vector_weight: Option<f64>,
}

/// Index health snapshot for operator visibility.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub lexical_entries: u64,
    pub vector_entries: u64,
    pub vector_available: bool,
}

pub struct SearchService {
    pool: SqlitePool,
    records: Arc<dyn RecordStore>,
    indexer: Indexer,
    engine: QueryEngine,
    retrieval: RetrievalConfig,
    vector_available: bool,
}

impl SearchService {
    /// Open the database, run migrations, probe the embedding provider
    /// once, and wire the engine against the SQLite record store.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;

        let vector = VectorBackend::probe(&pool, &config.embedding)
            .await?
            .map(Arc::new);
        let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(pool.clone()));

        Ok(Self::assemble(
            pool,
            records,
            vector,
            config.retrieval.clone(),
        ))
    }

    /// Wire a service from injected parts: a custom record store, a
    /// pre-built vector backend (or `None` for lexical-only), and
    /// retrieval defaults. `open` delegates here; tests and embedders
    /// use it directly.
    pub fn assemble(
        pool: SqlitePool,
        records: Arc<dyn RecordStore>,
        vector: Option<Arc<VectorBackend>>,
        retrieval: RetrievalConfig,
    ) -> Self {
        let lexical = LexicalIndex::new(pool.clone());
        let vector_available = vector.is_some();
        let indexer = Indexer::new(lexical.clone(), vector.clone());
        let engine = QueryEngine::new(lexical, vector, retrieval.overfetch_factor);

        Self {
            pool,
            records,
            indexer,
            engine,
            retrieval,
            vector_available,
        }
    }

    /// Whether the vector path is live for this process.
    pub fn vector_available(&self) -> bool {
        self.vector_available
    }

    /// Hybrid search over both indexes, enriched for display.
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchHit>> {
        let req = QueryRequest {
            query,
            project_id: opts.project_id,
            content_types: opts.content_types.as_deref(),
            limit: opts.limit.unwrap_or(self.retrieval.default_limit),
            lexical_weight: opts
                .lexical_weight
                .unwrap_or(self.retrieval.lexical_weight),
            vector_weight: opts.vector_weight.unwrap_or(self.retrieval.vector_weight),
        };
        self.engine.search(self.records.as_ref(), &req).await
    }

    /// Mirror a record create/edit into both indexes.
    pub async fn index_content(
        &self,
        content_type: ContentType,
        content_id: i64,
        project_id: i64,
        text: &str,
    ) -> Result<()> {
        let doc = IndexableDocument {
            key: ContentKey::new(content_type, content_id),
            project_id,
            searchable_text: text.to_string(),
        };
        self.indexer.index(&doc).await
    }

    /// Mirror a record deletion into both indexes. Idempotent.
    pub async fn remove_from_index(
        &self,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<()> {
        self.indexer
            .remove(ContentKey::new(content_type, content_id))
            .await
    }

    /// Bulk backfill from the record store; returns the number of
    /// records indexed.
    pub async fn reindex_all(&self) -> Result<u64> {
        self.indexer.reindex_all(self.records.as_ref()).await
    }

    pub async fn status(&self) -> Result<IndexStatus> {
        let lexical_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_fts")
            .fetch_one(&self.pool)
            .await?;
        let vector_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_vectors")
            .fetch_one(&self.pool)
            .await?;

        Ok(IndexStatus {
            lexical_entries: lexical_entries as u64,
            vector_entries: vector_entries as u64,
            vector_available: self.vector_available,
        })
    }
}
