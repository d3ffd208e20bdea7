//! Vector index adapter and the startup-probed vector capability.
//!
//! [`VectorBackend`] bundles the embedding provider with the vector
//! table it feeds. The engine holds an `Option<VectorBackend>`: `None`
//! means lexical-only mode for the process lifetime, decided once by
//! [`VectorBackend::probe`] and never re-checked per call.
//!
//! Embeddings are stored as little-endian `f32` BLOBs, one row per
//! content key; queries score candidates by cosine similarity in Rust
//! and return similarities clamped to `[0, 1]` (higher = more
//! relevant). Exact nearest-neighbor over a table scan is plenty at
//! personal-knowledge-store scale and keeps the storage free of native
//! extensions.

use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::embedding::{
    self, blob_to_vec, cosine_similarity, create_provider, vec_to_blob, EmbeddingProvider,
};
use crate::error::{Error, Result};
use crate::models::{ContentKey, ContentType};

/// Generous bound for the one-off startup probe; the first call may
/// pull a model into memory.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// One vector match: key, owning project, and a cosine similarity in
/// `[0, 1]` (higher = more relevant).
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub key: ContentKey,
    pub project_id: i64,
    pub similarity: f64,
}

pub struct VectorBackend {
    pool: SqlitePool,
    provider: Box<dyn EmbeddingProvider>,
    dims: usize,
    timeout: Duration,
}

impl VectorBackend {
    /// Decide vector availability once at startup.
    ///
    /// Returns `Ok(None)` when no provider is configured or the
    /// configured provider does not answer a probe embedding (logged,
    /// lexical-only mode). Returns `Err(Error::Config)` when the
    /// provider answers with a vector whose dimension disagrees with
    /// the configuration or with a previously built index.
    pub async fn probe(pool: &SqlitePool, config: &EmbeddingConfig) -> Result<Option<Self>> {
        let Some(provider) = create_provider(config).map_err(|e| Error::Config(e.to_string()))?
        else {
            return Ok(None);
        };

        match tokio::time::timeout(
            PROBE_TIMEOUT,
            embedding::embed_one(provider.as_ref(), "vector search availability probe"),
        )
        .await
        {
            Ok(Ok(vec)) => {
                if vec.len() != provider.dims() {
                    return Err(Error::Config(format!(
                        "embedding model '{}' produces {}-dimension vectors but embedding.dims is {}",
                        provider.model_name(),
                        vec.len(),
                        provider.dims()
                    )));
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "embedding provider unavailable; running lexical-only");
                return Ok(None);
            }
            Err(_) => {
                warn!("embedding provider probe timed out; running lexical-only");
                return Ok(None);
            }
        }

        let backend = Self::new(
            pool.clone(),
            provider,
            Duration::from_millis(config.timeout_ms),
        )
        .await?;
        Ok(Some(backend))
    }

    /// Construct a backend around an already-validated provider.
    ///
    /// Checks the provider's dimension against `memory_vector_meta` and
    /// records it on first use. A dimension mismatch with an existing
    /// index is a configuration error; a model change at the same
    /// dimension is tolerated with a warning.
    pub async fn new(
        pool: SqlitePool,
        provider: Box<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let dims = provider.dims();

        let meta = sqlx::query("SELECT model, dims FROM memory_vector_meta WHERE id = 1")
            .fetch_optional(&pool)
            .await?;

        match meta {
            Some(row) => {
                let stored_dims: i64 = row.get("dims");
                let stored_model: String = row.get("model");
                if stored_dims as usize != dims {
                    return Err(Error::Config(format!(
                        "vector index was built with {}-dimension embeddings (model '{}') \
                         but provider '{}' produces {}",
                        stored_dims,
                        stored_model,
                        provider.model_name(),
                        dims
                    )));
                }
                if stored_model != provider.model_name() {
                    warn!(
                        stored = %stored_model,
                        current = %provider.model_name(),
                        "embedding model changed; similarity scores are inconsistent until a reindex"
                    );
                    sqlx::query("UPDATE memory_vector_meta SET model = ? WHERE id = 1")
                        .bind(provider.model_name())
                        .execute(&pool)
                        .await?;
                }
            }
            None => {
                sqlx::query("INSERT INTO memory_vector_meta (id, model, dims) VALUES (1, ?, ?)")
                    .bind(provider.model_name())
                    .bind(dims as i64)
                    .execute(&pool)
                    .await?;
            }
        }

        Ok(Self {
            pool,
            provider,
            dims,
            timeout,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed one text within the per-call budget.
    ///
    /// Any failure (provider error, timeout, dimension drift) returns
    /// `None` and is logged; the caller degrades that operation to the
    /// lexical path.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(
            self.timeout,
            embedding::embed_one(self.provider.as_ref(), text),
        )
        .await
        {
            Ok(Ok(vec)) if vec.len() == self.dims => Some(vec),
            Ok(Ok(vec)) => {
                warn!(
                    expected = self.dims,
                    got = vec.len(),
                    "embedding dimension drifted; skipping vector path"
                );
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "embedding failed; skipping vector path");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "embedding timed out; skipping vector path"
                );
                None
            }
        }
    }

    /// Replace any existing vector for `key`.
    pub async fn upsert(&self, key: ContentKey, project_id: i64, vector: &[f32]) -> Result<()> {
        let blob = vec_to_blob(vector);
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM memory_vectors WHERE content_type = ? AND content_id = ?")
            .bind(key.content_type.as_str())
            .bind(key.content_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO memory_vectors (content_type, content_id, project_id, embedding)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(key.content_type.as_str())
        .bind(key.content_id)
        .bind(project_id)
        .bind(&blob)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete the vector for `key`. Deleting an absent key is a no-op.
    pub async fn delete(&self, key: ContentKey) -> Result<()> {
        sqlx::query("DELETE FROM memory_vectors WHERE content_type = ? AND content_id = ?")
            .bind(key.content_type.as_str())
            .bind(key.content_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Nearest-neighbor query with optional project and content-type
    /// filters. Results are sorted by similarity descending (ties by
    /// `content_id` ascending) and truncated to `limit`.
    pub async fn query(
        &self,
        query_vec: &[f32],
        project_id: Option<i64>,
        content_types: Option<&[ContentType]>,
        limit: usize,
    ) -> Result<Vec<VectorMatch>> {
        let mut sql = String::from(
            "SELECT content_type, content_id, project_id, embedding FROM memory_vectors",
        );
        let mut clauses: Vec<String> = Vec::new();
        if project_id.is_some() {
            clauses.push("project_id = ?".to_string());
        }
        if let Some(types) = content_types {
            let placeholders = vec!["?"; types.len()].join(",");
            clauses.push(format!("content_type IN ({placeholders})"));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut query = sqlx::query(&sql);
        if let Some(pid) = project_id {
            query = query.bind(pid);
        }
        if let Some(types) = content_types {
            for ct in types {
                query = query.bind(ct.as_str());
            }
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut matches: Vec<VectorMatch> = rows
            .iter()
            .filter_map(|row| {
                let content_type: String = row.get("content_type");
                let content_type = content_type.parse::<ContentType>().ok()?;
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let similarity =
                    f64::from(cosine_similarity(query_vec, &stored)).clamp(0.0, 1.0);
                Some(VectorMatch {
                    key: ContentKey::new(content_type, row.get("content_id")),
                    project_id: row.get("project_id"),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.content_id.cmp(&b.key.content_id))
        });
        matches.truncate(limit);

        Ok(matches)
    }
}
