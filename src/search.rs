//! Hybrid query engine: fuses lexical and vector result sets into one
//! ranked, deduplicated, enriched answer.
//!
//! # Algorithm
//!
//! 1. If a vector backend is present, embed the query (bounded by the
//!    embedding timeout) and fetch `limit * overfetch` vector
//!    candidates; an embedding failure empties this set, it never
//!    fails the query.
//! 2. Fetch `limit * overfetch` lexical candidates with the same
//!    filters.
//! 3. Merge by content key: `combined = lexical * w_lex + vector *
//!    w_vec`, with an absent path contributing zero. A key in both
//!    sets is `hybrid`.
//! 4. Sort by combined score descending; ties prefer hybrid over
//!    single-source, then `content_id` ascending.
//! 5. Truncate to `limit` and enrich through the record store;
//!    candidates whose record has since been deleted drop out, so the
//!    final list may be shorter than `limit`.
//!
//! A storage failure on one retrieval path degrades the query to the
//! surviving path; only both paths failing is surfaced.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lexical::{LexicalIndex, LexicalMatch};
use crate::models::{ContentType, ScoreBreakdown, SearchHit, SearchResult};
use crate::records::RecordStore;
use crate::vector::{VectorBackend, VectorMatch};

/// All inputs for a single search invocation.
///
/// Weights must be finite and non-negative; they need not sum to 1.
/// With both weights zero every candidate scores zero and the order is
/// the deterministic tie-break alone.
#[derive(Debug, Clone)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    pub project_id: Option<i64>,
    pub content_types: Option<&'a [ContentType]>,
    pub limit: usize,
    pub lexical_weight: f64,
    pub vector_weight: f64,
}

pub struct QueryEngine {
    lexical: LexicalIndex,
    vector: Option<Arc<VectorBackend>>,
    overfetch_factor: usize,
}

impl QueryEngine {
    pub fn new(
        lexical: LexicalIndex,
        vector: Option<Arc<VectorBackend>>,
        overfetch_factor: usize,
    ) -> Self {
        Self {
            lexical,
            vector,
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    pub async fn search(
        &self,
        records: &dyn RecordStore,
        req: &QueryRequest<'_>,
    ) -> Result<Vec<SearchHit>> {
        validate_weights(req)?;

        if req.limit == 0 || req.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let fetch = req.limit.saturating_mul(self.overfetch_factor);

        // None = no vector path this request (no backend, or embedding
        // failed); Some(Err) = the path exists but its storage failed.
        let vector_outcome = match &self.vector {
            Some(backend) => match backend.embed(req.query).await {
                Some(query_vec) => Some(
                    backend
                        .query(&query_vec, req.project_id, req.content_types, fetch)
                        .await,
                ),
                None => None,
            },
            None => None,
        };

        let lexical_outcome = self
            .lexical
            .query(req.query, req.project_id, req.content_types, fetch)
            .await;

        let (lexical_matches, vector_matches) = match (lexical_outcome, vector_outcome) {
            (Ok(lex), Some(Ok(vec))) => (lex, vec),
            (Ok(lex), Some(Err(e))) => {
                warn!(error = %e, "vector query failed; using lexical results only");
                (lex, Vec::new())
            }
            (Ok(lex), None) => (lex, Vec::new()),
            (Err(e), Some(Ok(vec))) => {
                warn!(error = %e, "lexical query failed; using vector results only");
                (Vec::new(), vec)
            }
            (Err(e), _) => return Err(e),
        };

        let mut results = merge_candidates(
            &lexical_matches,
            &vector_matches,
            req.lexical_weight,
            req.vector_weight,
        );
        results.truncate(req.limit);

        // Enrich. A record deleted after indexing drops its candidate
        // rather than returning empty content.
        let mut hits = Vec::with_capacity(results.len());
        for result in results {
            match records.display_info(result.key).await {
                Ok(Some(info)) => hits.push(SearchHit {
                    result,
                    title: info.title,
                    snippet: info.snippet,
                }),
                Ok(None) => {
                    debug!(key = %result.key, "record gone; dropping result");
                }
                Err(e) => {
                    warn!(key = %result.key, error = %e, "enrichment failed; dropping result");
                }
            }
        }

        Ok(hits)
    }
}

fn validate_weights(req: &QueryRequest<'_>) -> Result<()> {
    for (name, weight) in [
        ("lexical_weight", req.lexical_weight),
        ("vector_weight", req.vector_weight),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidRequest(format!(
                "{name} must be a finite value >= 0, got {weight}"
            )));
        }
    }
    Ok(())
}

/// Merge both candidate sets into scored results, sorted and
/// deduplicated by content key but not yet truncated.
pub(crate) fn merge_candidates(
    lexical: &[LexicalMatch],
    vector: &[VectorMatch],
    lexical_weight: f64,
    vector_weight: f64,
) -> Vec<SearchResult> {
    struct Merged {
        project_id: i64,
        lexical: Option<f64>,
        vector: Option<f64>,
    }

    let mut merged: HashMap<crate::models::ContentKey, Merged> = HashMap::new();

    for m in vector {
        merged.insert(
            m.key,
            Merged {
                project_id: m.project_id,
                lexical: None,
                vector: Some(m.similarity),
            },
        );
    }

    for m in lexical {
        merged
            .entry(m.key)
            .and_modify(|entry| entry.lexical = Some(m.score))
            .or_insert(Merged {
                project_id: m.project_id,
                lexical: Some(m.score),
                vector: None,
            });
    }

    let mut results: Vec<SearchResult> = merged
        .into_iter()
        .filter_map(|(key, m)| {
            let breakdown = match (m.lexical, m.vector) {
                (Some(lexical_score), Some(vector_score)) => ScoreBreakdown::Hybrid {
                    lexical_score,
                    vector_score,
                },
                (Some(lexical_score), None) => ScoreBreakdown::Lexical { lexical_score },
                (None, Some(vector_score)) => ScoreBreakdown::Vector { vector_score },
                (None, None) => return None,
            };
            let combined_score = m.lexical.unwrap_or(0.0) * lexical_weight
                + m.vector.unwrap_or(0.0) * vector_weight;
            Some(SearchResult {
                key,
                project_id: m.project_id,
                breakdown,
                combined_score,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.breakdown.rank().cmp(&b.breakdown.rank()))
            .then_with(|| a.key.content_id.cmp(&b.key.content_id))
            .then_with(|| a.key.content_type.as_str().cmp(b.key.content_type.as_str()))
    });

    results
}
