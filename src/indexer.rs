//! Indexing coordinator: the only path by which index state changes.
//!
//! Both indexes always hold the same key set, or a strict subset on the
//! vector side when embedding is unavailable or fails for a document.
//! Each mutation is a delete-then-insert within one transaction per
//! index, so a concurrent query observes pre- or post-mutation state
//! but never a partially written entry. `index` and `remove` complete
//! before returning; a search immediately after a write sees it.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lexical::LexicalIndex;
use crate::models::{ContentKey, ContentType, IndexableDocument};
use crate::records::RecordStore;
use crate::vector::VectorBackend;

pub struct Indexer {
    lexical: LexicalIndex,
    vector: Option<Arc<VectorBackend>>,
}

impl Indexer {
    pub fn new(lexical: LexicalIndex, vector: Option<Arc<VectorBackend>>) -> Self {
        Self { lexical, vector }
    }

    /// Index one document in both indexes.
    ///
    /// Empty text (after whitespace collapsing) is a no-op, not an
    /// error: a record with nothing to search on need not be indexed.
    /// An embedding failure degrades this document to lexical-only;
    /// storage failures surface to the caller, which owns retry policy.
    pub async fn index(&self, doc: &IndexableDocument) -> Result<()> {
        let text = collapse_whitespace(&doc.searchable_text);
        if text.is_empty() {
            debug!(key = %doc.key, "empty searchable text; nothing to index");
            return Ok(());
        }

        self.lexical.upsert(doc.key, doc.project_id, &text).await?;

        if let Some(vector) = &self.vector {
            match vector.embed(&text).await {
                Some(embedding) => {
                    vector.upsert(doc.key, doc.project_id, &embedding).await?;
                }
                None => {
                    // a vector computed from older text must not outlive it
                    vector.delete(doc.key).await?;
                    warn!(key = %doc.key, "embedding unavailable; indexed lexical-only");
                }
            }
        }

        Ok(())
    }

    /// Remove a key from both indexes. Idempotent; removing an absent
    /// key succeeds.
    pub async fn remove(&self, key: ContentKey) -> Result<()> {
        self.lexical.delete(key).await?;
        if let Some(vector) = &self.vector {
            vector.delete(key).await?;
        }
        Ok(())
    }

    /// Re-submit every indexable record through [`Indexer::index`].
    ///
    /// Used for bulk backfill, e.g. after enabling vector search on an
    /// existing dataset. Non-transactional: a failure partway leaves
    /// the work done so far in place, and re-running resumes it.
    /// Returns the number of records with indexable text.
    pub async fn reindex_all(&self, records: &dyn RecordStore) -> Result<u64> {
        let mut count = 0u64;

        for content_type in ContentType::ALL {
            let indexable = records
                .iterate_indexable(content_type)
                .await
                .map_err(Error::Records)?;

            for record in indexable {
                let doc = IndexableDocument {
                    key: ContentKey::new(content_type, record.content_id),
                    project_id: record.project_id,
                    searchable_text: record.searchable_text,
                };
                if collapse_whitespace(&doc.searchable_text).is_empty() {
                    continue;
                }
                self.index(&doc).await?;
                count += 1;
            }
        }

        Ok(count)
    }
}

/// Collapse whitespace runs to single spaces and trim; the only text
/// normalization the indexing layer guarantees.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
