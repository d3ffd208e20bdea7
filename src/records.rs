//! Record-store collaborators.
//!
//! The engine never owns record content; index entries are a disposable
//! projection of an external record store reached through
//! [`RecordStore`]. Two implementations ship with the crate:
//! [`SqliteRecordStore`] reads the knowledge-store tables (problems,
//! solutions, learnings, changes) that usually share the database file
//! with the indexes, and [`MemoryRecordStore`] backs tests and
//! embedding-free demos.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{ContentKey, ContentType, DisplayInfo, IndexableRecord};

const SNIPPET_CHARS: usize = 200;
const TITLE_CHARS: usize = 100;

/// What the engine needs from the record store: the records to walk on
/// a bulk reindex, and display content for search results.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every indexable record of one content type, with its project and
    /// searchable text.
    async fn iterate_indexable(
        &self,
        content_type: ContentType,
    ) -> anyhow::Result<Vec<IndexableRecord>>;

    /// Title/snippet for one record, or `None` if it no longer exists.
    async fn display_info(&self, key: ContentKey) -> anyhow::Result<Option<DisplayInfo>>;
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ============ SQLite record store ============

/// Read-only adapter over the knowledge-store record tables.
///
/// Problems and changes reach their project through their component;
/// solutions reach it through their problem's component; learnings
/// carry the project id directly.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn iterate_indexable(
        &self,
        content_type: ContentType,
    ) -> anyhow::Result<Vec<IndexableRecord>> {
        let records = match content_type {
            ContentType::Problem => {
                let rows = sqlx::query(
                    r#"
                    SELECT p.id, p.title, p.description, c.project_id
                    FROM problems p JOIN components c ON p.component_id = c.id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?;

                rows.iter()
                    .map(|row| {
                        let title: String = row.get("title");
                        let description: Option<String> = row.get("description");
                        IndexableRecord {
                            content_id: row.get("id"),
                            project_id: row.get("project_id"),
                            searchable_text: join_fields(&[Some(title), description]),
                        }
                    })
                    .collect()
            }
            ContentType::Solution => {
                let rows = sqlx::query(
                    r#"
                    SELECT s.id, s.summary, s.key_insight, c.project_id
                    FROM solutions s
                    JOIN problems p ON s.problem_id = p.id
                    JOIN components c ON p.component_id = c.id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?;

                rows.iter()
                    .map(|row| {
                        let summary: String = row.get("summary");
                        let key_insight: Option<String> = row.get("key_insight");
                        IndexableRecord {
                            content_id: row.get("id"),
                            project_id: row.get("project_id"),
                            searchable_text: join_fields(&[Some(summary), key_insight]),
                        }
                    })
                    .collect()
            }
            ContentType::Learning => {
                let rows =
                    sqlx::query("SELECT id, insight, context, project_id FROM learnings")
                        .fetch_all(&self.pool)
                        .await?;

                rows.iter()
                    .map(|row| {
                        let insight: String = row.get("insight");
                        let context: Option<String> = row.get("context");
                        IndexableRecord {
                            content_id: row.get("id"),
                            project_id: row.get("project_id"),
                            searchable_text: join_fields(&[Some(insight), context]),
                        }
                    })
                    .collect()
            }
            ContentType::Change => {
                let rows = sqlx::query(
                    r#"
                    SELECT ch.id, ch.field_name, ch.old_value, ch.new_value, ch.reason,
                           c.project_id
                    FROM changes ch JOIN components c ON ch.component_id = c.id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?;

                rows.iter()
                    .map(|row| {
                        let field_name: String = row.get("field_name");
                        let old_value: Option<String> = row.get("old_value");
                        let new_value: Option<String> = row.get("new_value");
                        let reason: Option<String> = row.get("reason");
                        IndexableRecord {
                            content_id: row.get("id"),
                            project_id: row.get("project_id"),
                            searchable_text: join_fields(&[
                                Some(field_name),
                                old_value,
                                new_value,
                                reason,
                            ]),
                        }
                    })
                    .collect()
            }
        };

        Ok(records)
    }

    async fn display_info(&self, key: ContentKey) -> anyhow::Result<Option<DisplayInfo>> {
        let info = match key.content_type {
            ContentType::Problem => {
                sqlx::query("SELECT title, description FROM problems WHERE id = ?")
                    .bind(key.content_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(|row| {
                        let title: String = row.get("title");
                        let description: Option<String> = row.get("description");
                        DisplayInfo {
                            title,
                            snippet: truncate_chars(
                                description.as_deref().unwrap_or(""),
                                SNIPPET_CHARS,
                            ),
                        }
                    })
            }
            ContentType::Solution => {
                sqlx::query("SELECT summary, key_insight FROM solutions WHERE id = ?")
                    .bind(key.content_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(|row| {
                        let summary: String = row.get("summary");
                        let key_insight: Option<String> = row.get("key_insight");
                        DisplayInfo {
                            title: summary,
                            snippet: truncate_chars(
                                key_insight.as_deref().unwrap_or(""),
                                SNIPPET_CHARS,
                            ),
                        }
                    })
            }
            ContentType::Learning => {
                sqlx::query("SELECT insight, context FROM learnings WHERE id = ?")
                    .bind(key.content_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(|row| {
                        let insight: String = row.get("insight");
                        let context: Option<String> = row.get("context");
                        DisplayInfo {
                            title: truncate_chars(&insight, TITLE_CHARS),
                            snippet: truncate_chars(
                                context.as_deref().unwrap_or(&insight),
                                SNIPPET_CHARS,
                            ),
                        }
                    })
            }
            ContentType::Change => {
                sqlx::query(
                    "SELECT field_name, old_value, new_value, reason FROM changes WHERE id = ?",
                )
                .bind(key.content_id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| {
                    let field_name: String = row.get("field_name");
                    let old_value: Option<String> = row.get("old_value");
                    let new_value: Option<String> = row.get("new_value");
                    let reason: Option<String> = row.get("reason");
                    DisplayInfo {
                        title: format!(
                            "{}: {} -> {}",
                            field_name,
                            old_value.as_deref().unwrap_or(""),
                            new_value.as_deref().unwrap_or("")
                        ),
                        snippet: truncate_chars(reason.as_deref().unwrap_or(""), SNIPPET_CHARS),
                    }
                })
            }
        };

        Ok(info)
    }
}

fn join_fields(fields: &[Option<String>]) -> String {
    fields
        .iter()
        .filter_map(|f| f.as_deref())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============ In-memory record store ============

struct StoredRecord {
    project_id: i64,
    searchable_text: String,
    title: String,
    snippet: String,
}

/// In-memory [`RecordStore`] for tests and demos.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<ContentKey, StoredRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        key: ContentKey,
        project_id: i64,
        searchable_text: &str,
        title: &str,
        snippet: &str,
    ) {
        let mut records = self.records.write().unwrap();
        records.insert(
            key,
            StoredRecord {
                project_id,
                searchable_text: searchable_text.to_string(),
                title: title.to_string(),
                snippet: snippet.to_string(),
            },
        );
    }

    pub fn remove(&self, key: ContentKey) {
        let mut records = self.records.write().unwrap();
        records.remove(&key);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn iterate_indexable(
        &self,
        content_type: ContentType,
    ) -> anyhow::Result<Vec<IndexableRecord>> {
        let records = self.records.read().unwrap();
        let mut indexable: Vec<IndexableRecord> = records
            .iter()
            .filter(|(key, _)| key.content_type == content_type)
            .map(|(key, rec)| IndexableRecord {
                content_id: key.content_id,
                project_id: rec.project_id,
                searchable_text: rec.searchable_text.clone(),
            })
            .collect();
        indexable.sort_by_key(|r| r.content_id);
        Ok(indexable)
    }

    async fn display_info(&self, key: ContentKey) -> anyhow::Result<Option<DisplayInfo>> {
        let records = self.records.read().unwrap();
        Ok(records.get(&key).map(|rec| DisplayInfo {
            title: rec.title.clone(),
            snippet: rec.snippet.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_fields_skips_missing() {
        assert_eq!(
            join_fields(&[
                Some("token refresh".to_string()),
                None,
                Some("race on renewal".to_string())
            ]),
            "token refresh race on renewal"
        );
        assert_eq!(join_fields(&[None, Some(String::new())]), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 200), "short");
    }
}
