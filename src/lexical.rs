//! Lexical index adapter over SQLite FTS5.
//!
//! One `memory_fts` row per content key. Re-indexing is delete-then-
//! insert inside a single transaction, never an update in place, so a
//! concurrent query sees the old entry or the new one but no stale
//! partial match.
//!
//! FTS5's BM25 rank is negative with more-relevant rows more negative;
//! the adapter negates it so callers only ever see non-negative scores
//! where higher means more relevant.

use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::{ContentKey, ContentType};

/// One lexical match: key, owning project, and a BM25-derived score
/// (`>= 0`, higher = more relevant).
#[derive(Debug, Clone)]
pub struct LexicalMatch {
    pub key: ContentKey,
    pub project_id: i64,
    pub score: f64,
}

#[derive(Clone)]
pub struct LexicalIndex {
    pool: SqlitePool,
}

impl LexicalIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace any existing entry for `key` with fresh text.
    pub async fn upsert(&self, key: ContentKey, project_id: i64, text: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM memory_fts WHERE content_type = ? AND content_id = ?")
            .bind(key.content_type.as_str())
            .bind(key.content_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO memory_fts (content_type, content_id, project_id, searchable_text)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(key.content_type.as_str())
        .bind(key.content_id)
        .bind(project_id)
        .bind(text)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete the entry for `key`. Deleting an absent key is a no-op.
    pub async fn delete(&self, key: ContentKey) -> Result<()> {
        sqlx::query("DELETE FROM memory_fts WHERE content_type = ? AND content_id = ?")
            .bind(key.content_type.as_str())
            .bind(key.content_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Full-text query with optional project and content-type filters.
    ///
    /// The query text is interpreted as a bag of terms (see
    /// [`fts_match_expr`]); an empty or unpopulated index returns an
    /// empty list, not an error.
    pub async fn query(
        &self,
        text: &str,
        project_id: Option<i64>,
        content_types: Option<&[ContentType]>,
        limit: usize,
    ) -> Result<Vec<LexicalMatch>> {
        let Some(match_expr) = fts_match_expr(text) else {
            return Ok(Vec::new());
        };

        let mut sql = String::from(
            "SELECT content_type, content_id, project_id, bm25(memory_fts) AS score \
             FROM memory_fts WHERE memory_fts MATCH ?",
        );
        if project_id.is_some() {
            sql.push_str(" AND project_id = ?");
        }
        if let Some(types) = content_types {
            let placeholders = vec!["?"; types.len()].join(",");
            sql.push_str(&format!(" AND content_type IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY score LIMIT ?");

        let mut query = sqlx::query(&sql).bind(match_expr);
        if let Some(pid) = project_id {
            query = query.bind(pid);
        }
        if let Some(types) = content_types {
            for ct in types {
                query = query.bind(ct.as_str());
            }
        }
        query = query.bind(limit as i64);

        let rows = query.fetch_all(&self.pool).await?;

        let matches = rows
            .iter()
            .filter_map(|row| {
                let content_type: String = row.get("content_type");
                let content_type = content_type.parse::<ContentType>().ok()?;
                let raw: f64 = row.get("score");
                Some(LexicalMatch {
                    key: ContentKey::new(content_type, row.get("content_id")),
                    project_id: row.get("project_id"),
                    // BM25 is negative-is-better; flip and floor at zero
                    score: (-raw).max(0.0),
                })
            })
            .collect();

        Ok(matches)
    }
}

/// Build an FTS5 MATCH expression from free text.
///
/// The query is split into alphanumeric terms, each term is quoted
/// (making FTS5 operators in user input inert), and terms are OR-ed so
/// partial matches rank instead of requiring the full phrase. Returns
/// `None` when the text contains no searchable terms.
pub(crate) fn fts_match_expr(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_are_quoted_and_ored() {
        assert_eq!(
            fts_match_expr("token expiration").as_deref(),
            Some("\"token\" OR \"expiration\"")
        );
    }

    #[test]
    fn operators_in_user_input_are_inert() {
        // NEAR/AND/OR and punctuation must not reach FTS5 as syntax
        assert_eq!(
            fts_match_expr("a AND b OR c*").as_deref(),
            Some("\"a\" OR \"AND\" OR \"b\" OR \"OR\" OR \"c\"")
        );
        assert_eq!(
            fts_match_expr("\"quoted phrase\"").as_deref(),
            Some("\"quoted\" OR \"phrase\"")
        );
    }

    #[test]
    fn no_terms_means_no_expression() {
        assert_eq!(fts_match_expr(""), None);
        assert_eq!(fts_match_expr("  ... !!! "), None);
    }
}
