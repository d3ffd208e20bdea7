use sqlx::SqlitePool;

use crate::error::Result;

/// Create the index tables.
///
/// The index tables are namespaced apart from the record tables and may
/// share the database file with them. Idempotent; `recall init` and
/// every service startup run this.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // FTS5 CREATE is not idempotent natively, so check first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='memory_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE memory_fts USING fts5(
                content_type UNINDEXED,
                content_id UNINDEXED,
                project_id UNINDEXED,
                searchable_text
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memory_vectors (
            content_type TEXT NOT NULL,
            content_id INTEGER NOT NULL,
            project_id INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (content_type, content_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Single row recording the model/dimension the vector index was
    // built with; a configured provider that disagrees is rejected at
    // startup.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memory_vector_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            model TEXT NOT NULL,
            dims INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_memory_vectors_project ON memory_vectors(project_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
