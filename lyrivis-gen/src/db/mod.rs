//! Database access for lyrivis-gen

pub mod images;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to the shared lyrivis.db in the root folder, creating it
/// when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize lyrivis-gen specific tables
///
/// Creates the lyric_images dedup index if it doesn't exist. The table is
/// append-only: rows are never updated or deleted by this service.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lyric_images (
            image_id TEXT PRIMARY KEY,
            words_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_lyric_images_words_hash ON lyric_images(words_hash)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (lyric_images)");

    Ok(())
}
