//! Queries over the lyric_images dedup index
//!
//! Append and read only. Concurrent inserts for the same words_hash are
//! expected when several jobs discover the same new phrase near
//! simultaneously; each insert gets its own image_id row.

use lyrivis_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

/// Insert a dedup record for a freshly generated image
pub async fn insert_image(pool: &SqlitePool, image_id: Uuid, words_hash: &str) -> Result<()> {
    sqlx::query("INSERT INTO lyric_images (image_id, words_hash, created_at) VALUES (?, ?, ?)")
        .bind(image_id.to_string())
        .bind(words_hash)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    Ok(())
}

/// All stored image ids for a phrase hash (possibly empty)
pub async fn images_for_hash(pool: &SqlitePool, words_hash: &str) -> Result<Vec<Uuid>> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT image_id FROM lyric_images WHERE words_hash = ?")
            .bind(words_hash)
            .fetch_all(pool)
            .await?;

    rows.iter()
        .map(|id| {
            Uuid::parse_str(id)
                .map_err(|e| Error::Internal(format!("Corrupt image_id in lyric_images: {}", e)))
        })
        .collect()
}

/// Number of distinct hashes among the given set that have at least one
/// stored record
pub async fn count_distinct_hashes(pool: &SqlitePool, hashes: &HashSet<String>) -> Result<usize> {
    if hashes.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; hashes.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(DISTINCT words_hash) FROM lyric_images WHERE words_hash IN ({})",
        placeholders
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for hash in hashes {
        query = query.bind(hash);
    }

    let count = query.fetch_one(pool).await?;
    Ok(count as usize)
}
