//! Phrase dedup cache
//!
//! Maps a SHA-256 hash of lyric text to previously generated images so
//! that text rendered once is never sent to the external generator again.
//! Shared by all jobs; append-only, so concurrent access needs no
//! coordination beyond the database itself.

use lyrivis_common::{Error, Result};
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

/// Stable content hash of a phrase, hex-encoded.
///
/// Equal text always maps to the same digest; this is the dedup key for
/// the lifetime of the store.
pub fn phrase_hash(words: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(words.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Uniform random choice among stored records, used to introduce visual
/// variety for repeated phrases
pub fn pick_random(records: &[Uuid]) -> Result<Uuid> {
    records
        .choose(&mut rand::thread_rng())
        .copied()
        .ok_or_else(|| Error::Internal("pick_random called with no records".to_string()))
}

/// Persistent phrase-hash → image-id index backed by the lyric_images
/// table
#[derive(Clone)]
pub struct DedupCache {
    db: SqlitePool,
}

impl DedupCache {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Number of distinct digests among the given set that already have
    /// at least one stored record. A job whose every unique hash is
    /// present is fully cached and bypasses the work queue.
    pub async fn count_distinct_present(&self, hashes: &HashSet<String>) -> Result<usize> {
        crate::db::images::count_distinct_hashes(&self.db, hashes).await
    }

    /// All stored image ids for a hash (possibly empty)
    pub async fn records_for(&self, hash: &str) -> Result<Vec<Uuid>> {
        crate::db::images::images_for_hash(&self.db, hash).await
    }

    /// Append a record. Duplicate inserts for the same hash are allowed
    /// and expected.
    pub async fn insert(&self, image_id: Uuid, hash: &str) -> Result<()> {
        crate::db::images::insert_image(&self.db, image_id, hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_cache() -> DedupCache {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        DedupCache::new(pool)
    }

    #[test]
    fn hash_is_stable_and_distinguishes_text() {
        assert_eq!(phrase_hash("hello world"), phrase_hash("hello world"));
        assert_ne!(phrase_hash("hello world"), phrase_hash("hello worlds"));
        assert_eq!(phrase_hash("hello world").len(), 64);
    }

    #[test]
    fn pick_random_rejects_empty() {
        assert!(pick_random(&[]).is_err());
        let only = Uuid::new_v4();
        assert_eq!(pick_random(&[only]).unwrap(), only);
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let cache = memory_cache().await;
        let hash = phrase_hash("some lyric line");
        assert!(cache.records_for(&hash).await.unwrap().is_empty());

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        cache.insert(a, &hash).await.unwrap();
        cache.insert(b, &hash).await.unwrap();

        let records = cache.records_for(&hash).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.contains(&a));
        assert!(records.contains(&b));
    }

    #[tokio::test]
    async fn count_distinct_present_counts_hashes_not_records() {
        let cache = memory_cache().await;
        let cached = phrase_hash("cached");
        cache.insert(Uuid::new_v4(), &cached).await.unwrap();
        cache.insert(Uuid::new_v4(), &cached).await.unwrap();

        let mut hashes = HashSet::new();
        hashes.insert(cached.clone());
        hashes.insert(phrase_hash("not cached"));

        assert_eq!(cache.count_distinct_present(&hashes).await.unwrap(), 1);

        let empty = HashSet::new();
        assert_eq!(cache.count_distinct_present(&empty).await.unwrap(), 0);
    }
}
