//! Digest → tags index backing the `digest_tags` policy.
//!
//! The [`DigestIndex`] trait abstracts the external key-value store. The
//! SQLite implementation opens the annotation database read-only once per
//! worker; [`InMemoryDigestIndex`] serves tests and embedders that already
//! hold the mapping in memory.
//!
//! Writers (`wss init`, `wss annotate`) go through [`add_tags`] on a normal
//! read-write pool instead.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::db;

/// Read-only lookup of tags by exact digest value.
#[async_trait]
pub trait DigestIndex: Send + Sync {
    /// Tags stored for `digest`, in insertion order. Unknown digests yield
    /// an empty list.
    async fn tags_for_digest(&self, digest: &str) -> Result<Vec<String>>;

    /// Release the underlying handle. Called once at worker shutdown.
    async fn close(&self) -> Result<()>;
}

/// SQLite implementation over the `digest_tags` table.
pub struct SqliteDigestIndex {
    pool: SqlitePool,
}

impl SqliteDigestIndex {
    /// Open an existing annotation database. Fails if the file is missing
    /// or does not carry the expected schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect_read_only(path).await?;

        let has_table: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='digest_tags'",
        )
        .fetch_one(&pool)
        .await?;
        if !has_table {
            pool.close().await;
            anyhow::bail!(
                "Annotation database {} has no digest_tags table. Run `wss init` first.",
                path.display()
            );
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl DigestIndex for SqliteDigestIndex {
    async fn tags_for_digest(&self, digest: &str) -> Result<Vec<String>> {
        let tags: Vec<String> =
            sqlx::query_scalar("SELECT tag FROM digest_tags WHERE digest = ? ORDER BY rowid")
                .bind(digest)
                .fetch_all(&self.pool)
                .await?;
        Ok(tags)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// In-memory index for tests.
pub struct InMemoryDigestIndex {
    tags: RwLock<HashMap<String, Vec<String>>>,
    closes: AtomicUsize,
}

impl InMemoryDigestIndex {
    pub fn new() -> Self {
        Self {
            tags: RwLock::new(HashMap::new()),
            closes: AtomicUsize::new(0),
        }
    }

    /// Adds `tag` for `digest`. A lock poisoned by a panicking writer is
    /// recovered rather than propagated.
    pub fn insert(&self, digest: &str, tag: &str) {
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);
        let entry = tags.entry(digest.to_string()).or_default();
        if !entry.iter().any(|t| t == tag) {
            entry.push(tag.to_string());
        }
    }

    /// Number of times [`DigestIndex::close`] has been called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryDigestIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DigestIndex for InMemoryDigestIndex {
    async fn tags_for_digest(&self, digest: &str) -> Result<Vec<String>> {
        let tags = self.tags.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tags.get(digest).cloned().unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store tags for a digest. Existing (digest, tag) pairs are left as-is.
///
/// Returns how many new pairs were written.
pub async fn add_tags(pool: &SqlitePool, digest: &str, tags: &[String]) -> Result<u64> {
    let now = chrono::Utc::now().timestamp();
    let mut written = 0u64;
    let mut tx = pool.begin().await?;
    for tag in tags {
        let result = sqlx::query(
            "INSERT INTO digest_tags (digest, tag, created_at) VALUES (?, ?, ?) ON CONFLICT(digest, tag) DO NOTHING",
        )
        .bind(digest)
        .bind(tag)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }
    tx.commit().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use tempfile::TempDir;

    #[tokio::test]
    async fn sqlite_index_returns_tags_for_exact_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("annotations.db");
        migrate::run_migrations(&path).await.unwrap();

        let pool = db::connect(&path).await.unwrap();
        let written = add_tags(&pool, "ABC123", &["Hot".to_string(), "Privileged".to_string()])
            .await
            .unwrap();
        assert_eq!(written, 2);
        // Re-adding is a no-op
        let written = add_tags(&pool, "ABC123", &["Hot".to_string()]).await.unwrap();
        assert_eq!(written, 0);
        pool.close().await;

        let index = SqliteDigestIndex::open(&path).await.unwrap();
        let first = index.tags_for_digest("ABC123").await.unwrap();
        let second = index.tags_for_digest("ABC123").await.unwrap();
        assert_eq!(first, vec!["Hot", "Privileged"]);
        assert_eq!(first, second);
        assert!(index.tags_for_digest("abc123").await.unwrap().is_empty());
        index.close().await.unwrap();
    }

    #[tokio::test]
    async fn opening_missing_database_fails() {
        let tmp = TempDir::new().unwrap();
        let result = SqliteDigestIndex::open(&tmp.path().join("nope.db")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn in_memory_index_survives_a_poisoned_lock() {
        let index = std::sync::Arc::new(InMemoryDigestIndex::new());
        index.insert("d1", "Hot");

        let poisoner = index.clone();
        let result = std::thread::spawn(move || {
            let _guard = poisoner.tags.write().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(result.is_err());
        assert!(index.tags.is_poisoned());

        index.insert("d1", "Privileged");
        assert_eq!(
            index.tags_for_digest("d1").await.unwrap(),
            vec!["Hot", "Privileged"]
        );
    }

    #[tokio::test]
    async fn in_memory_index_counts_closes() {
        let index = InMemoryDigestIndex::new();
        index.insert("d1", "Hot");
        index.insert("d1", "Hot");
        assert_eq!(index.tags_for_digest("d1").await.unwrap(), vec!["Hot"]);
        index.close().await.unwrap();
        assert_eq!(index.close_count(), 1);
    }
}
