use anyhow::Result;
use std::path::Path;

use crate::db;

pub async fn run_migrations(db_path: &Path) -> Result<()> {
    let pool = db::connect(db_path).await?;

    // One row per (digest, tag) pair
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS digest_tags (
            digest TEXT NOT NULL,
            tag TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(digest, tag)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_digest_tags_digest ON digest_tags(digest)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
