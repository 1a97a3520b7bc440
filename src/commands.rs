//! Small CLI commands over the annotation database and the policy list.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::annotations::{add_tags, DigestIndex, SqliteDigestIndex};
use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::traits::PolicyRegistry;

fn annotations_path(config: &Config) -> Result<&Path> {
    let annotations = config
        .annotations
        .as_ref()
        .context("No [annotations] section in config")?;
    Ok(&annotations.path)
}

/// `wss init`
pub async fn init(config: &Config) -> Result<()> {
    let path = annotations_path(config)?;
    migrate::run_migrations(path).await?;
    println!("Annotation database initialized: {}", path.display());
    Ok(())
}

/// `wss annotate <digest> <tag>...`
pub async fn annotate(config: &Config, digest: &str, tags: &[String]) -> Result<()> {
    let digest = digest.trim();
    if digest.is_empty() {
        bail!("Digest must not be empty");
    }
    let tags: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        bail!("At least one non-empty tag is required");
    }

    let path = annotations_path(config)?;
    if !path.is_file() {
        bail!(
            "Annotation database does not exist: {}. Run `wss init` first.",
            path.display()
        );
    }
    let pool = db::connect(path).await?;
    let written = add_tags(&pool, digest, &tags).await;
    pool.close().await;
    println!("{}: {} new tag(s)", digest, written?);
    Ok(())
}

/// `wss tags <digest>`
pub async fn show_tags(config: &Config, digest: &str) -> Result<()> {
    let index = SqliteDigestIndex::open(annotations_path(config)?).await?;
    let tags = index.tags_for_digest(digest).await;
    index.close().await?;
    for tag in tags? {
        println!("{}", tag);
    }
    Ok(())
}

/// `wss policies`
pub async fn list_policies(config: &Config) -> Result<()> {
    let registry = PolicyRegistry::from_config(config).await?;
    println!("{:<4} {:<26} DESCRIPTION", "#", "POLICY");
    for (idx, policy) in registry.policies().iter().enumerate() {
        println!("{:<4} {:<26} {}", idx + 1, policy.name(), policy.description());
    }
    if registry.is_empty() {
        println!("(no policies configured)");
    }
    registry.close().await
}
