//! Drive a worker over a batch of items and stream the outcomes.
//!
//! Outcomes are written as JSON lines, one per item, in processing order.
//! With `follow_children`, child paths registered by a policy are turned
//! into items and processed right after their parent.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Item;
use crate::scan;
use crate::worker::Worker;

/// Counts reported after a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub excluded: usize,
    pub failed: usize,
    pub children: usize,
}

/// Reads a JSON array of items.
pub fn load_manifest(path: &Path) -> Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let items: Vec<Item> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
    Ok(items)
}

/// Processes every item (and optionally its children) and writes outcomes.
pub async fn process_items<W: Write>(
    worker: &Worker,
    items: Vec<Item>,
    follow_children: bool,
    out: &mut W,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    // Stack of pending items; reversed so the original order is kept.
    let mut pending: Vec<Item> = items.into_iter().rev().collect();

    while let Some(item) = pending.pop() {
        let parent = follow_children.then(|| item.clone());
        let outcome = worker.process(item).await;

        summary.processed += 1;
        if !outcome.process {
            summary.excluded += 1;
        }
        if outcome.failed() {
            summary.failed += 1;
        }
        serde_json::to_writer(&mut *out, &outcome)?;
        writeln!(out)?;

        let (Some(parent), Some(children)) = (parent, outcome.children.as_ref()) else {
            continue;
        };
        let mut child_items = Vec::with_capacity(children.len());
        for path in children {
            if !path.exists() {
                warn!(path = %path.display(), parent = %parent.guid, "Child path missing, skipping");
                continue;
            }
            match scan::child_item(path, &parent) {
                Ok(child) => child_items.push(child),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load child item");
                }
            }
        }
        summary.children += child_items.len();
        pending.extend(child_items.into_iter().rev());
    }

    out.flush()?;
    Ok(summary)
}

/// `wss run`: process a manifest file.
pub async fn run_manifest(config: &Config, manifest: &Path, follow_children: bool) -> Result<()> {
    let items = load_manifest(manifest)?;
    run_items(config, items, follow_children).await
}

/// `wss scan`: process every file under a directory.
pub async fn run_scan(config: &Config, root: &Path, follow_children: bool) -> Result<()> {
    let items = scan::scan_directory(root, &config.scan)?;
    info!(root = %root.display(), items = items.len(), "Scanned directory");
    run_items(config, items, follow_children).await
}

async fn run_items(config: &Config, items: Vec<Item>, follow_children: bool) -> Result<()> {
    let worker = Worker::initialize(config).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = process_items(&worker, items, follow_children, &mut out).await;
    worker.close().await?;

    let summary = result?;
    info!(
        processed = summary.processed,
        excluded = summary.excluded,
        failed = summary.failed,
        children = summary.children,
        "Run complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::policies::pdf_split::tests::sample_pdf;
    use crate::traits::PolicyRegistry;
    use serde_json::Value;
    use tempfile::TempDir;

    fn worker(toml: &str) -> Worker {
        let config = parse_config(toml).unwrap();
        Worker::new(PolicyRegistry::with_index(&config, None).unwrap())
    }

    fn lines(out: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn manifest_items_parse_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        std::fs::write(
            &path,
            r#"[{"guid": "g1", "name": "a.txt", "mime_type": "text/plain", "top_level": true},
                {"guid": "g2", "digest": "ABC123"}]"#,
        )
        .unwrap();
        let items = load_manifest(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].top_level);
        assert_eq!(items[1].digest(), Some("ABC123"));
    }

    #[tokio::test]
    async fn writes_one_line_per_item() {
        let worker = worker("[[policies]]\ntype = \"exclude_extensions\"\nextensions = [\"tmp\"]\n");
        let items = vec![
            Item::new("g1", "keep.doc", "application/msword"),
            Item::new("g2", "scratch.TMP", "application/octet-stream"),
        ];
        let mut out = Vec::new();
        let summary = process_items(&worker, items, false, &mut out).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.excluded, 1);
        let lines = lines(&out);
        assert_eq!(lines[0]["guid"], "g1");
        assert_eq!(lines[0]["process"], true);
        assert_eq!(lines[1]["process"], false);
    }

    #[tokio::test]
    async fn follows_split_pages_as_children() {
        let tmp = TempDir::new().unwrap();
        let pdf = tmp.path().join("two.pdf");
        std::fs::write(&pdf, sample_pdf(2)).unwrap();
        let worker = worker(&format!(
            "[[policies]]\ntype = \"split_pdf_pages\"\noutput_dir = \"{}\"\n",
            tmp.path().join("pages").display()
        ));

        let mut item = Item::new("cafe01", "two.pdf", "application/pdf");
        item.binary_path = Some(pdf);
        let mut out = Vec::new();
        let summary = process_items(&worker, vec![item], true, &mut out).await.unwrap();

        assert_eq!(summary.children, 2);
        assert_eq!(summary.processed, 3);
        let lines = lines(&out);
        assert_eq!(lines[0]["guid"], "cafe01");
        assert_eq!(lines[0]["children"].as_array().unwrap().len(), 2);
        // Pages are not split again.
        assert!(lines[1].get("children").is_none());
        assert!(lines[2].get("children").is_none());
    }
}
