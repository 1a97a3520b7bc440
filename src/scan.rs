//! Build items from files on disk.
//!
//! Used by `wss scan` to run the policies against a directory tree, and by
//! `wss run --follow-children` to turn child paths (PDF pages, cross-reference
//! children) back into items.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::models::Item;

/// Extension → mime type for files found on disk.
const MIME_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("md", "text/markdown"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("eml", "message/rfc822"),
    ("msg", "application/vnd.ms-outlook-msg"),
    ("pst", "application/vnd.ms-outlook"),
    ("nsf", "application/vnd.lotus-notes"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    ("zip", "application/zip"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
];

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub fn mime_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Walks `root` and returns one top-level item per matching file, sorted by
/// relative path.
pub fn scan_directory(root: &Path, cfg: &ScanConfig) -> Result<Vec<Item>> {
    if !root.is_dir() {
        bail!("Scan root does not exist or is not a directory: {}", root.display());
    }

    let include_set = build_globset(&cfg.include_globs)?;
    let exclude_set = build_globset(&cfg.exclude_globs)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(cfg.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        found.push((rel_str, path.to_path_buf()));
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
        .iter()
        .map(|(_, path)| -> Result<Item> {
            let mut item = file_to_item(path)?;
            item.top_level = true;
            Ok(item)
        })
        .collect()
}

/// Item for a file produced beneath `parent`.
pub fn child_item(path: &Path, parent: &Item) -> Result<Item> {
    let mut item = file_to_item(path)?;
    item.parent = Some(Box::new(parent.clone()));
    Ok(item)
}

fn file_to_item(path: &Path) -> Result<Item> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let metadata = std::fs::metadata(path)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mime_type = mime_type_for(path);

    let mut item = Item::new(Uuid::new_v4().to_string(), name, mime_type);
    item.digest = Some(hex::encode(Sha256::digest(&bytes)));
    item.size = Some(bytes.len() as u64);
    item.date = metadata
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).fixed_offset());
    if mime_type.starts_with("text/") {
        item.text = String::from_utf8(bytes).ok();
    }
    item.binary_path = Some(path.to_path_buf());
    Ok(item)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
