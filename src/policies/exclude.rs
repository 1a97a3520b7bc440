//! Exclude items from processing by name extension or mime type.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::info;

use crate::config::{ExcludeExtensionsConfig, ExcludeMimeTypesConfig};
use crate::effects::{Effect, WorkerItem};
use crate::traits::Policy;

/// Rejects items whose name ends in one of the configured extensions
/// (case-insensitive).
pub struct ExcludeExtensions {
    patterns: Vec<Regex>,
}

impl ExcludeExtensions {
    pub fn from_config(cfg: &ExcludeExtensionsConfig) -> Result<Self> {
        let patterns = cfg
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.'))
            .filter(|e| !e.is_empty())
            .map(|e| {
                RegexBuilder::new(&format!(r"\.{}$", regex::escape(e)))
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid extension: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, name: &str) -> bool {
        !name.is_empty() && self.patterns.iter().any(|p| p.is_match(name))
    }
}

#[async_trait]
impl Policy for ExcludeExtensions {
    fn name(&self) -> &str {
        "exclude_extensions"
    }

    fn description(&self) -> String {
        format!("exclude items by {} name extension(s)", self.patterns.len())
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let name = &item.source_item().name;
        if self.matches(name) {
            info!(item = %item.source_item().guid, name = %name, "Excluding item by extension");
            return Ok(vec![Effect::SetProcess(false)]);
        }
        Ok(Vec::new())
    }
}

/// Rejects items whose mime type is in the configured set (exact match).
pub struct ExcludeMimeTypes {
    mime_types: HashSet<String>,
}

impl ExcludeMimeTypes {
    pub fn from_config(cfg: &ExcludeMimeTypesConfig) -> Self {
        let mime_types = cfg
            .mime_types
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Self { mime_types }
    }
}

#[async_trait]
impl Policy for ExcludeMimeTypes {
    fn name(&self) -> &str {
        "exclude_mime_types"
    }

    fn description(&self) -> String {
        let mut listed: Vec<&str> = self.mime_types.iter().map(String::as_str).collect();
        listed.sort_unstable();
        format!("exclude mime types: {}", listed.join(", "))
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let mime_type = &item.source_item().mime_type;
        if self.mime_types.contains(mime_type) {
            info!(item = %item.source_item().guid, mime_type = %mime_type, "Excluding item by mime type");
            return Ok(vec![Effect::SetProcess(false)]);
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;

    fn extensions(list: &[&str]) -> ExcludeExtensions {
        ExcludeExtensions::from_config(&ExcludeExtensionsConfig {
            extensions: list.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn extension_match_is_suffix_and_case_insensitive() {
        let policy = extensions(&["plist", ".cab"]);
        assert!(policy.matches("Info.PLIST"));
        assert!(policy.matches("setup.cab"));
        assert!(!policy.matches("plist.txt"));
        assert!(!policy.matches("notacab"));
        assert!(!policy.matches(""));

        let item = WorkerItem::new(Item::new("g", "Library.plist", "application/x-plist"));
        assert_eq!(
            policy.evaluate(&item).await.unwrap(),
            vec![Effect::SetProcess(false)]
        );
    }

    #[tokio::test]
    async fn extension_is_matched_literally() {
        let policy = extensions(&["a+b"]);
        assert!(policy.matches("x.a+b"));
        assert!(!policy.matches("x.aab"));
    }

    #[tokio::test]
    async fn excluded_mime_type_only_clears_process_flag() {
        let policy = ExcludeMimeTypes::from_config(&ExcludeMimeTypesConfig {
            mime_types: vec![" text/plain ".to_string()],
        });
        let mut item = WorkerItem::new(Item::new("g", "notes.txt", "text/plain"));
        for effect in policy.evaluate(&item).await.unwrap() {
            item.apply(effect);
        }
        let outcome = item.into_outcome();
        assert!(!outcome.process);
        assert!(outcome.tags.is_empty());
        assert!(outcome.properties.is_none());
        assert!(outcome.children.is_none());
        assert!(outcome.store_binary.is_none());
    }

    #[tokio::test]
    async fn other_and_missing_mime_types_are_left_alone() {
        let policy = ExcludeMimeTypes::from_config(&ExcludeMimeTypesConfig {
            mime_types: vec!["text/plain".to_string()],
        });
        let html = WorkerItem::new(Item::new("g", "a.html", "text/html"));
        assert!(policy.evaluate(&html).await.unwrap().is_empty());
        let unknown = WorkerItem::new(Item::new("g", "a", ""));
        assert!(policy.evaluate(&unknown).await.unwrap().is_empty());
    }
}
