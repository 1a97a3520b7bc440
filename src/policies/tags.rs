//! Tagging policies: static mime type table and digest index lookup.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::annotations::DigestIndex;
use crate::config::{DigestTagsConfig, MimeTypeTagsConfig};
use crate::effects::{Effect, WorkerItem};
use crate::traits::Policy;

pub struct MimeTypeTags {
    tags: HashMap<String, String>,
}

impl MimeTypeTags {
    pub fn from_config(cfg: &MimeTypeTagsConfig) -> Self {
        Self {
            tags: cfg
                .tags
                .iter()
                .map(|(mime, tag)| (mime.trim().to_string(), tag.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Policy for MimeTypeTags {
    fn name(&self) -> &str {
        "mime_type_tags"
    }

    fn description(&self) -> String {
        format!("tag {} mime type(s)", self.tags.len())
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        Ok(self
            .tags
            .get(&item.source_item().mime_type)
            .map(|tag| vec![Effect::AddTag(tag.clone())])
            .unwrap_or_default())
    }
}

/// Applies every tag the annotation index holds for the item's digest.
pub struct DigestTags {
    index: Arc<dyn DigestIndex>,
    verbose: bool,
}

impl DigestTags {
    pub fn new(index: Arc<dyn DigestIndex>, cfg: &DigestTagsConfig) -> Self {
        Self {
            index,
            verbose: cfg.verbose,
        }
    }
}

#[async_trait]
impl Policy for DigestTags {
    fn name(&self) -> &str {
        "digest_tags"
    }

    fn description(&self) -> String {
        "tag items from the annotation database by digest".to_string()
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let Some(digest) = item.source_item().digest() else {
            return Ok(Vec::new());
        };
        let tags = self.index.tags_for_digest(digest).await?;
        if self.verbose {
            info!(
                digest = %digest,
                count = tags.len(),
                tags = %tags.join("; "),
                "Applying annotation tags"
            );
        }
        Ok(tags.into_iter().map(Effect::AddTag).collect())
    }
}
