//! Copy properties, digest and size down from a container parent.
//!
//! Some tools do not extract a separate record for the item held inside a
//! compound message (e.g. Outlook MSG). Pulling the container's metadata down
//! onto that item keeps the two views comparable.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::ParentPulldownConfig;
use crate::effects::{Effect, WorkerItem};
use crate::traits::Policy;

pub struct ParentPulldown {
    cfg: ParentPulldownConfig,
}

impl ParentPulldown {
    pub fn from_config(cfg: &ParentPulldownConfig) -> Self {
        Self { cfg: cfg.clone() }
    }
}

#[async_trait]
impl Policy for ParentPulldown {
    fn name(&self) -> &str {
        "parent_pulldown"
    }

    fn description(&self) -> String {
        format!(
            "copy metadata down from {} parents",
            self.cfg.container_mime_type
        )
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let Some(parent) = item.source_item().parent() else {
            return Ok(Vec::new());
        };
        if parent.mime_type != self.cfg.container_mime_type {
            return Ok(Vec::new());
        }

        let mut properties = item.properties().clone();
        if self.cfg.pull_properties {
            for (key, value) in &parent.properties {
                properties.insert(format!("{}{}", self.cfg.property_prefix, key), value.clone());
            }
        }
        if self.cfg.pull_digest {
            if let Some(digest) = parent.digest() {
                properties.insert(
                    self.cfg.digest_property.clone(),
                    Value::String(digest.to_string()),
                );
            }
        }
        if self.cfg.pull_size {
            if let Some(size) = parent.size {
                properties.insert(self.cfg.size_property.clone(), Value::from(size));
            }
        }

        Ok(vec![Effect::SetProperties(properties)])
    }
}
