//! Keep binaries only for items descended from a qualifying container type.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::config::StoreBinaryByAncestorConfig;
use crate::effects::{Effect, WorkerItem};
use crate::traits::Policy;

pub struct StoreBinaryByAncestor {
    mime_types: HashSet<String>,
}

impl StoreBinaryByAncestor {
    pub fn from_config(cfg: &StoreBinaryByAncestorConfig) -> Self {
        Self {
            mime_types: cfg.mime_types.iter().map(|m| m.trim().to_string()).collect(),
        }
    }
}

#[async_trait]
impl Policy for StoreBinaryByAncestor {
    fn name(&self) -> &str {
        "store_binary_by_ancestor"
    }

    fn description(&self) -> String {
        format!(
            "store binaries below {} qualifying ancestor mime type(s)",
            self.mime_types.len()
        )
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        // The path includes the item itself.
        let qualifies = item
            .source_item()
            .path()
            .iter()
            .any(|ancestor| self.mime_types.contains(&ancestor.mime_type));
        Ok(vec![Effect::SetStoreBinary(qualifies)])
    }
}
