//! Inject child items listed in an external cross-reference table.
//!
//! The table is a CSV file with a header row followed by
//! `parent_guid,child_path` rows. GUIDs are compared after normalization so
//! that `{ABC-123}` and `abc123` name the same parent.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ChildXrefConfig;
use crate::effects::{Effect, WorkerItem};
use crate::traits::Policy;

/// Lower-case and drop every character that is not a hex digit.
pub fn normalize_guid(guid: &str) -> String {
    guid.trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect()
}

/// Parent GUID → child paths, in table order.
#[derive(Debug, Default, Clone)]
pub struct ChildTable {
    children: HashMap<String, Vec<PathBuf>>,
}

impl ChildTable {
    pub fn parse(content: &str) -> Result<Self> {
        // csv reads an unterminated quote through to end of input.
        if content.matches('"').count() % 2 != 0 {
            bail!("unterminated quoted field");
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut children: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for record in reader.records() {
            let record = record.context("malformed row")?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            if record.len() < 2 {
                bail!("line {}: expected parent guid and child path", line);
            }
            let parent = normalize_guid(&record[0]);
            let child = record[1].trim();
            if parent.is_empty() || child.is_empty() {
                bail!("line {}: parent guid and child path must not be empty", line);
            }
            children.entry(parent).or_default().push(PathBuf::from(child));
        }
        Ok(Self { children })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read child table: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse child table: {}", path.display()))
    }

    pub fn children_of(&self, guid: &str) -> Option<&[PathBuf]> {
        self.children.get(&normalize_guid(guid)).map(Vec::as_slice)
    }

    pub fn parent_count(&self) -> usize {
        self.children.len()
    }
}

pub struct ChildXref {
    table: ChildTable,
    source: PathBuf,
}

impl ChildXref {
    pub fn from_config(cfg: &ChildXrefConfig) -> Result<Self> {
        let table = ChildTable::load(&cfg.path)?;
        info!(
            path = %cfg.path.display(),
            parents = table.parent_count(),
            "Loaded child cross-reference table"
        );
        Ok(Self {
            table,
            source: cfg.path.clone(),
        })
    }
}

#[async_trait]
impl Policy for ChildXref {
    fn name(&self) -> &str {
        "child_xref"
    }

    fn description(&self) -> String {
        format!(
            "inject children for {} parent(s) from {}",
            self.table.parent_count(),
            self.source.display()
        )
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let guid = &item.source_item().guid;
        match self.table.children_of(guid) {
            Some(paths) => {
                debug!(item = %guid, children = paths.len(), "Injecting children");
                Ok(vec![Effect::SetChildren(paths.to_vec())])
            }
            None => Ok(Vec::new()),
        }
    }
}
