//! The policy trait and the registry that holds configured policies.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             PolicyRegistry               │
//! │  ┌─────────┐ ┌─────────┐ ┌────────────┐ │
//! │  │ filters │ │ taggers │ │  custom    │ │
//! │  │         │ │ mutators│ │  (Rust)    │ │
//! │  └─────────┘ └─────────┘ └────────────┘ │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!        Worker::process() → ItemOutcome
//! ```
//!
//! # Usage
//!
//! ```rust
//! use worker_scripts::traits::PolicyRegistry;
//!
//! let mut policies = PolicyRegistry::new();
//! // policies.register(Box::new(MyPolicy::new()));
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::annotations::{DigestIndex, SqliteDigestIndex};
use crate::config::{Config, PolicyConfig};
use crate::effects::{Effect, WorkerItem};
use crate::policies::{
    AppendRecipients, ChildXref, CommunicationYearFilter, DateRangeDomainFilter, DateRangeFilter,
    DigestTags, ExcludeExtensions, ExcludeMimeTypes, MimeTypeTags, NamedEntities,
    ParentPulldown, SplitPdfPages, StoreBinaryByAncestor,
};

/// A per-item rule that inspects an item and requests changes to it.
///
/// Policies hold only compiled configuration (and shared handles such as the
/// digest index). They never mutate the item themselves; every requested
/// change comes back as an [`Effect`].
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use worker_scripts::effects::{Effect, WorkerItem};
/// use worker_scripts::traits::Policy;
///
/// pub struct TagEverything;
///
/// #[async_trait]
/// impl Policy for TagEverything {
///     fn name(&self) -> &str { "tag_everything" }
///     fn description(&self) -> String { "tag every item".to_string() }
///
///     async fn evaluate(&self, _item: &WorkerItem) -> Result<Vec<Effect>> {
///         Ok(vec![Effect::AddTag("Seen".to_string())])
///     }
/// }
/// ```
#[async_trait]
pub trait Policy: Send + Sync {
    /// Policy type name, matching the `type` key in the config file.
    fn name(&self) -> &str;

    /// One-line summary of the configured behavior, shown by `wss policies`.
    fn description(&self) -> String;

    /// Inspect the item and return the effects to apply.
    ///
    /// `item` reflects every effect applied by earlier policies. An error
    /// is recorded on the item's outcome and does not stop later policies.
    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>>;
}

/// Ordered set of policies plus the resources they share.
pub struct PolicyRegistry {
    policies: Vec<Box<dyn Policy>>,
    index: Option<Arc<dyn DigestIndex>>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            index: None,
        }
    }

    /// Build every configured policy, in file order.
    ///
    /// The annotation database is opened once when any `digest_tags` policy
    /// is present and shared between them.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let index: Option<Arc<dyn DigestIndex>> = if needs_index(config) {
            let annotations = config
                .annotations
                .as_ref()
                .context("digest_tags policy requires an [annotations] section")?;
            let index = SqliteDigestIndex::open(&annotations.path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to open annotation database: {}",
                        annotations.path.display()
                    )
                })?;
            Some(Arc::new(index) as Arc<dyn DigestIndex>)
        } else {
            None
        };
        Self::with_index(config, index)
    }

    /// Like [`from_config`](Self::from_config), with a caller-supplied index.
    pub fn with_index(config: &Config, index: Option<Arc<dyn DigestIndex>>) -> Result<Self> {
        let mut registry = Self::new();
        if needs_index(config) && index.is_none() {
            bail!("digest_tags policy configured but no digest index is available");
        }

        for (idx, policy) in config.policies.iter().enumerate() {
            let built = build_policy(policy, index.as_ref()).with_context(|| {
                format!("Failed to build policies[{}] ({})", idx, policy.type_name())
            })?;
            debug!(policy = built.name(), "Registered policy");
            registry.register(built);
        }
        registry.index = index;
        Ok(registry)
    }

    /// Register a policy after the configured ones.
    pub fn register(&mut self, policy: Box<dyn Policy>) {
        self.policies.push(policy);
    }

    /// All policies, in execution order.
    pub fn policies(&self) -> &[Box<dyn Policy>] {
        &self.policies
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Release shared resources. Consumes the registry.
    pub async fn close(self) -> Result<()> {
        if let Some(index) = self.index {
            index.close().await?;
        }
        Ok(())
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn needs_index(config: &Config) -> bool {
    config
        .policies
        .iter()
        .any(|p| matches!(p, PolicyConfig::DigestTags(_)))
}

fn build_policy(
    policy: &PolicyConfig,
    index: Option<&Arc<dyn DigestIndex>>,
) -> Result<Box<dyn Policy>> {
    let built: Box<dyn Policy> = match policy {
        PolicyConfig::ExcludeExtensions(cfg) => Box::new(ExcludeExtensions::from_config(cfg)?),
        PolicyConfig::ExcludeMimeTypes(cfg) => Box::new(ExcludeMimeTypes::from_config(cfg)),
        PolicyConfig::DateRanges(cfg) => Box::new(DateRangeFilter::from_config(cfg)),
        PolicyConfig::DateRangesAndDomains(cfg) => {
            Box::new(DateRangeDomainFilter::from_config(cfg)?)
        }
        PolicyConfig::CommunicationYear(cfg) => {
            Box::new(CommunicationYearFilter::from_config(cfg))
        }
        PolicyConfig::DigestTags(cfg) => {
            let index = index.context("digest index not opened")?;
            Box::new(DigestTags::new(Arc::clone(index), cfg))
        }
        PolicyConfig::MimeTypeTags(cfg) => Box::new(MimeTypeTags::from_config(cfg)),
        PolicyConfig::StoreBinaryByAncestor(cfg) => {
            Box::new(StoreBinaryByAncestor::from_config(cfg))
        }
        PolicyConfig::ParentPulldown(cfg) => Box::new(ParentPulldown::from_config(cfg)),
        PolicyConfig::SplitPdfPages(cfg) => Box::new(SplitPdfPages::from_config(cfg)),
        PolicyConfig::ChildXref(cfg) => Box::new(ChildXref::from_config(cfg)?),
        PolicyConfig::NamedEntities(cfg) => Box::new(NamedEntities::from_config(cfg)?),
        PolicyConfig::AppendRecipients(cfg) => Box::new(AppendRecipients::from_config(cfg)),
    };
    Ok(built)
}
