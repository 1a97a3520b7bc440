//! Per-item policy execution.
//!
//! A [`Worker`] owns one [`PolicyRegistry`] for its whole lifetime:
//! initialize once, call [`Worker::process`] for every item the host hands
//! over, then [`Worker::close`] when the host shuts the worker down.

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::Config;
use crate::effects::{ItemOutcome, WorkerItem};
use crate::models::Item;
use crate::traits::PolicyRegistry;

pub struct Worker {
    registry: PolicyRegistry,
}

impl Worker {
    /// Builds every configured policy. Fails on broken configuration or
    /// missing resources (annotation database, cross-reference file).
    pub async fn initialize(config: &Config) -> Result<Self> {
        let registry = PolicyRegistry::from_config(config).await?;
        debug!(policies = registry.len(), "Worker initialized");
        Ok(Self::new(registry))
    }

    pub fn new(registry: PolicyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Runs every policy against `item`, in order, and reports the result.
    ///
    /// A failing policy is logged and recorded on the outcome; the remaining
    /// policies still run.
    pub async fn process(&self, item: Item) -> ItemOutcome {
        let mut worker_item = WorkerItem::new(item);
        for policy in self.registry.policies() {
            match policy.evaluate(&worker_item).await {
                Ok(effects) => {
                    for effect in effects {
                        worker_item.apply(effect);
                    }
                }
                Err(e) => {
                    warn!(
                        policy = policy.name(),
                        item = %worker_item.source_item().guid,
                        error = %format!("{:#}", e),
                        "Policy failed"
                    );
                    worker_item.record_failure(policy.name(), format!("{:#}", e));
                }
            }
        }
        worker_item.into_outcome()
    }

    /// Releases shared resources such as the annotation database.
    pub async fn close(self) -> Result<()> {
        self.registry.close().await
    }
}
