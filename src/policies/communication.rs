//! Append fixed recipients to every communication.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppendRecipientsConfig;
use crate::effects::{Effect, WorkerItem};
use crate::models::{Address, Communication};
use crate::traits::Policy;

pub struct AppendRecipients {
    cfg: AppendRecipientsConfig,
}

impl AppendRecipients {
    pub fn from_config(cfg: &AppendRecipientsConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    fn rebuild(&self, original: &Communication) -> Communication {
        let mut builder = original.to_builder();
        for address in &self.cfg.from {
            builder = builder.add_from(address.clone());
        }
        for address in &self.cfg.to {
            builder = builder.add_to(address.clone());
        }
        for address in &self.cfg.cc {
            builder = builder.add_cc(address.clone());
        }
        for address in &self.cfg.bcc {
            builder = builder.add_bcc(address.clone());
        }
        builder.build()
    }
}

fn render(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(|a| a.address.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Policy for AppendRecipients {
    fn name(&self) -> &str {
        "append_recipients"
    }

    fn description(&self) -> String {
        let mut parts = Vec::new();
        for (field, list) in [
            ("from", &self.cfg.from),
            ("to", &self.cfg.to),
            ("cc", &self.cfg.cc),
            ("bcc", &self.cfg.bcc),
        ] {
            if !list.is_empty() {
                parts.push(format!("{}: {}", field, render(list)));
            }
        }
        format!("append recipients ({})", parts.join("; "))
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        // Builds on an earlier replacement if one was already made.
        let Some(communication) = item.communication() else {
            return Ok(Vec::new());
        };
        Ok(vec![Effect::ReplaceCommunication(
            self.rebuild(communication),
        )])
    }
}
