//! Top-level date windows combined with email participant domain matching.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::date_range::DateWindows;
use crate::config::DateRangesAndDomainsConfig;
use crate::effects::{Effect, WorkerItem};
use crate::models::{Address, Communication};
use crate::traits::Policy;

/// Case-insensitive literal domain patterns for one address list.
#[derive(Debug, Clone, Default)]
pub struct DomainMatcher {
    patterns: Vec<Regex>,
}

impl DomainMatcher {
    pub fn new(domains: &[String]) -> Result<Self> {
        let patterns = domains
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(|d| {
                RegexBuilder::new(&regex::escape(d))
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid domain: {}", d))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True as soon as one address matches one pattern.
    pub fn any_match(&self, addresses: &[Address]) -> bool {
        addresses
            .iter()
            .any(|a| self.patterns.iter().any(|p| p.is_match(&a.address)))
    }
}

pub struct DateRangeDomainFilter {
    windows: DateWindows,
    communication_kind: String,
    from: DomainMatcher,
    to: DomainMatcher,
    cc: DomainMatcher,
    bcc: DomainMatcher,
}

impl DateRangeDomainFilter {
    pub fn from_config(cfg: &DateRangesAndDomainsConfig) -> Result<Self> {
        Ok(Self {
            windows: DateWindows::new(cfg.ranges.clone(), cfg.include_if_date_missing),
            communication_kind: cfg.communication_kind.clone(),
            from: DomainMatcher::new(&cfg.from_domains)?,
            to: DomainMatcher::new(&cfg.to_domains)?,
            cc: DomainMatcher::new(&cfg.cc_domains)?,
            bcc: DomainMatcher::new(&cfg.bcc_domains)?,
        })
    }

    fn domain_filtering_configured(&self) -> bool {
        !(self.from.is_empty() && self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }

    fn any_domain_matches(&self, communication: Option<&Communication>) -> bool {
        let Some(comm) = communication else {
            return false;
        };
        self.from.any_match(comm.from())
            || self.to.any_match(comm.to())
            || self.cc.any_match(comm.cc())
            || self.bcc.any_match(comm.bcc())
    }
}

#[async_trait]
impl Policy for DateRangeDomainFilter {
    fn name(&self) -> &str {
        "date_ranges_and_domains"
    }

    fn description(&self) -> String {
        format!(
            "keep top-level items dated within {} range(s); {} items also need a matching domain",
            self.windows.len(),
            self.communication_kind
        )
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let source = item.source_item();
        let Some(in_range) = self.windows.decide(source) else {
            return Ok(Vec::new());
        };
        if !in_range {
            return Ok(vec![Effect::SetProcess(false)]);
        }
        if !source.is_kind(&self.communication_kind) {
            return Ok(vec![Effect::SetProcess(true)]);
        }
        if !self.domain_filtering_configured() {
            return Ok(vec![Effect::SetProcess(true)]);
        }

        let matched = self.any_domain_matches(item.communication());
        debug!(item = %source.guid, matched, "Domain decision");
        Ok(vec![Effect::SetProcess(matched)])
    }
}
