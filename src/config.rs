use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::Address;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub annotations: Option<AnnotationsConfig>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnotationsConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

/// One configured policy. Entries run in the order they appear in the file.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    ExcludeExtensions(ExcludeExtensionsConfig),
    ExcludeMimeTypes(ExcludeMimeTypesConfig),
    DateRanges(DateRangesConfig),
    DateRangesAndDomains(DateRangesAndDomainsConfig),
    CommunicationYear(CommunicationYearConfig),
    DigestTags(DigestTagsConfig),
    MimeTypeTags(MimeTypeTagsConfig),
    StoreBinaryByAncestor(StoreBinaryByAncestorConfig),
    ParentPulldown(ParentPulldownConfig),
    SplitPdfPages(SplitPdfPagesConfig),
    ChildXref(ChildXrefConfig),
    NamedEntities(NamedEntitiesConfig),
    AppendRecipients(AppendRecipientsConfig),
}

impl PolicyConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            PolicyConfig::ExcludeExtensions(_) => "exclude_extensions",
            PolicyConfig::ExcludeMimeTypes(_) => "exclude_mime_types",
            PolicyConfig::DateRanges(_) => "date_ranges",
            PolicyConfig::DateRangesAndDomains(_) => "date_ranges_and_domains",
            PolicyConfig::CommunicationYear(_) => "communication_year",
            PolicyConfig::DigestTags(_) => "digest_tags",
            PolicyConfig::MimeTypeTags(_) => "mime_type_tags",
            PolicyConfig::StoreBinaryByAncestor(_) => "store_binary_by_ancestor",
            PolicyConfig::ParentPulldown(_) => "parent_pulldown",
            PolicyConfig::SplitPdfPages(_) => "split_pdf_pages",
            PolicyConfig::ChildXref(_) => "child_xref",
            PolicyConfig::NamedEntities(_) => "named_entities",
            PolicyConfig::AppendRecipients(_) => "append_recipients",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExcludeExtensionsConfig {
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExcludeMimeTypesConfig {
    pub mime_types: Vec<String>,
}

/// Inclusive interval of instants.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct DateRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl DateRange {
    pub fn contains(&self, date: &DateTime<FixedOffset>) -> bool {
        *date >= self.start && *date <= self.end
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DateRangesConfig {
    pub ranges: Vec<DateRange>,
    #[serde(default)]
    pub include_if_date_missing: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DateRangesAndDomainsConfig {
    pub ranges: Vec<DateRange>,
    #[serde(default)]
    pub include_if_date_missing: bool,
    #[serde(default)]
    pub from_domains: Vec<String>,
    #[serde(default)]
    pub to_domains: Vec<String>,
    #[serde(default)]
    pub cc_domains: Vec<String>,
    #[serde(default)]
    pub bcc_domains: Vec<String>,
    #[serde(default = "default_communication_kind")]
    pub communication_kind: String,
}

fn default_communication_kind() -> String {
    "email".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommunicationYearConfig {
    pub min_year: i32,
    pub max_year: i32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DigestTagsConfig {
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MimeTypeTagsConfig {
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreBinaryByAncestorConfig {
    pub mime_types: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParentPulldownConfig {
    #[serde(default = "default_container_mime_type")]
    pub container_mime_type: String,
    #[serde(default = "default_true")]
    pub pull_properties: bool,
    #[serde(default = "default_property_prefix")]
    pub property_prefix: String,
    #[serde(default = "default_true")]
    pub pull_digest: bool,
    #[serde(default = "default_digest_property")]
    pub digest_property: String,
    #[serde(default = "default_true")]
    pub pull_size: bool,
    #[serde(default = "default_size_property")]
    pub size_property: String,
}

impl Default for ParentPulldownConfig {
    fn default() -> Self {
        Self {
            container_mime_type: default_container_mime_type(),
            pull_properties: true,
            property_prefix: default_property_prefix(),
            pull_digest: true,
            digest_property: default_digest_property(),
            pull_size: true,
            size_property: default_size_property(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_container_mime_type() -> String {
    "application/vnd.ms-outlook-msg".to_string()
}
fn default_property_prefix() -> String {
    "MSG ".to_string()
}
fn default_digest_property() -> String {
    "MSG MD5 Digest".to_string()
}
fn default_size_property() -> String {
    "MSG File Size".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SplitPdfPagesConfig {
    pub output_dir: PathBuf,
    #[serde(default = "default_pdf_mime_types")]
    pub mime_types: Vec<String>,
}

fn default_pdf_mime_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "application/pdf-mail".to_string(),
        "application/pdf-portfolio".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChildXrefConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NamedEntitiesConfig {
    #[serde(default = "default_true")]
    pub include_installed: bool,
    #[serde(default)]
    pub custom_types: BTreeMap<String, String>,
    #[serde(default)]
    pub validation_terms: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_identifier_type")]
    pub identifier_type: String,
}

fn default_identifier_type() -> String {
    "personal-id-num".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppendRecipientsConfig {
    #[serde(default)]
    pub from: Vec<Address>,
    #[serde(default)]
    pub to: Vec<Address>,
    #[serde(default)]
    pub cc: Vec<Address>,
    #[serde(default)]
    pub bcc: Vec<Address>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parses and validates a TOML configuration string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    for (idx, policy) in config.policies.iter().enumerate() {
        validate_policy(policy)
            .with_context(|| format!("policies[{}] ({}) is invalid", idx, policy.type_name()))?;
    }

    let wants_index = config
        .policies
        .iter()
        .any(|p| matches!(p, PolicyConfig::DigestTags(_)));
    if wants_index && config.annotations.is_none() {
        bail!("digest_tags policy requires an [annotations] section with a database path");
    }

    Ok(config)
}

fn validate_policy(policy: &PolicyConfig) -> Result<()> {
    match policy {
        PolicyConfig::ExcludeExtensions(cfg) => {
            if cfg.extensions.iter().all(|e| e.trim().is_empty()) {
                bail!("extensions must list at least one extension");
            }
        }
        PolicyConfig::ExcludeMimeTypes(cfg) => {
            if cfg.mime_types.iter().all(|m| m.trim().is_empty()) {
                bail!("mime_types must list at least one mime type");
            }
        }
        PolicyConfig::DateRanges(cfg) => validate_ranges(&cfg.ranges)?,
        PolicyConfig::DateRangesAndDomains(cfg) => validate_ranges(&cfg.ranges)?,
        PolicyConfig::CommunicationYear(cfg) => {
            if cfg.min_year > cfg.max_year {
                bail!(
                    "min_year ({}) must not be after max_year ({})",
                    cfg.min_year,
                    cfg.max_year
                );
            }
        }
        PolicyConfig::DigestTags(_) => {}
        PolicyConfig::MimeTypeTags(cfg) => {
            if cfg.tags.is_empty() {
                bail!("tags must map at least one mime type");
            }
            if let Some((mime, _)) = cfg.tags.iter().find(|(_, tag)| tag.trim().is_empty()) {
                bail!("tag for mime type '{}' is empty", mime);
            }
        }
        PolicyConfig::StoreBinaryByAncestor(cfg) => {
            if cfg.mime_types.is_empty() {
                bail!("mime_types must list at least one mime type");
            }
        }
        PolicyConfig::ParentPulldown(cfg) => {
            if cfg.container_mime_type.trim().is_empty() {
                bail!("container_mime_type must not be empty");
            }
        }
        PolicyConfig::SplitPdfPages(cfg) => {
            if cfg.mime_types.is_empty() {
                bail!("mime_types must list at least one container mime type");
            }
            if cfg.output_dir.as_os_str().is_empty() {
                bail!("output_dir must not be empty");
            }
        }
        PolicyConfig::ChildXref(cfg) => {
            if cfg.path.as_os_str().is_empty() {
                bail!("path must not be empty");
            }
        }
        PolicyConfig::NamedEntities(cfg) => {
            for (name, pattern) in &cfg.custom_types {
                regex::Regex::new(pattern)
                    .with_context(|| format!("custom entity type '{}' has an invalid pattern", name))?;
            }
        }
        PolicyConfig::AppendRecipients(cfg) => {
            let all = cfg.from.iter().chain(&cfg.to).chain(&cfg.cc).chain(&cfg.bcc);
            if let Some(bad) = all.clone().find(|a| a.address.trim().is_empty()) {
                bail!("recipient {:?} has an empty address", bad.personal);
            }
            if all.count() == 0 {
                bail!("at least one recipient must be configured");
            }
        }
    }
    Ok(())
}

fn validate_ranges(ranges: &[DateRange]) -> Result<()> {
    if ranges.is_empty() {
        bail!("ranges must contain at least one date range");
    }
    for range in ranges {
        if range.start > range.end {
            bail!(
                "date range start {} is after end {}",
                range.start.to_rfc3339(),
                range.end.to_rfc3339()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policies_in_file_order() {
        let config = parse_config(
            r#"
[[policies]]
type = "exclude_extensions"
extensions = ["plist", "cab"]

[[policies]]
type = "mime_type_tags"
tags = { "message/rfc822" = "RFC822 Email" }

[[policies]]
type = "parent_pulldown"
"#,
        )
        .unwrap();

        let names: Vec<&str> = config.policies.iter().map(|p| p.type_name()).collect();
        assert_eq!(
            names,
            vec!["exclude_extensions", "mime_type_tags", "parent_pulldown"]
        );
        match &config.policies[2] {
            PolicyConfig::ParentPulldown(cfg) => {
                assert_eq!(cfg.property_prefix, "MSG ");
                assert!(cfg.pull_digest);
            }
            other => panic!("unexpected policy: {:?}", other),
        }
    }

    #[test]
    fn parses_date_ranges_with_offsets() {
        let config = parse_config(
            r#"
[[policies]]
type = "date_ranges"
include_if_date_missing = true
ranges = [
  { start = "2017-01-01T00:00:00-07:00", end = "2017-01-10T23:59:59-07:00" },
]
"#,
        )
        .unwrap();
        match &config.policies[0] {
            PolicyConfig::DateRanges(cfg) => {
                assert!(cfg.include_if_date_missing);
                assert_eq!(cfg.ranges.len(), 1);
                assert_eq!(cfg.ranges[0].start.offset().local_minus_utc(), -7 * 3600);
            }
            other => panic!("unexpected policy: {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_date() {
        let err = parse_config(
            r#"
[[policies]]
type = "date_ranges"
ranges = [{ start = "2017-13-45", end = "2017-01-10T23:59:59-07:00" }]
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("parse"));
    }

    #[test]
    fn rejects_inverted_range() {
        let err = parse_config(
            r#"
[[policies]]
type = "date_ranges"
ranges = [{ start = "2018-01-01T00:00:00Z", end = "2017-01-01T00:00:00Z" }]
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("is after end"));
    }

    #[test]
    fn rejects_invalid_entity_pattern() {
        let err = parse_config(
            r#"
[[policies]]
type = "named_entities"
custom_types = { swift = "[A-Z" }
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("swift"));
    }

    #[test]
    fn digest_tags_requires_annotations_section() {
        let err = parse_config(
            r#"
[[policies]]
type = "digest_tags"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("[annotations]"));
    }

    #[test]
    fn rejects_unknown_policy_type() {
        assert!(parse_config(
            r#"
[[policies]]
type = "teleport"
"#,
        )
        .is_err());
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse_config(include_str!("../config/wss.example.toml")).unwrap();
        assert_eq!(config.policies.len(), 10);
        assert_eq!(config.policies[0].type_name(), "exclude_extensions");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.policies.is_empty());
        assert_eq!(config.scan.include_globs, vec!["**/*"]);
    }
}
