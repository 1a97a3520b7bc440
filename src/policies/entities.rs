//! Named entity scanning with term gating and identifier normalization.
//!
//! Installed entity types are merged with custom patterns from config into
//! one table. Item text is scanned with every type; types that have
//! validation terms only survive when the text mentions one of the terms,
//! and identifier values are rewritten into the dashed `AAA-BB-CCCC` form.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::NamedEntitiesConfig;
use crate::effects::{Effect, WorkerItem};
use crate::models::Entity;
use crate::traits::Policy;

/// Entity types available without any configuration.
pub const INSTALLED_ENTITY_TYPES: &[(&str, &str)] = &[
    ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("ip-address", r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
    ("personal-id-num", r"\b\d{3}[- ]?\d{2}[- ]?\d{4}\b"),
    ("phone-number", r"(?:\(\d{3}\)\s?|\b\d{3}[-. ])\d{3}[-. ]\d{4}\b"),
    ("url", r#"\bhttps?://[^\s<>"']+"#),
];

/// Rewrites an identifier into dashed form.
///
/// Values that already contain a dash are kept; nine bare characters become
/// `3-2-4`; anything else has its spaces turned into dashes.
pub fn normalize_identifier(value: &str) -> String {
    if value.contains('-') {
        return value.to_string();
    }
    if value.chars().count() == 9 {
        let chars: Vec<char> = value.chars().collect();
        let part = |r: std::ops::Range<usize>| chars[r].iter().collect::<String>();
        return format!("{}-{}-{}", part(0..3), part(3..5), part(5..9));
    }
    value.replace(' ', "-")
}

pub struct NamedEntities {
    entity_types: BTreeMap<String, Regex>,
    validation_terms: BTreeMap<String, Vec<String>>,
    identifier_type: String,
}

impl NamedEntities {
    pub fn from_config(cfg: &NamedEntitiesConfig) -> Result<Self> {
        let mut entity_types = BTreeMap::new();
        if cfg.include_installed {
            for (name, pattern) in INSTALLED_ENTITY_TYPES {
                entity_types.insert(name.to_string(), Regex::new(pattern)?);
            }
        }
        // Custom types override installed ones with the same name.
        for (name, pattern) in &cfg.custom_types {
            let regex = Regex::new(pattern)
                .with_context(|| format!("Invalid pattern for entity type '{}'", name))?;
            entity_types.insert(name.clone(), regex);
        }
        Ok(Self {
            entity_types,
            validation_terms: cfg.validation_terms.clone(),
            identifier_type: cfg.identifier_type.clone(),
        })
    }

    pub fn entity_type_names(&self) -> Vec<&str> {
        self.entity_types.keys().map(String::as_str).collect()
    }

    /// Every match of every entity type, grouped by type name.
    pub fn scan(&self, text: &str) -> Vec<Entity> {
        self.entity_types
            .iter()
            .flat_map(|(name, regex)| {
                regex
                    .find_iter(text)
                    .map(move |m| Entity::new(name, m.as_str()))
            })
            .collect()
    }

    /// Types whose validation terms appear in `text`.
    fn gated_types_present(&self, text: &str) -> Vec<&str> {
        self.validation_terms
            .iter()
            .filter(|(_, terms)| terms.iter().any(|term| text.contains(term.as_str())))
            .map(|(entity_type, _)| entity_type.as_str())
            .collect()
    }

    /// Filters and normalizes scanned entities against the item text.
    pub fn validate(&self, text: &str, matches: Vec<Entity>) -> Vec<Entity> {
        let valid_for = self.gated_types_present(text);
        matches
            .into_iter()
            .filter(|entity| {
                !self.validation_terms.contains_key(&entity.entity_type)
                    || valid_for.contains(&entity.entity_type.as_str())
            })
            .map(|entity| {
                if entity.entity_type == self.identifier_type {
                    Entity {
                        value: normalize_identifier(&entity.value),
                        ..entity
                    }
                } else {
                    entity
                }
            })
            .collect()
    }
}

#[async_trait]
impl Policy for NamedEntities {
    fn name(&self) -> &str {
        "named_entities"
    }

    fn description(&self) -> String {
        format!(
            "extract entity types: {}",
            self.entity_type_names().join(", ")
        )
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let Some(text) = item.source_item().text() else {
            return Ok(Vec::new());
        };
        let matches = self.scan(text);
        debug!(item = %item.source_item().guid, matches = matches.len(), "Scanned item text");
        if matches.is_empty() {
            return Ok(Vec::new());
        }
        let entities = self.validate(text, matches);
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Effect::AddEntities(entities)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;

    fn policy() -> NamedEntities {
        let mut custom_types = BTreeMap::new();
        custom_types.insert(
            "swift".to_string(),
            r"\b[A-Z]{6}[0-9A-Z]{2}([0-9A-Z]{3})?\b".to_string(),
        );
        let mut validation_terms = BTreeMap::new();
        validation_terms.insert(
            "phone-number".to_string(),
            vec!["phone".to_string(), "mobile".to_string(), "call".to_string()],
        );
        NamedEntities::from_config(&NamedEntitiesConfig {
            include_installed: true,
            custom_types,
            validation_terms,
            identifier_type: "personal-id-num".to_string(),
        })
        .unwrap()
    }

    fn values_of<'a>(entities: &'a [Entity], entity_type: &str) -> Vec<&'a str> {
        entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .map(|e| e.value.as_str())
            .collect()
    }

    #[test]
    fn identifier_normalization() {
        assert_eq!(normalize_identifier("123456789"), "123-45-6789");
        assert_eq!(normalize_identifier("123 45 6789"), "123-45-6789");
        assert_eq!(normalize_identifier("123-45-6789"), "123-45-6789");
        assert_eq!(normalize_identifier("123-45 6789"), "123-45 6789");
    }

    #[test]
    fn custom_types_merge_with_installed() {
        let policy = policy();
        let names = policy.entity_type_names();
        assert!(names.contains(&"swift"));
        assert!(names.contains(&"email"));
        assert!(names.contains(&"personal-id-num"));
    }

    #[tokio::test]
    async fn phone_numbers_need_a_gating_term() {
        let policy = policy();

        let mut quiet = Item::new("g", "a.txt", "text/plain");
        quiet.text = Some("Reach 555-867-5309 or jenny@example.com".into());
        let effects = policy.evaluate(&WorkerItem::new(quiet)).await.unwrap();
        let Effect::AddEntities(found) = &effects[0] else {
            panic!("expected AddEntities");
        };
        assert!(values_of(found, "phone-number").is_empty());
        assert_eq!(values_of(found, "email"), vec!["jenny@example.com"]);

        let mut gated = Item::new("g", "b.txt", "text/plain");
        gated.text = Some("Please call 555-867-5309".into());
        let effects = policy.evaluate(&WorkerItem::new(gated)).await.unwrap();
        let Effect::AddEntities(found) = &effects[0] else {
            panic!("expected AddEntities");
        };
        assert_eq!(values_of(found, "phone-number"), vec!["555-867-5309"]);
    }

    #[tokio::test]
    async fn gating_terms_are_case_sensitive() {
        let mut item = Item::new("g", "a.txt", "text/plain");
        item.text = Some("PHONE 555-867-5309".into());
        let effects = policy().evaluate(&WorkerItem::new(item)).await.unwrap();
        assert!(effects.is_empty());
    }

    #[tokio::test]
    async fn identifiers_are_normalized_and_swift_codes_found() {
        let mut item = Item::new("g", "a.txt", "text/plain");
        item.text = Some("SSN 123456789 and 987 65 4321, wire via DEUTDEFF500".into());
        let effects = policy().evaluate(&WorkerItem::new(item)).await.unwrap();
        let Effect::AddEntities(found) = &effects[0] else {
            panic!("expected AddEntities");
        };
        assert_eq!(
            values_of(found, "personal-id-num"),
            vec!["123-45-6789", "987-65-4321"]
        );
        assert_eq!(values_of(found, "swift"), vec!["DEUTDEFF500"]);
    }

    #[tokio::test]
    async fn items_without_text_are_skipped() {
        let item = Item::new("g", "a.bin", "application/octet-stream");
        assert!(policy().evaluate(&WorkerItem::new(item)).await.unwrap().is_empty());
    }
}
