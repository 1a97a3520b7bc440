//! Effects a policy may request, and the per-item state they are applied to.
//!
//! Policies never touch the item directly. They return a list of [`Effect`]s
//! and the worker applies them onto a [`WorkerItem`], which is turned into an
//! [`ItemOutcome`] for the host once every policy has run.

use serde::Serialize;
use std::path::PathBuf;

use crate::models::{Communication, Entity, Item, Properties};

/// A single mutation requested by a policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Include (`true`) or exclude (`false`) the item from processing.
    SetProcess(bool),
    AddTag(String),
    /// Replace the item's property map as a whole.
    SetProperties(Properties),
    ReplaceCommunication(Communication),
    /// Replace the item's child list.
    SetChildren(Vec<PathBuf>),
    SetStoreBinary(bool),
    AddEntities(Vec<Entity>),
}

/// Mutable handle for one callback invocation.
#[derive(Debug, Clone)]
pub struct WorkerItem {
    item: Item,
    process: bool,
    store_binary: Option<bool>,
    tags: Vec<String>,
    properties: Option<Properties>,
    communication: Option<Communication>,
    children: Option<Vec<PathBuf>>,
    entities: Vec<Entity>,
    failures: Vec<String>,
}

impl WorkerItem {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            process: true,
            store_binary: None,
            tags: Vec::new(),
            properties: None,
            communication: None,
            children: None,
            entities: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn source_item(&self) -> &Item {
        &self.item
    }

    pub fn process(&self) -> bool {
        self.process
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Current property map: the last map set by a policy, else the item's own.
    pub fn properties(&self) -> &Properties {
        self.properties.as_ref().unwrap_or(&self.item.properties)
    }

    /// Current communication: the replacement if one was set, else the item's.
    pub fn communication(&self) -> Option<&Communication> {
        self.communication
            .as_ref()
            .or(self.item.communication.as_ref())
    }

    pub fn children(&self) -> Option<&[PathBuf]> {
        self.children.as_deref()
    }

    pub fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::SetProcess(process) => self.process = process,
            Effect::AddTag(tag) => {
                if !self.tags.contains(&tag) {
                    self.tags.push(tag);
                }
            }
            Effect::SetProperties(properties) => self.properties = Some(properties),
            Effect::ReplaceCommunication(communication) => {
                self.communication = Some(communication)
            }
            Effect::SetChildren(children) => self.children = Some(children),
            Effect::SetStoreBinary(store) => self.store_binary = Some(store),
            Effect::AddEntities(entities) => self.entities.extend(entities),
        }
    }

    pub fn record_failure(&mut self, policy: &str, message: String) {
        self.failures.push(format!("{}: {}", policy, message));
    }

    pub fn into_outcome(self) -> ItemOutcome {
        ItemOutcome {
            guid: self.item.guid,
            process: self.process,
            store_binary: self.store_binary,
            tags: self.tags,
            properties: self.properties,
            communication: self.communication,
            children: self.children,
            entities: self.entities,
            failures: self.failures,
        }
    }
}

/// What the host receives back for one item.
///
/// Fields left as `None` were not touched by any policy and keep the host's
/// default behavior.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub guid: String,
    pub process: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_binary: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communication: Option<Communication>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl ItemOutcome {
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }
}
