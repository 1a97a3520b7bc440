//! Core data models used throughout the worker.
//!
//! An [`Item`] is the read-only view of one unit of content handed to the
//! worker by the host. Every accessor here is a pure function of the item;
//! mutation happens through [`WorkerItem`](crate::effects::WorkerItem).

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Property map carried by an item (key → JSON value).
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Kind reported for communication-bearing items.
pub const KIND_EMAIL: &str = "email";

/// Mime types treated as email when an item carries no explicit kind.
const EMAIL_MIME_TYPES: &[&str] = &[
    "message/rfc822",
    "application/vnd.ms-outlook-note",
    "application/vnd.ms-outlook-msg",
    "application/vnd.lotus-notes-document",
    "application/vnd.hp-trim-email",
];

/// One unit of content as presented by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub top_level: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub communication: Option<Communication>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub parent: Option<Box<Item>>,
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
}

impl Item {
    /// Minimal item with the given GUID, name and mime type.
    pub fn new(guid: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            kind: None,
            digest: None,
            size: None,
            date: None,
            top_level: false,
            text: None,
            communication: None,
            properties: Properties::new(),
            parent: None,
            binary_path: None,
        }
    }

    pub fn parent(&self) -> Option<&Item> {
        self.parent.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref().filter(|d| !d.is_empty())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn communication(&self) -> Option<&Communication> {
        self.communication.as_ref()
    }

    /// Item kind, inferred from the mime type when the host did not supply one.
    pub fn kind(&self) -> &str {
        if let Some(kind) = self.kind.as_deref() {
            return kind;
        }
        if EMAIL_MIME_TYPES.contains(&self.mime_type.as_str()) {
            KIND_EMAIL
        } else {
            "other"
        }
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind().eq_ignore_ascii_case(kind)
    }

    /// Ancestor chain ordered root to self (inclusive).
    pub fn path(&self) -> Vec<&Item> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(item) = current {
            chain.push(item);
            current = item.parent();
        }
        chain.reverse();
        chain
    }

    /// Reads the item's binary through the path the host exposed.
    pub fn read_binary(&self) -> Result<Vec<u8>> {
        let path = self
            .binary_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("item {} has no binary available", self.guid))?;
        std::fs::read(path).with_context(|| format!("Failed to read binary: {}", path.display()))
    }

    /// Name without its final extension.
    pub fn base_name(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Email address participating in a communication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub personal: Option<String>,
    pub address: String,
}

impl Address {
    pub fn new(personal: Option<&str>, address: &str) -> Self {
        Self {
            personal: personal.map(str::to_string),
            address: address.to_string(),
        }
    }
}

/// Message envelope attached to an item.
///
/// Never mutated in place: policies that want a different envelope build a
/// new one with [`Communication::to_builder`] and substitute it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Communication {
    #[serde(default)]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub from: Vec<Address>,
    #[serde(default)]
    pub to: Vec<Address>,
    #[serde(default)]
    pub cc: Vec<Address>,
    #[serde(default)]
    pub bcc: Vec<Address>,
}

impl Communication {
    pub fn date_time(&self) -> Option<DateTime<FixedOffset>> {
        self.date_time
    }

    pub fn from(&self) -> &[Address] {
        &self.from
    }

    pub fn to(&self) -> &[Address] {
        &self.to
    }

    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    /// Start a replacement envelope seeded with a copy of this one.
    pub fn to_builder(&self) -> CommunicationBuilder {
        CommunicationBuilder {
            inner: self.clone(),
        }
    }
}

/// Builds a replacement [`Communication`].
#[derive(Debug, Clone)]
pub struct CommunicationBuilder {
    inner: Communication,
}

impl CommunicationBuilder {
    pub fn add_from(mut self, address: Address) -> Self {
        self.inner.from.push(address);
        self
    }

    pub fn add_to(mut self, address: Address) -> Self {
        self.inner.to.push(address);
        self
    }

    pub fn add_cc(mut self, address: Address) -> Self {
        self.inner.cc.push(address);
        self
    }

    pub fn add_bcc(mut self, address: Address) -> Self {
        self.inner.bcc.push(address);
        self
    }

    pub fn build(self) -> Communication {
        self.inner
    }
}

/// A named entity found in item text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub value: String,
}

impl Entity {
    pub fn new(entity_type: &str, value: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_runs_root_to_self() {
        let root = Item::new("root", "box.pst", "application/vnd.ms-outlook");
        let mut mail = Item::new("mail", "hello.msg", "application/vnd.ms-outlook-msg");
        mail.parent = Some(Box::new(root));
        let mut attachment = Item::new("att", "report.pdf", "application/pdf");
        attachment.parent = Some(Box::new(mail));

        let guids: Vec<&str> = attachment.path().iter().map(|i| i.guid.as_str()).collect();
        assert_eq!(guids, vec!["root", "mail", "att"]);
    }

    #[test]
    fn kind_inferred_from_mime_type() {
        let mail = Item::new("a", "m.eml", "message/rfc822");
        assert!(mail.is_kind("email"));

        let mut doc = Item::new("b", "d.txt", "text/plain");
        assert!(!doc.is_kind("email"));
        doc.kind = Some("Email".into());
        assert!(doc.is_kind("email"));
    }

    #[test]
    fn empty_digest_reads_as_absent() {
        let mut item = Item::new("a", "x", "text/plain");
        item.digest = Some(String::new());
        assert_eq!(item.digest(), None);
    }

    #[test]
    fn builder_leaves_original_untouched() {
        let original = Communication {
            date_time: None,
            from: vec![Address::new(None, "a@example.com")],
            to: vec![],
            cc: vec![],
            bcc: vec![],
        };
        let replaced = original
            .to_builder()
            .add_bcc(Address::new(Some("Bob"), "bob@company.com"))
            .build();
        assert!(original.bcc().is_empty());
        assert_eq!(replaced.bcc().len(), 1);
        assert_eq!(replaced.from(), original.from());
    }

    #[test]
    fn base_name_strips_extension() {
        let item = Item::new("a", "Quarterly Report.pdf", "application/pdf");
        assert_eq!(item.base_name(), "Quarterly Report");
    }
}
