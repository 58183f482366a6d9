//! Vault of saved links and files.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::site::AuditSink;
use crate::storage::{generate_id, load_json, now_millis, save_json, KvStore};

/// Storage key for vault items.
pub const VAULT_KEY: &str = "bat_vault_items_v1";

/// Kind of vault item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultKind {
    /// A URL.
    Link,
    /// Inline file content.
    File,
}

impl VaultKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            VaultKind::Link => "link",
            VaultKind::File => "file",
        }
    }
}

impl std::fmt::Display for VaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: VaultKind,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64 file content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Epoch milliseconds.
    pub added_at: i64,
}

/// Fields supplied when adding an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVaultItem {
    pub kind: VaultKind,
    pub title: String,
    pub tags: Vec<String>,
    pub url: Option<String>,
    pub data: Option<String>,
    pub mime: Option<String>,
}

impl NewVaultItem {
    /// A link item.
    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: VaultKind::Link,
            title: title.into(),
            tags: Vec::new(),
            url: Some(url.into()),
            data: None,
            mime: None,
        }
    }

    /// A file item with base64 content.
    pub fn file(title: impl Into<String>, data: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            kind: VaultKind::File,
            title: title.into(),
            tags: Vec::new(),
            url: None,
            data: Some(data.into()),
            mime: Some(mime.into()),
        }
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// The vault.
pub struct Vault {
    store: Arc<dyn KvStore>,
    audit: Arc<dyn AuditSink>,
    items: RwLock<Vec<VaultItem>>,
}

impl Vault {
    /// Load the vault from the store.
    pub fn open(store: Arc<dyn KvStore>, audit: Arc<dyn AuditSink>) -> Self {
        let items: Vec<VaultItem> = load_json(store.as_ref(), VAULT_KEY);
        Self {
            store,
            audit,
            items: RwLock::new(items),
        }
    }

    /// All items, newest first.
    pub fn items(&self) -> Vec<VaultItem> {
        self.items.read().clone()
    }

    /// Items carrying the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Vec<VaultItem> {
        self.items
            .read()
            .iter()
            .filter(|i| i.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .cloned()
            .collect()
    }

    /// Add an item at the front.
    pub fn add(&self, draft: NewVaultItem) -> CoreResult<VaultItem> {
        let item = VaultItem {
            id: generate_id(),
            kind: draft.kind,
            title: draft.title,
            tags: draft.tags,
            url: draft.url,
            data: draft.data,
            mime: draft.mime,
            added_at: now_millis(),
        };

        self.mutate(|items| items.insert(0, item.clone()))?;
        self.audit.log("vault.add", Some(&item.title));
        Ok(item)
    }

    /// Replace an item by id. The added time is kept as given.
    pub fn update(&self, item: VaultItem) -> CoreResult<()> {
        let title = item.title.clone();
        self.mutate(|items| {
            if let Some(slot) = items.iter_mut().find(|i| i.id == item.id) {
                *slot = item;
            }
        })?;
        self.audit.log("vault.update", Some(&title));
        Ok(())
    }

    /// Remove an item by id.
    pub fn remove(&self, id: &str) -> CoreResult<()> {
        self.mutate(|items| items.retain(|i| i.id != id))?;
        self.audit.log("vault.remove", Some(id));
        Ok(())
    }

    fn mutate<F>(&self, f: F) -> CoreResult<()>
    where
        F: FnOnce(&mut Vec<VaultItem>),
    {
        let snapshot = {
            let mut items = self.items.write();
            f(&mut items);
            items.clone()
        };
        save_json(self.store.as_ref(), VAULT_KEY, &snapshot)
    }
}
