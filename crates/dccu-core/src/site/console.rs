//! Site console: settings plus audit trail.

use std::sync::Arc;

use parking_lot::RwLock;

use dccu_proto::Session;

use crate::error::CoreResult;
use crate::security::ViewerContext;
use crate::storage::{generate_id, load_json, now_millis, save_json, KvStore};

use super::audit::{truncate_to_capacity, AuditEntry, AuditSink};
use super::settings::{FeatureKey, SettingsPatch, SiteSettings};

/// Storage key for site settings.
pub const SETTINGS_KEY: &str = "bat_site_settings_v1";

/// Storage key for the audit log.
pub const AUDIT_KEY: &str = "bat_site_audit_v1";

const ANNOUNCEMENT_LOG_CHARS: usize = 120;

/// Settings and audit log persisted to a local store.
pub struct SiteConsole {
    store: Arc<dyn KvStore>,
    settings: RwLock<SiteSettings>,
    audit: RwLock<Vec<AuditEntry>>,
    viewer: RwLock<ViewerContext>,
}

impl SiteConsole {
    /// Load the console from the store, with no session attached.
    pub fn open(store: Arc<dyn KvStore>) -> Self {
        let settings: SiteSettings = load_json(store.as_ref(), SETTINGS_KEY);
        let mut audit: Vec<AuditEntry> = load_json(store.as_ref(), AUDIT_KEY);
        truncate_to_capacity(&mut audit);

        tracing::debug!(audit_entries = audit.len(), "site console loaded");

        Self {
            store,
            settings: RwLock::new(settings),
            audit: RwLock::new(audit),
            viewer: RwLock::new(ViewerContext::anonymous()),
        }
    }

    /// Set the session whose codename is recorded as the audit actor.
    pub fn set_session(&self, session: Option<Session>) {
        *self.viewer.write() = ViewerContext::new(session);
    }

    /// Current settings.
    pub fn settings(&self) -> SiteSettings {
        self.settings.read().clone()
    }

    /// Current audit log, oldest first.
    pub fn audit(&self) -> Vec<AuditEntry> {
        self.audit.read().clone()
    }

    /// Apply a partial settings update.
    pub fn update_settings(&self, patch: &SettingsPatch) -> CoreResult<SiteSettings> {
        let next = {
            let mut settings = self.settings.write();
            settings.apply(patch);
            settings.clone()
        };
        save_json(self.store.as_ref(), SETTINGS_KEY, &next)?;
        Ok(next)
    }

    /// Set a feature flag, or flip it when `value` is `None`.
    pub fn toggle_feature(&self, key: FeatureKey, value: Option<bool>) -> CoreResult<bool> {
        let (enabled, next) = {
            let mut settings = self.settings.write();
            let enabled = value.unwrap_or(!settings.features.get(key));
            settings.features.set(key, enabled);
            (enabled, settings.clone())
        };
        save_json(self.store.as_ref(), SETTINGS_KEY, &next)?;
        self.log("feature.toggle", Some(key.as_str()));
        Ok(enabled)
    }

    /// Replace the announcement banner.
    pub fn set_announcement(&self, text: &str) -> CoreResult<()> {
        let next = {
            let mut settings = self.settings.write();
            settings.announcement = text.to_string();
            settings.clone()
        };
        save_json(self.store.as_ref(), SETTINGS_KEY, &next)?;

        let summary: String = text.chars().take(ANNOUNCEMENT_LOG_CHARS).collect();
        self.log("announcement.set", Some(&summary));
        Ok(())
    }

    /// Switch maintenance mode.
    pub fn set_maintenance(&self, on: bool) -> CoreResult<()> {
        let next = {
            let mut settings = self.settings.write();
            settings.maintenance = on;
            settings.clone()
        };
        save_json(self.store.as_ref(), SETTINGS_KEY, &next)?;
        self.log(if on { "maintenance.on" } else { "maintenance.off" }, None);
        Ok(())
    }

    /// Empty the audit log. The clear itself is recorded as the first new entry.
    pub fn clear_audit(&self) -> CoreResult<()> {
        self.audit.write().clear();
        save_json(self.store.as_ref(), AUDIT_KEY, &Vec::<AuditEntry>::new())?;
        self.log("audit.clear", None);
        Ok(())
    }

    fn append(&self, entry: AuditEntry) -> CoreResult<()> {
        let snapshot = {
            let mut audit = self.audit.write();
            audit.push(entry);
            truncate_to_capacity(&mut audit);
            audit.clone()
        };
        save_json(self.store.as_ref(), AUDIT_KEY, &snapshot)
    }
}

impl AuditSink for SiteConsole {
    fn log(&self, action: &str, details: Option<&str>) {
        let entry = AuditEntry {
            id: generate_id(),
            ts: now_millis(),
            actor: self.viewer.read().codename().to_string(),
            action: action.to_string(),
            details: details.map(str::to_string),
        };

        tracing::info!(actor = %entry.actor, action, details = ?details, "audit");

        if let Err(e) = self.append(entry) {
            tracing::warn!(action, error = %e, "failed to persist audit entry");
        }
    }
}

impl std::fmt::Debug for SiteConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteConsole")
            .field("settings", &*self.settings.read())
            .field("audit_entries", &self.audit.read().len())
            .finish()
    }
}
