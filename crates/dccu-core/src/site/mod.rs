//! Site settings and audit log.
//!
//! [`SiteConsole`] owns the console-wide settings (maintenance mode,
//! announcement banner, feature flags) and the audit trail every other local
//! console writes to through [`AuditSink`].

mod audit;
mod console;
mod settings;

pub use audit::{AuditEntry, AuditSink, NullAuditSink, AUDIT_CAPACITY};
pub use console::{SiteConsole, AUDIT_KEY, SETTINGS_KEY};
pub use settings::{FeatureFlags, FeatureFlagsPatch, FeatureKey, SettingsPatch, SiteSettings};
