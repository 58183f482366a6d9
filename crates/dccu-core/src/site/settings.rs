//! Site settings and feature flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Console sections that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKey {
    Ops,
    Vault,
    Monitor,
    Dccu,
    Creator,
}

impl FeatureKey {
    /// All feature keys.
    pub const ALL: [FeatureKey; 5] = [
        FeatureKey::Ops,
        FeatureKey::Vault,
        FeatureKey::Monitor,
        FeatureKey::Dccu,
        FeatureKey::Creator,
    ];

    /// Wire name of the key.
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKey::Ops => "ops",
            FeatureKey::Vault => "vault",
            FeatureKey::Monitor => "monitor",
            FeatureKey::Dccu => "dccu",
            FeatureKey::Creator => "creator",
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidData(format!("unknown feature '{}'", s)))
    }
}

/// Feature flags; every flag defaults to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub ops: bool,
    pub vault: bool,
    pub monitor: bool,
    pub dccu: bool,
    pub creator: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            ops: true,
            vault: true,
            monitor: true,
            dccu: true,
            creator: true,
        }
    }
}

impl FeatureFlags {
    /// Read a flag.
    pub fn get(&self, key: FeatureKey) -> bool {
        match key {
            FeatureKey::Ops => self.ops,
            FeatureKey::Vault => self.vault,
            FeatureKey::Monitor => self.monitor,
            FeatureKey::Dccu => self.dccu,
            FeatureKey::Creator => self.creator,
        }
    }

    /// Write a flag.
    pub fn set(&mut self, key: FeatureKey, value: bool) {
        let slot = match key {
            FeatureKey::Ops => &mut self.ops,
            FeatureKey::Vault => &mut self.vault,
            FeatureKey::Monitor => &mut self.monitor,
            FeatureKey::Dccu => &mut self.dccu,
            FeatureKey::Creator => &mut self.creator,
        };
        *slot = value;
    }

    /// Apply the flags present in a patch.
    pub fn apply(&mut self, patch: &FeatureFlagsPatch) {
        for key in FeatureKey::ALL {
            if let Some(value) = patch.get(key) {
                self.set(key, value);
            }
        }
    }
}

/// Partial feature flag update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlagsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dccu: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<bool>,
}

impl FeatureFlagsPatch {
    fn get(&self, key: FeatureKey) -> Option<bool> {
        match key {
            FeatureKey::Ops => self.ops,
            FeatureKey::Vault => self.vault,
            FeatureKey::Monitor => self.monitor,
            FeatureKey::Dccu => self.dccu,
            FeatureKey::Creator => self.creator,
        }
    }
}

/// Console-wide settings.
///
/// Fields missing from a persisted document take their defaults, so older
/// documents load cleanly after new settings are added.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Maintenance mode.
    pub maintenance: bool,
    /// Banner text shown to every viewer.
    pub announcement: String,
    /// Section toggles.
    pub features: FeatureFlags,
}

impl SiteSettings {
    /// Apply a partial update. Feature flags merge field by field.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(maintenance) = patch.maintenance {
            self.maintenance = maintenance;
        }
        if let Some(announcement) = &patch.announcement {
            self.announcement = announcement.clone();
        }
        if let Some(features) = &patch.features {
            self.features.apply(features);
        }
    }
}

/// Partial settings update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureFlagsPatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SiteSettings::default();
        assert!(!settings.maintenance);
        assert!(settings.announcement.is_empty());
        assert!(FeatureKey::ALL.iter().all(|k| settings.features.get(*k)));
    }

    #[test]
    fn test_partial_document_merges_defaults() {
        let settings: SiteSettings =
            serde_json::from_str(r#"{"announcement":"Curfew at 22:00","features":{"vault":false}}"#)
                .unwrap();
        assert_eq!(settings.announcement, "Curfew at 22:00");
        assert!(!settings.maintenance);
        assert!(!settings.features.vault);
        assert!(settings.features.ops);
        assert!(settings.features.creator);
    }

    #[test]
    fn test_patch_merges_features() {
        let mut settings = SiteSettings::default();
        settings.apply(&SettingsPatch {
            maintenance: Some(true),
            features: Some(FeatureFlagsPatch {
                monitor: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert!(settings.maintenance);
        assert!(!settings.features.monitor);
        assert!(settings.features.ops);
        assert!(settings.announcement.is_empty());
    }

    #[test]
    fn test_feature_key_parse() {
        assert_eq!("DCCU".parse::<FeatureKey>().unwrap(), FeatureKey::Dccu);
        assert!("radar".parse::<FeatureKey>().is_err());
    }
}
