//! Viewer session.

use serde::{Deserialize, Serialize};

use crate::clearance::ClearanceLevel;

/// The current viewer: a display identifier and a clearance level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Display identifier shown in audit entries.
    pub codename: String,
    /// Clearance level of the viewer.
    pub level: ClearanceLevel,
}

impl Session {
    /// Create a new session.
    pub fn new(codename: impl Into<String>, level: ClearanceLevel) -> Self {
        Self {
            codename: codename.into(),
            level,
        }
    }

    /// Clearance of an optional session, DELTA when absent.
    pub fn level_of(session: Option<&Session>) -> ClearanceLevel {
        session.map(|s| s.level).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_of_absent_session() {
        assert_eq!(Session::level_of(None), ClearanceLevel::Delta);

        let session = Session::new("nightwing", ClearanceLevel::Gamma);
        assert_eq!(Session::level_of(Some(&session)), ClearanceLevel::Gamma);
    }
}
