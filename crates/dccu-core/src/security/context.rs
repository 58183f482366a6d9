//! Viewer context that gates reads and writes.

use dccu_proto::{ClearanceLevel, Session};

use super::error::{SecurityError, SecurityResult};

/// Codename reported for actions taken without a session.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Level required for any data modification.
pub const WRITE_LEVEL: ClearanceLevel = ClearanceLevel::Alpha;

/// The viewer on whose behalf an operation runs.
///
/// Built from an optional session; an absent session is treated as DELTA.
/// The context is re-derived for every operation rather than cached, so a
/// session change takes effect on the next fetch or mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerContext {
    session: Option<Session>,
}

impl ViewerContext {
    /// Create a context for an optional session.
    pub fn new(session: Option<Session>) -> Self {
        Self { session }
    }

    /// Create a context for a signed-in session.
    pub fn for_session(session: Session) -> Self {
        Self::new(Some(session))
    }

    /// Create a context with no session.
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// The underlying session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether a session is present.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Effective clearance level.
    pub fn level(&self) -> ClearanceLevel {
        Session::level_of(self.session.as_ref())
    }

    /// Actor name for audit entries.
    pub fn codename(&self) -> &str {
        self.session
            .as_ref()
            .map(|s| s.codename.as_str())
            .unwrap_or(SYSTEM_ACTOR)
    }

    /// Check if the viewer may see a row at the given level.
    pub fn can_view(&self, row_level: ClearanceLevel) -> bool {
        self.level().dominates(row_level)
    }

    /// Check if the viewer may insert, update or delete.
    pub fn can_modify(&self) -> bool {
        self.level() == WRITE_LEVEL
    }

    /// Require modification rights or return an error.
    pub fn require_modify(&self, operation: &str) -> SecurityResult<()> {
        if self.can_modify() {
            Ok(())
        } else {
            Err(SecurityError::InsufficientClearance {
                operation: operation.to_string(),
                required: WRITE_LEVEL,
                actual: self.level(),
            })
        }
    }
}
