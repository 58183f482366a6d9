//! Client-side clearance policy.
//!
//! Access is decided per viewer from a single clearance level:
//! - A row is visible iff its clearance ranks at or below the viewer's
//! - Inserts, updates and deletes require ALPHA
//!
//! Enforcement happens in the client only. The backend is not consulted, so
//! the policy is a presentation filter rather than a security boundary.
//!
//! # Example
//!
//! ```ignore
//! use dccu_core::security::{filter_visible, ViewerContext};
//! use dccu_proto::{ClearanceLevel, Session};
//!
//! let viewer = ViewerContext::new(Some(Session::new("oracle", ClearanceLevel::Beta)));
//! let visible = filter_visible(&viewer, rows);
//! viewer.require_modify("insert")?; // fails: BETA cannot write
//! ```

pub mod context;
pub mod error;
pub mod policy;
pub mod token;

pub use context::ViewerContext;
pub use error::{SecurityError, SecurityResult};
pub use policy::{filter_visible, is_visible};
pub use token::{SessionClaims, SessionTokens};
