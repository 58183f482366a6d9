//! DCCU data model.
//!
//! This crate defines the types exchanged between the console and the hosted
//! backend: clearance levels, table names, sessions, entity records and
//! change notifications.
//!
//! # Modules
//!
//! - [`clearance`] - The four-tier clearance order
//! - [`table`] - Backend table names
//! - [`session`] - Viewer session
//! - [`record`] - The `Record` trait and the untyped [`Row`]
//! - [`entity`] - Typed entity records with insert drafts and patches
//! - [`change`] - Push-change notifications
//! - [`error`] - Data model error types
//!
//! # Example
//!
//! ```ignore
//! use dccu_proto::{ClearanceLevel, Session};
//!
//! let session = Session::new("oracle", ClearanceLevel::Beta);
//! assert!(ClearanceLevel::Gamma <= session.level);
//! ```

pub mod change;
pub mod clearance;
pub mod entity;
pub mod error;
pub mod record;
pub mod session;
pub mod table;

pub use error::Error;

// Re-export commonly used types at crate root
pub use change::{ChangeEvent, ChangeType};
pub use clearance::ClearanceLevel;
pub use entity::{
    Character, CharacterPatch, Location, LocationPatch, Module, ModulePatch, Movie, MoviePatch,
    NewCharacter, NewLocation, NewModule, NewMovie, NewTechnology, Technology, TechnologyPatch,
};
pub use record::{Entity, Record, Row};
pub use session::Session;
pub use table::TableName;

/// Name of the field every record carries its clearance level in.
pub const CLEARANCE_FIELD: &str = "clearance_level";

/// Name of the field records are ordered by, newest first.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Name of the field stamped on every update.
pub const UPDATED_AT_FIELD: &str = "updated_at";
