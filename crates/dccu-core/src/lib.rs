//! DCCU core.
//!
//! This crate holds everything that runs without the hosted backend:
//!
//! - [`security`] - Clearance policy and signed session tokens
//! - [`storage`] - Key-value persistence port with sled and in-memory stores
//! - [`site`] - Site settings, feature flags and the audit log
//! - [`ops`] - Ops task board
//! - [`vault`] - Vault of links and files
//!
//! The local consoles persist through an injected [`storage::KvStore`] and
//! report their actions to an injected [`site::AuditSink`], so they can be
//! wired to durable storage in the CLI and to memory in tests.

pub mod error;
pub mod ops;
pub mod security;
pub mod site;
pub mod storage;
pub mod vault;

pub use error::{CoreResult, Error};
pub use ops::{NewOpsTask, OpsBoard, OpsPriority, OpsStatus, OpsTask};
pub use security::{filter_visible, SecurityError, SecurityResult, SessionTokens, ViewerContext};
pub use site::{AuditEntry, AuditSink, FeatureFlags, FeatureKey, SiteConsole, SiteSettings};
pub use storage::{KvStore, MemoryStore, SledStore};
pub use vault::{NewVaultItem, Vault, VaultItem, VaultKind};

/// Re-export data model types.
pub use dccu_proto as proto;
