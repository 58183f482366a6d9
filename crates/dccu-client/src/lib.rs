//! DCCU client.
//!
//! Clearance-filtered access to the hosted backend tables.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dccu_client::{ClientConfig, SupabaseBackend, TableView};
//! use dccu_proto::{ClearanceLevel, Movie, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dccu_client::Error> {
//!     let backend = Arc::new(SupabaseBackend::new(ClientConfig::from_env()?)?);
//!     let session = Session::new("oracle", ClearanceLevel::Beta);
//!
//!     let movies: TableView<Movie, _> = TableView::new(backend, Some(session));
//!     movies.mount().await?;
//!
//!     for movie in movies.rows() {
//!         println!("{} ({})", movie.title, movie.year);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod view;

pub use backend::{Backend, ChangeFeed, MemoryBackend, SupabaseBackend};
pub use config::ClientConfig;
pub use error::{BackendError, BackendResult, ClientResult, Error};
pub use view::{TableView, ViewPhase, ViewSnapshot};

/// Re-export data model types.
pub use dccu_proto as proto;
