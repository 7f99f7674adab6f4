//! An identity-mapped, change-tracked object-document mapper over
//! MongoDB.
//!
//! A [`RepositoryContext`] owns one [`mongorm_tracking::StateManager`] per
//! tracked document type (each implementing [`mongorm_core::Document`] and
//! [`mongorm_core::DocumentFields`], typically via `#[derive(Document)]`
//! from `mongorm-macros`). Fetching a document through a
//! [`document_set::DocumentSet`] decodes it through the identity-preserving
//! path in `mongorm-serde`, so two fetches of the same `_id` within one
//! context always yield the same `Arc`. Edits flow through the document's
//! own controlled setters, which notify the state manager directly; no
//! proxy or dynamic dispatch sits between a setter and its notification.
//! `save_changes`/`save_all` group dirty entries by state and flush them
//! through `mongorm-wire`'s bulk command builders.
//!
//! ```no_run
//! use mongorm::{MongormConfig, RepositoryContext};
//!
//! # async fn run() -> mongorm::error::Result<()> {
//! let config = MongormConfig::from_toml_str(
//!     r#"
//!     mongo_uri = "mongodb://localhost:27017"
//!     database = "example"
//!     "#,
//! )
//! .expect("valid config");
//! let context = RepositoryContext::connect(config).await?;
//! context.save_all().await?;
//! context.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod context;
pub mod document_set;
pub mod entries;
pub mod error;
pub mod statistics;

pub use cancel::CancelToken;
pub use config::MongormConfig;
pub use context::RepositoryContext;
pub use document_set::DocumentSet;
pub use entries::{CollectionEntry, PropertyEntry, ReferenceEntry};
pub use error::{MongormError, Result};
pub use statistics::{ContextStatistics, TypeStatistics};

pub use mongorm_core::{ChangeNotifier, CoreError, Document, DocumentFields, NavigationMap};
pub use mongorm_macros::Document;
pub use mongorm_tracking::{EntryState, StateEntry, StateManager};
