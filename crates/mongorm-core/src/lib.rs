//! Core abstractions for mongorm.
//!
//! This crate defines the foundational trait and value types shared by every
//! other mongorm crate: the [`Document`] contract a tracked type must satisfy,
//! the [`NavigationMap`] that carries unresolved reference identities, the
//! [`ChangeNotifier`] slot a document uses to report controlled-property
//! writes, and the identity helpers built on top of [`bson::oid::ObjectId`].
//!
//! # Examples
//!
//! Implementing the contract by hand (normally generated by
//! `#[derive(mongorm_macros::Document)]`):
//!
//! ```
//! use mongorm_core::{ChangeNotifier, Document, NavigationMap};
//! use bson::oid::ObjectId;
//! use parking_lot::RwLock;
//!
//! struct Account {
//!     id: RwLock<ObjectId>,
//!     nav: RwLock<NavigationMap>,
//!     notifier: ChangeNotifier,
//! }
//!
//! impl Document for Account {
//!     fn collection_name() -> &'static str {
//!         "accounts"
//!     }
//!
//!     fn id(&self) -> ObjectId {
//!         *self.id.read()
//!     }
//!
//!     fn set_id(&self, id: ObjectId) {
//!         *self.id.write() = id;
//!     }
//!
//!     fn navigation(&self) -> NavigationMap {
//!         self.nav.read().clone()
//!     }
//!
//!     fn set_single_reference(&self, field: &'static str, id: ObjectId) {
//!         self.nav.write().set_single(field, id);
//!     }
//!
//!     fn set_collection_reference(&self, field: &'static str, ids: Vec<ObjectId>) {
//!         self.nav.write().set_collection(field, ids);
//!     }
//!
//!     fn change_notifier(&self) -> &ChangeNotifier {
//!         &self.notifier
//!     }
//! }
//! ```

pub mod change;
pub mod document;
pub mod error;
pub mod fields;
pub mod identity;
pub mod navigation;

pub use change::ChangeNotifier;
pub use document::Document;
pub use error::{CoreError, Result};
pub use fields::DocumentFields;
pub use identity::empty_id;
pub use navigation::{NavigationMap, NavigationValue};
