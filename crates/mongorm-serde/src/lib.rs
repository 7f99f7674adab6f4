//! Identity-preserving BSON encode/decode for mongorm.
//!
//! [`encode`] turns a tracked document into a self-describing BSON record.
//! [`decode`] is the more interesting half: given a raw record and the
//! [`mongorm_tracking::StateManager`] for that type, it guarantees that
//! every concurrent read of the same identity resolves to the same
//! `Arc<T>` — reusing the already-tracked instance and hydrating it in
//! place rather than constructing a second copy.

pub mod error;
pub mod serializer;

pub use error::{Result, SerdeError};
pub use serializer::{decode, encode};
