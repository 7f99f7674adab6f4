//! Bulk command builders and write-error correlation against the
//! `mongodb` driver.
//!
//! This crate knows nothing about tracking or identity maps; it is the
//! thin layer the repository context's save pipeline drives once it has
//! already grouped dirty entries by type and state.

pub mod commands;
pub mod error;

pub use commands::{BulkOutcome, WriteError, delete_many, insert_many, reload, update_many};
pub use error::{Result, WireError};
