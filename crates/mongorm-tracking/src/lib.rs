//! State entry, state manager, and background cache cleaner.
//!
//! One [`StateManager`] is the identity map for one document type: it holds
//! the Added/Modified/Deleted stores directly and the Unchanged store
//! behind a [`mongorm_cache::DocumentCache`], routes property-change events
//! into state transitions, and exposes the lookup/enumeration surface a
//! repository context builds its save pipeline on top of. A
//! [`cleaner::CacheCleaner`] runs alongside it, periodically reclaiming
//! entries whose documents have been dropped elsewhere in the process.

pub mod cleaner;
pub mod error;
pub mod manager;
pub mod state;

pub use cleaner::{CacheCleaner, CacheCleanerConfig, NotifyReclaimSignal, ReclaimSignal, ShutdownSignal};
pub use error::{Result, TrackingError};
pub use manager::{StateManager, StateMask};
pub use state::{EntryState, StateEntry};
