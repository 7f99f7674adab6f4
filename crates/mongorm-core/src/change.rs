//! Property-change notification.
//!
//! Every tracked document carries one [`ChangeNotifier`] slot. The state
//! manager subscribes its own callback into the slot the first time a
//! document is tracked (`addOrGetExisting`); the document's controlled
//! setters call [`ChangeNotifier::notify`] directly rather than going
//! through virtual dispatch, so ordinary field writes on an untracked
//! instance (for example, one just constructed by the caller before
//! `add()`) are simply no-ops.

use parking_lot::Mutex;

/// The callback signature the state manager installs: `(property_name)`.
type Handler = Box<dyn Fn(&'static str) + Send + Sync>;

/// A single-slot callback a document uses to report controlled-property
/// writes to whatever state manager is currently tracking it.
pub struct ChangeNotifier {
    handler: Mutex<Option<Handler>>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    /// A notifier with no subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(None),
        }
    }

    /// Installs `handler`, replacing any previous subscriber.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&'static str) + Send + Sync + 'static,
    {
        *self.handler.lock() = Some(Box::new(handler));
    }

    /// Removes the current subscriber, if any.
    pub fn unsubscribe(&self) {
        *self.handler.lock() = None;
    }

    /// Whether a subscriber is currently installed.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Reports that `property` was just written. A no-op if no subscriber is
    /// installed.
    pub fn notify(&self, property: &'static str) {
        if let Some(handler) = self.handler.lock().as_ref() {
            handler(property);
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
