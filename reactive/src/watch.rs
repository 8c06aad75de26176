//! Change records, listener slots and subscriptions.

use std::{
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use zeal_core::{Str, Value};

use crate::state::StateInner;

/// Key that matches every write when used with [`ReactiveState::watch`].
///
/// [`ReactiveState::watch`]: crate::ReactiveState::watch
pub const WILDCARD: &str = "*";

/// One write.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// The written key, relative to the object (or array) that was written.
    pub key: Str,
    /// The value after the write.
    pub value: Value,
    /// The value before the write.
    pub old: Value,
}

impl Change {
    pub(crate) const fn new(key: Str, value: Value, old: Value) -> Self {
        Self { key, value, old }
    }
}

/// Listener invoked once per `set`/`merge` call with every change it made.
pub type ChangeListener = Rc<dyn Fn(&[Change])>;

/// Callback invoked for each change matching a watched key.
pub type WatchCallback = Rc<dyn Fn(&Change)>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(u64, ChangeListener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: ChangeListener) -> u64 {
        self.next_id += 1;
        self.entries.push((self.next_id, listener));
        self.next_id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        before != self.entries.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<ChangeListener> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One callback per key. Registering again for the same key replaces the previous
/// callback instead of adding a second one.
#[derive(Default)]
pub(crate) struct Watchers {
    slots: HashMap<Str, WatchCallback>,
}

impl Watchers {
    pub(crate) fn set(&mut self, key: Str, callback: WatchCallback) -> bool {
        self.slots.insert(key, callback).is_some()
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    pub(crate) fn matching(&self, key: &str) -> Vec<WatchCallback> {
        [self.slots.get(key), self.slots.get(WILDCARD)]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

/// Handle to an `on_change` registration.
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::cancel`] to remove it.
pub struct Subscription {
    state: Weak<StateInner>,
    id: u64,
}

impl Subscription {
    pub(crate) const fn new(state: Weak<StateInner>, id: u64) -> Self {
        Self { state, id }
    }

    /// Removes the listener. Returns `false` if it was already gone.
    pub fn cancel(self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let removed = state.listeners.borrow_mut().remove(self.id);
        removed
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
