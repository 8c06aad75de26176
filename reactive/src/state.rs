//! The reactive state container.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use zeal_core::{Object, Resolve, Str, Value, ZealError, error::report};

use crate::{
    cache::WrapperCache,
    handle::{Reactive, Target},
    watch::{Change, ChangeListener, Listeners, Subscription, WatchCallback, Watchers},
};

pub(crate) struct StateInner {
    root: Reactive,
    cache: RefCell<WrapperCache>,
    pub(crate) listeners: RefCell<Listeners>,
    watchers: RefCell<Watchers>,
}

impl StateInner {
    /// Returns the wrapper for `value`, wrapping it (and everything reachable from it)
    /// on first sight.
    pub(crate) fn wrap(this: &Rc<Self>, value: &Value) -> Option<Reactive> {
        let target = match value {
            Value::Object(object) => {
                if object.is_raw() {
                    return None;
                }
                if object.is_frozen() {
                    tracing::debug!(
                        target: "zeal::reactive",
                        id = %object.id(),
                        "object is frozen, leaving it unwrapped"
                    );
                    return None;
                }
                Target::Object(object.clone())
            }
            Value::Array(array) => {
                if array.is_frozen() {
                    tracing::debug!(
                        target: "zeal::reactive",
                        id = %array.id(),
                        "array is frozen, leaving it unwrapped"
                    );
                    return None;
                }
                Target::Array(array.clone())
            }
            _ => return None,
        };

        let id = target.id();
        if let Some(existing) = this.cache.borrow().get(id) {
            return Some(existing);
        }

        // Register before descending: a cycle back to this object hits the cache.
        let wrapper = this
            .cache
            .borrow_mut()
            .insert(id, Reactive::new(target.clone(), Rc::downgrade(this)));
        for child in target.children() {
            let _ = Self::wrap(this, &child);
        }
        Some(wrapper)
    }

    pub(crate) fn notify(&self, changes: &[Change]) {
        // Snapshot the callbacks so listeners may write (re-entrantly) or register
        // new listeners without holding a borrow across the call.
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(changes);
        }
        for change in changes {
            let watchers = self.watchers.borrow().matching(&change.key);
            for watcher in watchers {
                watcher(change);
            }
        }
    }
}

/// A value graph whose writes notify observers.
///
/// Cloning the state clones the handle; all clones share the same data, listeners and
/// watchers.
///
/// ```
/// use std::{cell::Cell, rc::Rc};
/// use zeal_reactive::ReactiveState;
///
/// let state = ReactiveState::new(serde_json::json!({ "count": 0 }));
/// let calls = Rc::new(Cell::new(0));
/// let seen = calls.clone();
/// state.on_change(move |_| seen.set(seen.get() + 1));
///
/// state.set("count", 1);
/// state.set("count", 1); // same value, still notifies
/// assert_eq!(calls.get(), 2);
/// ```
#[derive(Clone)]
pub struct ReactiveState {
    inner: Rc<StateInner>,
}

impl ReactiveState {
    /// Wraps `initial` deeply.
    ///
    /// An object becomes the root. Any other value is stored under the `value` key of
    /// a fresh root object.
    pub fn new(initial: impl Into<Value>) -> Self {
        let root = match initial.into() {
            Value::Object(object) => object,
            other => Object::from_entries([("value", other)]),
        };
        if root.is_frozen() {
            tracing::debug!(
                target: "zeal::reactive",
                "root object is frozen, writes will be rejected"
            );
        }

        let inner = Rc::new_cyclic(|weak: &Weak<StateInner>| StateInner {
            root: Reactive::new(Target::Object(root.clone()), weak.clone()),
            cache: RefCell::new(WrapperCache::new()),
            listeners: RefCell::new(Listeners::default()),
            watchers: RefCell::new(Watchers::default()),
        });

        inner
            .cache
            .borrow_mut()
            .insert(root.id(), inner.root.clone());
        for child in inner.root.target().children() {
            let _ = StateInner::wrap(&inner, &child);
        }

        Self { inner }
    }

    /// The live wrapped root.
    #[must_use]
    pub fn get(&self) -> Reactive {
        self.inner.root.clone()
    }

    /// The root as a plain value, for expression evaluation.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.inner.root.to_value()
    }

    /// Writes a root field. Always notifies, even when the value is unchanged.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.inner.root.set(key, value);
    }

    /// Writes every field of `object` into the root and notifies listeners once.
    ///
    /// Non-object arguments are reported on the error channel and ignored.
    pub fn merge(&self, object: impl Into<Value>) {
        match object.into() {
            Value::Object(source) => self.inner.root.merge(source.entries()),
            other => report(ZealError::expression(
                "merge",
                format!("expected an object, got {}", other.type_name()),
            )),
        }
    }

    /// Writes through a dotted path.
    ///
    /// # Errors
    ///
    /// See [`Reactive::set_path`].
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<(), ZealError> {
        self.inner.root.set_path(path, value)
    }

    /// Registers a listener called once for every write call, with all its changes.
    pub fn on_change(&self, listener: impl Fn(&[Change]) + 'static) -> Subscription {
        let listener: ChangeListener = Rc::new(listener);
        let id = self.inner.listeners.borrow_mut().add(listener);
        Subscription::new(Rc::downgrade(&self.inner), id)
    }

    /// Watches writes to `key`, or every write with [`WILDCARD`](crate::WILDCARD).
    ///
    /// Each key has a single slot: watching a key that already has a watcher replaces
    /// it.
    pub fn watch(&self, key: impl Into<Str>, callback: impl Fn(&Change) + 'static) {
        let key = key.into();
        let callback: WatchCallback = Rc::new(callback);
        if self.inner.watchers.borrow_mut().set(key.clone(), callback) {
            tracing::debug!(target: "zeal::reactive", key = %key, "replaced existing watcher");
        }
    }

    /// Removes the watcher for `key`. Returns `false` if there was none.
    pub fn unwatch(&self, key: &str) -> bool {
        self.inner.watchers.borrow_mut().remove(key)
    }

    /// Whether a watcher is registered for `key`.
    #[must_use]
    pub fn is_watching(&self, key: &str) -> bool {
        self.inner.watchers.borrow().contains(key)
    }

    /// Returns the wrapper for an object or array reachable from this state.
    ///
    /// `None` for primitives and for raw or frozen objects.
    #[must_use]
    pub fn wrapper(&self, value: &Value) -> Option<Reactive> {
        StateInner::wrap(&self.inner, value)
    }

    /// Whether `value` is an object or array with a wrapper in this state.
    #[must_use]
    pub fn is_reactive(&self, value: &Value) -> bool {
        value
            .identity()
            .is_some_and(|id| self.inner.cache.borrow().contains(id))
    }

    /// Number of live wrapped objects and arrays, root included.
    ///
    /// Wrappers of nodes that were overwritten and are referenced nowhere else are
    /// pruned first.
    #[must_use]
    pub fn wrapper_count(&self) -> usize {
        let mut cache = self.inner.cache.borrow_mut();
        cache.prune();
        cache.len()
    }

    /// Number of registered `on_change` listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Whether both handles share the same state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Resolve for ReactiveState {
    fn resolve(&self, name: &str) -> Value {
        self.inner.root.get(name)
    }
}

impl fmt::Debug for ReactiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveState")
            .field("root", &self.inner.root.id())
            .field("wrappers", &self.inner.cache.borrow().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
