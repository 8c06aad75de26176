//! The observer wrapper handed out for every reactive object or array.

use std::{
    fmt,
    rc::{Rc, Weak},
};

use zeal_core::{
    Array, Object, ObjectId, Str, Value, ZealError, error::report, resolve::member,
};

use crate::{state::StateInner, watch::Change};

/// What a [`Reactive`] wraps.
#[derive(Debug, Clone)]
pub enum Target {
    /// A keyed record.
    Object(Object),
    /// A list.
    Array(Array),
}

impl Target {
    /// The identity of the wrapped node.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Object(object) => object.id(),
            Self::Array(array) => array.id(),
        }
    }

    /// The wrapped node as a plain value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Object(object) => Value::Object(object.clone()),
            Self::Array(array) => Value::Array(array.clone()),
        }
    }

    /// Whether the caller's handle is the only one left.
    fn is_sole_handle(&self) -> bool {
        match self {
            Self::Object(object) => object.handle_count() == 1,
            Self::Array(array) => array.handle_count() == 1,
        }
    }

    pub(crate) fn children(&self) -> Vec<Value> {
        match self {
            Self::Object(object) => object.entries().into_iter().map(|(_, v)| v).collect(),
            Self::Array(array) => array.to_vec(),
        }
    }
}

struct ReactiveInner {
    target: Target,
    state: Weak<StateInner>,
}

/// A write-observing handle over one object or array of a [`ReactiveState`].
///
/// Reads go straight to the underlying data. Writes go through [`Reactive::set`] and
/// friends, which perform the write and then notify the owning state synchronously.
/// Nested objects are reached with [`Reactive::child`]; the same source object always
/// yields the same wrapper.
///
/// [`ReactiveState`]: crate::ReactiveState
#[derive(Clone)]
pub struct Reactive(Rc<ReactiveInner>);

impl Reactive {
    pub(crate) fn new(target: Target, state: Weak<StateInner>) -> Self {
        Self(Rc::new(ReactiveInner { target, state }))
    }

    /// The wrapped node.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.0.target
    }

    /// The wrapped node as a plain value, suitable for evaluation.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.0.target.to_value()
    }

    /// Identity of the wrapped node.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.0.target.id()
    }

    /// Whether this handle is the only reference to the wrapper and the wrapper the
    /// only reference to its node: nothing can read or write through it any more.
    pub(crate) fn is_orphan(&self) -> bool {
        Rc::strong_count(&self.0) == 1 && self.0.target.is_sole_handle()
    }

    /// Whether both handles are the same wrapper.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Reads a field (or an array index / `length`).
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        member(&self.to_value(), key)
    }

    /// Number of fields or items.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.0.target {
            Target::Object(object) => object.len(),
            Target::Array(array) => array.len(),
        }
    }

    /// Whether there are no fields or items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the wrapper for a nested object or array.
    ///
    /// `None` when the field holds a primitive, or an object that is marked raw or
    /// frozen: such subtrees are not reactive.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<Self> {
        let state = self.0.state.upgrade()?;
        StateInner::wrap(&state, &self.get(key))
    }

    /// Writes `key` and notifies the owning state.
    ///
    /// Writing the value that is already stored still notifies. Failed writes (frozen
    /// targets, non-numeric array keys) are reported on the error channel.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(change) = self.write(key, value) {
            self.notify(vec![change]);
        }
    }

    /// Writes every entry of `entries`, then notifies once with all the changes.
    ///
    /// Listeners are called even when nothing was written: an empty merge, or one
    /// whose writes were all rejected, notifies with an empty change list.
    pub fn merge<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<Str>,
        V: Into<Value>,
    {
        let changes: Vec<Change> = entries
            .into_iter()
            .filter_map(|(key, value)| {
                let key: Str = key.into();
                self.write(&key, value.into())
            })
            .collect();
        self.notify(changes);
    }

    /// Appends to a wrapped array and notifies with key `length`.
    pub fn push(&self, value: impl Into<Value>) {
        let Target::Array(array) = &self.0.target else {
            report(ZealError::expression("push", "target is not an array"));
            return;
        };
        let value = value.into();
        let old = Value::from(array.len());
        match array.push(value) {
            Ok(()) => {
                self.adopt(&array.get(array.len() - 1));
                self.notify(vec![Change::new(
                    Str::from("length"),
                    Value::from(array.len()),
                    old,
                )]);
            }
            Err(error) => report(error),
        }
    }

    /// Removes a field (objects) or an item (arrays) and notifies.
    pub fn remove(&self, key: &str) {
        let result = match &self.0.target {
            Target::Object(object) => object
                .remove(key)
                .map(|old| Change::new(Str::from(key), Value::Undefined, old)),
            Target::Array(array) => parse_index(key).and_then(|index| {
                let old_len = Value::from(array.len());
                array.remove(index)?;
                Ok(Change::new(
                    Str::from("length"),
                    Value::from(array.len()),
                    old_len,
                ))
            }),
        };
        match result {
            Ok(change) => self.notify(vec![change]),
            Err(error) => report(error),
        }
    }

    /// Writes through a dotted path such as `user.address.city`.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Expression`] when an intermediate segment does not lead to
    /// a reactive object.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<(), ZealError> {
        let mut segments: Vec<&str> = path.split('.').map(str::trim).collect();
        let last = segments
            .pop()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| ZealError::expression(path, "empty path"))?;

        let mut current = self.clone();
        for segment in segments {
            current = current.child(segment).ok_or_else(|| {
                ZealError::expression(path, format!("`{segment}` is not a reactive object"))
            })?;
        }
        current.set(last, value);
        Ok(())
    }

    fn write(&self, key: &str, value: Value) -> Option<Change> {
        let result = match &self.0.target {
            Target::Object(object) => object.insert(key, value.clone()),
            Target::Array(array) => {
                parse_index(key).and_then(|index| array.set(index, value.clone()))
            }
        };
        match result {
            Ok(old) => {
                self.adopt(&value);
                Some(Change::new(Str::from(key), value, old))
            }
            Err(error) => {
                report(error);
                None
            }
        }
    }

    /// Wraps a freshly written value so nested writes through it notify too.
    fn adopt(&self, value: &Value) {
        if let Some(state) = self.0.state.upgrade() {
            let _ = StateInner::wrap(&state, value);
        }
    }

    fn notify(&self, changes: Vec<Change>) {
        if let Some(state) = self.0.state.upgrade() {
            state.notify(&changes);
        }
    }
}

fn parse_index(key: &str) -> Result<usize, ZealError> {
    key.parse::<usize>()
        .map_err(|_| ZealError::expression(key, "array keys must be indices"))
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(&self.id()).finish()
    }
}
