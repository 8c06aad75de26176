//! The dynamic value graph shared by state, templates and virtual nodes.
//!
//! Component state is an arbitrary graph of objects, arrays and primitives. Objects and
//! arrays are shared, interior-mutable handles: cloning a [`Value`] never deep-copies,
//! it hands out another reference to the same node. Every object and array receives a
//! process-unique [`ObjectId`] when it is created. The reactive layer keys its wrapper
//! cache on that id, which is how it guarantees a single wrapper per source object and
//! terminates on cyclic graphs.
//!
//! # Example
//!
//! ```
//! use zeal_core::value::{Object, Value};
//!
//! let user = Object::new();
//! user.insert("name", "Ada").unwrap();
//!
//! let state = Value::from(serde_json::json!({ "count": 1 }));
//! let root = state.as_object().unwrap();
//! root.insert("user", Value::Object(user.clone())).unwrap();
//!
//! // Same node, same identity.
//! assert_eq!(root.get("user"), Value::Object(user));
//! ```

extern crate alloc;

use alloc::{rc::Rc, vec::Vec};
use core::{
    cell::{Cell, RefCell},
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use indexmap::IndexMap;

use crate::error::ZealError;

/// Cheaply clonable shared string used throughout the framework.
///
/// Cloning a [`Str`] shares the allocation, so two clones compare equal by pointer
/// ([`Rc::ptr_eq`]); cached template text relies on this.
pub type Str = Rc<str>;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity assigned to every [`Object`] and [`Array`] at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value; what failed lookups produce.
    #[default]
    Undefined,
    /// An explicit empty value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double precision number.
    Number(f64),
    /// A shared string.
    String(Str),
    /// A shared, mutable list.
    Array(Array),
    /// A shared, mutable keyed record.
    Object(Object),
    /// A standalone value cell, unwrapped by the evaluator at a path terminal.
    Ref(Ref),
}

impl Value {
    /// Creates an object value from key/value pairs.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Str>,
        V: Into<Self>,
    {
        Self::Object(Object::from_entries(entries))
    }

    /// Creates an array value from items.
    pub fn array<V: Into<Self>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::Array(Array::from_items(items))
    }

    /// Returns `true` for [`Value::Undefined`].
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns `true` for [`Value::Undefined`] and [`Value::Null`].
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Scripting-style truthiness: `false`, `0`, `NaN`, `""`, `null` and `undefined`
    /// are falsy, everything else is truthy. A [`Ref`] is judged by its content.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
            Self::Ref(r) => r.get().is_truthy(),
        }
    }

    /// Returns the inner object handle, if this is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the inner array handle, if this is an array.
    #[must_use]
    pub const fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number, if this is a number.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Unwraps a [`Value::Ref`] into its current content; other values are returned as is.
    #[must_use]
    pub fn unwrap_ref(self) -> Self {
        match self {
            Self::Ref(r) => r.get(),
            other => other,
        }
    }

    /// The identity of the shared node behind this value, if any.
    #[must_use]
    pub fn identity(&self) -> Option<ObjectId> {
        match self {
            Self::Object(o) => Some(o.id()),
            Self::Array(a) => Some(a.id()),
            Self::Ref(r) => Some(r.id()),
            _ => None,
        }
    }

    /// A short name for the variant, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Ref(_) => "ref",
        }
    }

    /// Converts the value into the text a template shows for it.
    ///
    /// `undefined` and `null` render as the empty string, integral numbers print
    /// without a fractional part, arrays join their items with `,`.
    #[must_use]
    pub fn to_display_string(&self) -> Str {
        match self {
            Self::String(s) => s.clone(),
            other => Str::from(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined | Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => fmt_number(*n, f),
            Self::String(s) => f.write_str(s),
            Self::Array(a) => {
                for (index, item) in a.to_vec().iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Ref(r) => write!(f, "{}", r.get()),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let integral = n as i64;
        write!(f, "{integral}")
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: state graphs may be cyclic.
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Array(a) => write!(f, "Array({}, len={})", a.id(), a.len()),
            Self::Object(o) => write!(f, "Object({}, keys={:?})", o.id(), o.keys()),
            Self::Ref(r) => write!(f, "Ref({})", r.id()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Ref(a), Self::Ref(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
                fn from(value: $ty) -> Self {
                    Self::Number(value as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Str::from(value))
    }
}

impl From<alloc::string::String> for Value {
    fn from(value: alloc::string::String) -> Self {
        Self::String(Str::from(value))
    }
}

impl From<Str> for Value {
    fn from(value: Str) -> Self {
        Self::String(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Self::Array(value)
    }
}

impl From<Ref> for Value {
    fn from(value: Ref) -> Self {
        Self::Ref(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::array(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => Self::array(items),
            serde_json::Value::Object(map) => Self::object(map),
        }
    }
}

// ============================================================================
// Object
// ============================================================================

struct ObjectInner {
    id: ObjectId,
    fields: RefCell<IndexMap<Str, Value>>,
    raw: Cell<bool>,
    frozen: Cell<bool>,
}

/// A shared, insertion-ordered record of named values.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    /// Creates an empty object with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(ObjectInner {
            id: ObjectId::next(),
            fields: RefCell::new(IndexMap::new()),
            raw: Cell::new(false),
            frozen: Cell::new(false),
        }))
    }

    /// Creates an object from key/value pairs.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Str>,
        V: Into<Value>,
    {
        let object = Self::new();
        object.0.fields.borrow_mut().extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        object
    }

    /// The identity of this object.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Returns `true` when both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this node, this one included.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Reads a field; missing fields read as [`Value::Undefined`].
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.0.fields.borrow().get(key).cloned().unwrap_or_default()
    }

    /// Returns `true` if the field exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.borrow().contains_key(key)
    }

    /// Writes a field and returns the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Frozen`] if the object has been frozen.
    pub fn insert(&self, key: impl Into<Str>, value: impl Into<Value>) -> Result<Value, ZealError> {
        let key = key.into();
        if self.is_frozen() {
            return Err(ZealError::Frozen { key: key.to_string() });
        }
        Ok(self
            .0
            .fields
            .borrow_mut()
            .insert(key, value.into())
            .unwrap_or_default())
    }

    /// Removes a field and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Frozen`] if the object has been frozen.
    pub fn remove(&self, key: &str) -> Result<Value, ZealError> {
        if self.is_frozen() {
            return Err(ZealError::Frozen { key: key.into() });
        }
        Ok(self
            .0
            .fields
            .borrow_mut()
            .shift_remove(key)
            .unwrap_or_default())
    }

    /// Field names in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<Str> {
        self.0.fields.borrow().keys().cloned().collect()
    }

    /// A snapshot of the fields in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Str, Value)> {
        self.0
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.fields.borrow().len()
    }

    /// Returns `true` if the object has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the object as non-reactive. The reactive layer never wraps it.
    pub fn mark_raw(&self) -> &Self {
        self.0.raw.set(true);
        self
    }

    /// Returns `true` if the object was marked with [`Object::mark_raw`].
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.0.raw.get()
    }

    /// Freezes the object: further writes fail and it can no longer be wrapped.
    pub fn freeze(&self) -> &Self {
        self.0.frozen.set(true);
        self
    }

    /// Returns `true` if the object is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("keys", &self.keys())
            .finish()
    }
}

// ============================================================================
// Array
// ============================================================================

struct ArrayInner {
    id: ObjectId,
    items: RefCell<Vec<Value>>,
    frozen: Cell<bool>,
}

/// A shared, growable list of values.
#[derive(Clone)]
pub struct Array(Rc<ArrayInner>);

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl Array {
    /// Creates an empty array with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self::from_items(Vec::<Value>::new())
    }

    /// Creates an array from items.
    pub fn from_items<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self(Rc::new(ArrayInner {
            id: ObjectId::next(),
            items: RefCell::new(items.into_iter().map(Into::into).collect()),
            frozen: Cell::new(false),
        }))
    }

    /// The identity of this array.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Returns `true` when both handles point at the same array.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this node, this one included.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Reads an item; out of range reads as [`Value::Undefined`].
    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    /// Returns `true` if the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the items.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Appends an item.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Frozen`] if the array has been frozen.
    pub fn push(&self, value: impl Into<Value>) -> Result<(), ZealError> {
        self.check_writable("push")?;
        self.0.items.borrow_mut().push(value.into());
        Ok(())
    }

    /// Overwrites an item, growing the array with `undefined` holes when needed.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Frozen`] if the array has been frozen.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Value, ZealError> {
        self.check_writable("set")?;
        let mut items = self.0.items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        Ok(core::mem::replace(&mut items[index], value.into()))
    }

    /// Removes the item at `index`, shifting the rest down.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Frozen`] if the array has been frozen.
    pub fn remove(&self, index: usize) -> Result<Value, ZealError> {
        self.check_writable("remove")?;
        let mut items = self.0.items.borrow_mut();
        if index < items.len() {
            Ok(items.remove(index))
        } else {
            Ok(Value::Undefined)
        }
    }

    /// Freezes the array.
    pub fn freeze(&self) -> &Self {
        self.0.frozen.set(true);
        self
    }

    /// Returns `true` if the array is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    fn check_writable(&self, op: &str) -> Result<(), ZealError> {
        if self.is_frozen() {
            Err(ZealError::Frozen {
                key: alloc::format!("[{op}]"),
            })
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("id", &self.id())
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// Ref
// ============================================================================

struct RefInner {
    id: ObjectId,
    value: RefCell<Value>,
}

/// A standalone value cell.
///
/// Expressions that end on a ref resolve to the ref's content.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
    /// Creates a new cell holding `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Rc::new(RefInner {
            id: ObjectId::next(),
            value: RefCell::new(value.into()),
        }))
    }

    /// The identity of this cell.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Reads the current content.
    #[must_use]
    pub fn get(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Replaces the content, returning the previous one.
    pub fn set(&self, value: impl Into<Value>) -> Value {
        self.0.value.replace(value.into())
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn identities_are_unique() {
        let a = Object::new();
        let b = Object::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Value::object([("x", 1)]);
        let b = Value::object([("x", 1)]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn display_follows_template_rules() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Undefined.to_string(), "");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::array([1, 2, 3]).to_string(), "1,2,3");
        assert_eq!(Value::object([("a", 1)]).to_string(), "[object Object]");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::array(Vec::<Value>::new()).is_truthy());
        assert!(Value::Ref(Ref::new(true)).is_truthy());
    }

    #[test]
    fn frozen_objects_reject_writes() {
        let object = Object::from_entries([("a", 1)]);
        object.freeze();
        assert!(matches!(
            object.insert("a", 2),
            Err(ZealError::Frozen { .. })
        ));
        assert_eq!(object.get("a"), Value::from(1));
    }

    #[test]
    fn json_conversion_keeps_order() {
        let value = Value::from(serde_json::json!({ "b": [1, "two"], "a": null }));
        let object = value.as_object().unwrap();
        let keys: Vec<_> = object.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(object.get("a"), Value::Null);
        assert_eq!(object.get("b").as_array().unwrap().get(1), Value::from("two"));
    }

    #[test]
    fn array_set_grows_with_holes() {
        let array = Array::new();
        array.set(2, "x").unwrap();
        assert_eq!(array.len(), 3);
        assert!(array.get(0).is_undefined());
    }
}
