//! Virtual nodes.
//!
//! A [`VNode`] describes one element before it exists in the DOM: its tag, its props,
//! its children and the [`PatchFlags`] that tell the reconciler which attribute
//! categories to look at. Trees are rebuilt on every render and thrown away after one
//! diff pass, with one exception: subtrees without bindings are built once and shared
//! through [`Rc`], so successive renders hand back the very same allocation.
//!
//! Props are keyed by attribute name. Names starting with `@` are event listeners
//! (`@click`), names starting with `data-` end up in the element's dataset, everything
//! else is a plain attribute.

extern crate alloc;

use alloc::{rc::Rc, vec::Vec};
use core::fmt;

use indexmap::IndexMap;

use crate::{
    flags::PatchFlags,
    handler::{DebugHandler, EventHandler},
    value::{Str, Value},
};

/// Prefix marking a prop as an event listener.
pub const EVENT_PREFIX: char = '@';

/// A prop value.
#[derive(Clone)]
pub enum Prop {
    /// A literal value. `false`, `null` and `undefined` mean "attribute absent".
    Value(Value),
    /// A zero-argument accessor, evaluated when the prop is applied.
    Accessor(Rc<dyn Fn() -> Value>),
    /// An event listener; only valid under an `@`-prefixed name.
    Handler(EventHandler),
}

impl Prop {
    /// Resolves the attribute text this prop stands for.
    ///
    /// Returns `None` when the attribute should be absent, and for handlers.
    #[must_use]
    pub fn attribute_value(&self) -> Option<Str> {
        let value = match self {
            Self::Value(value) => value.clone(),
            Self::Accessor(accessor) => accessor(),
            Self::Handler(_) => return None,
        };
        match value.unwrap_ref() {
            Value::Undefined | Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(Str::from("")),
            other => Some(other.to_display_string()),
        }
    }

    /// The handler, if this prop is a listener.
    #[must_use]
    pub const fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Self::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    /// Whether the prop's value can only be known at apply time.
    #[must_use]
    pub const fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor(_))
    }
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Accessor(_) => f.write_str("Accessor(..)"),
            Self::Handler(handler) => fmt::Debug::fmt(&DebugHandler(handler), f),
        }
    }
}

macro_rules! impl_prop_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Prop {
                fn from(value: $ty) -> Self {
                    Self::Value(value.into())
                }
            }
        )*
    };
}

impl_prop_from!(Value, &str, alloc::string::String, Str, bool, i32, i64, usize, f64);

/// One element of a virtual tree.
#[derive(Clone)]
pub struct VNode {
    tag: Str,
    props: IndexMap<Str, Prop>,
    children: Vec<VChild>,
    key: Option<Str>,
    flags: PatchFlags,
}

impl VNode {
    /// Creates an element node with no props or children.
    pub fn new(tag: impl Into<Str>) -> Self {
        Self {
            tag: tag.into(),
            props: IndexMap::new(),
            children: Vec::new(),
            key: None,
            flags: PatchFlags::empty(),
        }
    }

    /// Adds or replaces a prop.
    #[must_use]
    pub fn with_prop(mut self, name: impl Into<Str>, prop: impl Into<Prop>) -> Self {
        self.set_prop(name, prop);
        self
    }

    /// Adds an event listener for `event` (stored under `@event`).
    #[must_use]
    pub fn with_listener(mut self, event: &str, handler: EventHandler) -> Self {
        self.set_prop(
            alloc::format!("{EVENT_PREFIX}{event}"),
            Prop::Handler(handler),
        );
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, child: impl Into<VChild>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends several children.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = VChild>) -> Self {
        self.children.extend(children);
        self
    }

    /// Sets the reconciliation key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Str>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the patch flags.
    #[must_use]
    pub const fn with_flags(mut self, flags: PatchFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Adds or replaces a prop in place.
    pub fn set_prop(&mut self, name: impl Into<Str>, prop: impl Into<Prop>) {
        self.props.insert(name.into(), prop.into());
    }

    /// Adds patch flags in place.
    pub fn insert_flags(&mut self, flags: PatchFlags) {
        self.flags.insert(flags);
    }

    /// The element tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// All props in declaration order.
    #[must_use]
    pub const fn props(&self) -> &IndexMap<Str, Prop> {
        &self.props
    }

    /// Looks up a single prop.
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<&Prop> {
        self.props.get(name)
    }

    /// Attribute props: everything that is not a listener.
    pub fn attributes(&self) -> impl Iterator<Item = (&Str, &Prop)> {
        self.props
            .iter()
            .filter(|(name, _)| !name.starts_with(EVENT_PREFIX))
    }

    /// Listener props as `(event name, handler)` pairs.
    pub fn listeners(&self) -> impl Iterator<Item = (&str, &EventHandler)> {
        self.props.iter().filter_map(|(name, prop)| {
            let event = name.strip_prefix(EVENT_PREFIX)?;
            prop.as_handler().map(|handler| (event, handler))
        })
    }

    /// Child nodes in order.
    #[must_use]
    pub fn children(&self) -> &[VChild] {
        &self.children
    }

    /// The reconciliation key, if one was declared.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The patch flags.
    #[must_use]
    pub const fn flags(&self) -> PatchFlags {
        self.flags
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("props", &self.props)
            .field("children", &self.children)
            .finish()
    }
}

/// A position in a virtual tree: an element, a text run or raw markup.
#[derive(Clone)]
pub enum VChild {
    /// An element, shared so cached static subtrees can be reused by reference.
    Element(Rc<VNode>),
    /// A text node.
    Text(Str),
    /// Raw markup injected without escaping, wrapped in a host element.
    Html(Str),
}

impl VChild {
    /// Creates a text child.
    pub fn text(text: impl Into<Str>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a raw markup child.
    pub fn html(markup: impl Into<Str>) -> Self {
        Self::Html(markup.into())
    }

    /// The element, if this child is one.
    #[must_use]
    pub fn as_element(&self) -> Option<&VNode> {
        match self {
            Self::Element(node) => Some(node),
            _ => None,
        }
    }

    /// The text, if this child is a text run.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The reconciliation key of an element child.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.as_element().and_then(VNode::key)
    }

    /// Whether both children share the same allocation.
    ///
    /// Cached static subtrees and cached text runs compare equal here.
    #[must_use]
    pub fn same_ref(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::Text(a), Self::Text(b)) | (Self::Html(a), Self::Html(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for VChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(node) => fmt::Debug::fmt(node, f),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Html(markup) => f.debug_tuple("Html").field(markup).finish(),
        }
    }
}

impl From<VNode> for VChild {
    fn from(node: VNode) -> Self {
        Self::Element(Rc::new(node))
    }
}

impl From<Rc<VNode>> for VChild {
    fn from(node: Rc<VNode>) -> Self {
        Self::Element(node)
    }
}

impl From<&str> for VChild {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<alloc::string::String> for VChild {
    fn from(text: alloc::string::String) -> Self {
        Self::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::into_handler;

    #[test]
    fn attribute_values_follow_presence_rules() {
        assert_eq!(Prop::from("x").attribute_value().as_deref(), Some("x"));
        assert_eq!(Prop::from(true).attribute_value().as_deref(), Some(""));
        assert_eq!(Prop::from(false).attribute_value(), None);
        assert_eq!(Prop::Value(Value::Undefined).attribute_value(), None);
        assert_eq!(Prop::from(2).attribute_value().as_deref(), Some("2"));
    }

    #[test]
    fn listeners_and_attributes_are_split_by_prefix() {
        let node = VNode::new("button")
            .with_prop("type", "submit")
            .with_listener("click", into_handler(|_| {}));

        let attributes: Vec<_> = node.attributes().map(|(name, _)| name.to_string()).collect();
        let listeners: Vec<_> = node.listeners().map(|(name, _)| name).collect();
        assert_eq!(attributes, ["type"]);
        assert_eq!(listeners, ["click"]);
    }

    #[test]
    fn same_ref_is_pointer_identity() {
        let shared = VChild::from(VNode::new("p"));
        assert!(shared.same_ref(&shared.clone()));
        assert!(!shared.same_ref(&VChild::from(VNode::new("p"))));

        let text = VChild::text("a");
        assert!(text.same_ref(&text.clone()));
        assert!(!text.same_ref(&VChild::text("a")));
    }
}
