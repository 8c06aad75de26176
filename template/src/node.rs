//! The intermediate tree.
//!
//! Produced once per template text by the compiler and walked by the builder on every
//! render. Nothing here changes after compilation except the build caches of static
//! elements and `z-once` nodes, which are filled on first build and never reset.
//! A `z-once` inside a `z-for` keeps one entry per loop position.

use std::{
    cell::{OnceCell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use zeal_core::{Modifiers, PatchFlags, Str, VChild, VNode};

use crate::{context::Method, interpolate::Segment};

/// A node of the intermediate tree.
#[derive(Debug)]
pub enum Node {
    /// Text without expressions; built into the same shared string every time.
    StaticText(Str),
    /// Text with `{{ }}` or `$` expressions.
    DynamicText(Vec<Segment>),
    /// An element.
    Element(ElementNode),
    /// `z-if` / `show-when`: the children are built only while the condition holds.
    If {
        /// The condition expression.
        condition: Str,
        /// What to build when it holds.
        children: Vec<Self>,
    },
    /// `z-for` / `repeat`.
    For(ForNode),
    /// `z-once`: built on first render, then reused verbatim.
    Once(OnceNode),
    /// `z-html` / `set-html` content: raw markup from an expression.
    Html(Str),
    /// `<slot>`: content supplied by the context, or the fallback children.
    Slot {
        /// Slot name; `default` when the element has no `name`.
        name: Str,
        /// Built when the context has no content for the slot.
        fallback: Vec<Self>,
    },
}

impl Node {
    /// Whether building this node never depends on state.
    #[must_use]
    pub fn is_static(&self) -> bool {
        match self {
            Self::StaticText(_) => true,
            Self::Element(element) => element.is_static,
            _ => false,
        }
    }
}

/// How a key is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// `key="a"`.
    Static(Str),
    /// `:key="item.id"`.
    Bound(Str),
}

/// One compiled attribute.
pub enum AttrNode {
    /// Copied verbatim.
    Static {
        /// Attribute name.
        name: Str,
        /// Attribute value.
        value: Str,
    },
    /// A plain `data-*` attribute. Copied verbatim, but keeps the element out of the
    /// static cache: directives read state through it on every patch.
    Directive {
        /// Attribute name, `data-` included.
        name: Str,
        /// Attribute value.
        value: Str,
    },
    /// `:name="expr"`, evaluated per build.
    Bound {
        /// Attribute name.
        name: Str,
        /// The expression.
        expr: Str,
    },
    /// `class` and/or `:class`.
    Class {
        /// The static `class` value.
        fixed: Option<Str>,
        /// The bound expression.
        expr: Str,
    },
    /// `style` and/or `:style`.
    Style {
        /// The static `style` value.
        fixed: Option<Str>,
        /// The bound expression.
        expr: Str,
    },
    /// `@event="method"`.
    Event {
        /// Event name without modifiers.
        event: Str,
        /// The resolved method; `None` binds a no-op.
        method: Option<Method>,
        /// `.prevent` / `.stop`.
        modifiers: Modifiers,
    },
    /// `z-model="path"`: a `value` prop plus an `input` listener writing back.
    Model {
        /// The bound path.
        path: Str,
    },
}

impl AttrNode {
    /// Whether the attribute is the same on every build.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Static { .. })
    }
}

impl std::fmt::Debug for AttrNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static { name, value } => write!(f, "{name}={value:?}"),
            Self::Directive { name, value } => write!(f, "{name}={value:?} (directive)"),
            Self::Bound { name, expr } => write!(f, ":{name}={expr:?}"),
            Self::Class { fixed, expr } => write!(f, "class({fixed:?}, :{expr:?})"),
            Self::Style { fixed, expr } => write!(f, "style({fixed:?}, :{expr:?})"),
            Self::Event {
                event,
                method,
                modifiers,
            } => write!(
                f,
                "@{event}(bound={}, {modifiers:?})",
                method.is_some()
            ),
            Self::Model { path } => write!(f, "z-model={path:?}"),
        }
    }
}

/// A compiled element.
#[derive(Debug)]
pub struct ElementNode {
    /// Tag name.
    pub tag: Str,
    /// Attributes in build order.
    pub attrs: Vec<AttrNode>,
    /// The key source, if any.
    pub key: Option<KeySource>,
    /// Child nodes.
    pub children: Vec<Node>,
    /// Patch flags stamped on every built node.
    pub flags: PatchFlags,
    /// No bindings anywhere in the subtree.
    pub is_static: bool,
    /// The shared build of a static element.
    pub(crate) cache: OnceCell<Rc<VNode>>,
}

impl ElementNode {
    /// Creates an element, deriving `is_static` from its parts.
    #[must_use]
    pub fn new(
        tag: impl Into<Str>,
        attrs: Vec<AttrNode>,
        key: Option<KeySource>,
        children: Vec<Node>,
        flags: PatchFlags,
    ) -> Self {
        let is_static = attrs.iter().all(AttrNode::is_static)
            && !matches!(key, Some(KeySource::Bound(_)))
            && children.iter().all(Node::is_static);
        Self {
            tag: tag.into(),
            attrs,
            key,
            children,
            flags,
            is_static,
            cache: OnceCell::new(),
        }
    }
}

/// The binding part of `z-for="(item, index) in items"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForBinding {
    /// Name of the item variable.
    pub item: Str,
    /// Name of the index variable, if declared.
    pub index: Option<Str>,
    /// The source expression.
    pub source: Str,
}

/// A compiled `z-for`.
#[derive(Debug)]
pub struct ForNode {
    /// Loop variables and source.
    pub binding: ForBinding,
    /// Built once per item.
    pub children: Vec<Node>,
}

/// A compiled `z-once`.
#[derive(Debug)]
pub struct OnceNode {
    /// The wrapped node.
    pub node: Box<Node>,
    pub(crate) cache: RefCell<HashMap<Vec<Str>, Vec<VChild>>>,
}

impl OnceNode {
    /// Wraps `node`.
    #[must_use]
    pub fn new(node: Node) -> Self {
        Self {
            node: Box::new(node),
            cache: RefCell::new(HashMap::new()),
        }
    }
}
