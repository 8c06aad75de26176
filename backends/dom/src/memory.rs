//! An in-memory document.
//!
//! [`MemoryDom`] stores nodes in an arena addressed by [`NodeId`] and records every
//! mutation the renderer or reconciler makes, so tests can assert on exactly what was
//! touched. It is also usable as a headless host.

use core::{cell::RefCell, fmt};
use std::rc::Rc;

use indexmap::IndexMap;
use zeal_core::{Event, EventHandler, ZealError};

use crate::host::Dom;

/// Identifier of a node stored in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index backing this identifier.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One recorded change to a [`MemoryDom`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Mutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetText { node: NodeId, text: String },
    SetTextContent { node: NodeId, text: String },
    SetInnerHtml { node: NodeId, html: String },
    SetAttribute { node: NodeId, name: String, value: String },
    RemoveAttribute { node: NodeId, name: String },
    SetData { node: NodeId, key: String, value: String },
    RemoveData { node: NodeId, key: String },
    SetStyle { node: NodeId, property: String, value: Option<String> },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    Insert { parent: NodeId, node: NodeId, index: usize },
    Remove { parent: NodeId, node: NodeId },
}

impl Mutation {
    /// Whether this mutation created a node.
    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(self, Self::CreateElement { .. } | Self::CreateText { .. })
    }
}

#[derive(Default)]
struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    dataset: IndexMap<String, String>,
    style: IndexMap<String, String>,
    listeners: IndexMap<String, EventHandler>,
    inner_html: Option<String>,
}

enum NodeKind {
    Element(ElementData),
    Text(String),
}

struct NodeEntry {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena-backed document with a mutation log.
#[derive(Default)]
pub struct MemoryDom {
    nodes: Vec<NodeEntry>,
    log: Vec<Mutation>,
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDom")
            .field("nodes", &self.nodes.len())
            .field("log", &self.log.len())
            .finish()
    }
}

impl MemoryDom {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached `div` to mount into, without logging it.
    pub fn container(&mut self) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: "div".to_owned(),
            ..ElementData::default()
        }))
    }

    /// Total number of nodes ever created.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node was ever created.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ============================================================================
    // Inspection
    // ============================================================================

    /// Tag of an element.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element_data(node).map(|data| data.tag.as_str())
    }

    /// Data of a text node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    /// Concatenated text of `node` and all its descendants.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(text) = self.text(node) {
            out.push_str(text);
            return;
        }
        for &child in self.children(node) {
            self.collect_text(child, out);
        }
    }

    /// An attribute value.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element_data(node)?.attributes.get(name).map(String::as_str)
    }

    /// Attribute names in insertion order.
    #[must_use]
    pub fn attribute_names(&self, node: NodeId) -> Vec<&str> {
        self.element_data(node)
            .map(|data| data.attributes.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// A dataset entry, by camel-cased key.
    #[must_use]
    pub fn data(&self, node: NodeId, key: &str) -> Option<&str> {
        self.element_data(node)?.dataset.get(key).map(String::as_str)
    }

    /// An inline style property.
    #[must_use]
    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.element_data(node)?.style.get(property).map(String::as_str)
    }

    /// Markup injected with [`Dom::set_inner_html`].
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> Option<&str> {
        self.element_data(node)?.inner_html.as_deref()
    }

    /// Children of `node`, in order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.index())
            .map_or(&[], |entry| entry.children.as_slice())
    }

    /// The parent of `node`, if attached.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.parent
    }

    /// Whether `node` has a listener for `event`.
    #[must_use]
    pub fn has_listener(&self, node: NodeId, event: &str) -> bool {
        self.element_data(node)
            .is_some_and(|data| data.listeners.contains_key(event))
    }

    /// Number of listeners registered on `node`.
    #[must_use]
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.element_data(node).map_or(0, |data| data.listeners.len())
    }

    /// Number of listeners registered anywhere, attached or not.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|entry| match &entry.kind {
                NodeKind::Element(data) => Some(data.listeners.len()),
                NodeKind::Text(_) => None,
            })
            .sum()
    }

    /// The mutations recorded so far.
    #[must_use]
    pub fn log(&self) -> &[Mutation] {
        &self.log
    }

    /// Takes the recorded mutations, leaving the log empty.
    pub fn take_log(&mut self) -> Vec<Mutation> {
        core::mem::take(&mut self.log)
    }

    /// Clears the mutation log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Serializes `node` and its subtree as markup, for assertions.
    ///
    /// Attributes are printed in insertion order, dataset entries after them as
    /// `data-<key>`, text is printed verbatim.
    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serializes the children of `node` as markup.
    #[must_use]
    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(html) = self.inner_html(node) {
            out.push_str(html);
        }
        for &child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(entry) = self.nodes.get(node.index()) else {
            return;
        };
        match &entry.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(data) => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attributes {
                    push_attribute(out, name, value);
                }
                for (key, value) in &data.dataset {
                    push_attribute(out, &format!("data-{key}"), value);
                }
                if !data.style.is_empty() {
                    let style = data
                        .style
                        .iter()
                        .map(|(property, value)| format!("{property}: {value}"))
                        .collect::<Vec<_>>()
                        .join("; ");
                    push_attribute(out, "style", &style);
                }
                out.push('>');
                out.push_str(&self.inner_markup(node));
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }

    // ============================================================================
    // Events
    // ============================================================================

    /// Dispatches `event` at `node`, bubbling through its ancestors.
    ///
    /// Handlers run with the document unborrowed, so they may render or patch into it.
    /// Returns the number of handlers that ran.
    pub fn dispatch(dom: &Rc<RefCell<Self>>, node: NodeId, event: &mut Event) -> usize {
        let mut current = Some(node);
        let mut ran = 0;
        while let Some(target) = current {
            let (handler, parent) = {
                let dom = dom.borrow();
                let handler = dom
                    .element_data(target)
                    .and_then(|data| data.listeners.get(event.name()).cloned());
                (handler, dom.parent(target))
            };
            if let Some(handler) = handler {
                handler(event);
                ran += 1;
            }
            if event.is_propagation_stopped() {
                break;
            }
            current = parent;
        }
        ran
    }

    /// Dispatches a fresh event named `name` and returns it after handling.
    pub fn fire(dom: &Rc<RefCell<Self>>, node: NodeId, name: &str) -> Event {
        let mut event = Event::new(name);
        Self::dispatch(dom, node, &mut event);
        event
    }

    // ============================================================================
    // Arena
    // ============================================================================

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeEntry {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn entry_mut(&mut self, node: NodeId) -> Result<&mut NodeEntry, ZealError> {
        self.nodes
            .get_mut(node.index())
            .ok_or_else(|| ZealError::Render(format!("unknown node {node}")))
    }

    fn element_data(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData, ZealError> {
        match &mut self.entry_mut(node)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(ZealError::Render(format!("{node} is not an element"))),
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(entry) = self.nodes.get_mut(parent.index()) {
            entry.children.retain(|&child| child != node);
        }
        if let Some(entry) = self.nodes.get_mut(node.index()) {
            entry.parent = None;
        }
        self.log.push(Mutation::Remove { parent, node });
    }

    fn clear_children(&mut self, node: NodeId) -> Result<(), ZealError> {
        let children = core::mem::take(&mut self.entry_mut(node)?.children);
        for child in children {
            if let Some(entry) = self.nodes.get_mut(child.index()) {
                entry.parent = None;
            }
            self.log.push(Mutation::Remove {
                parent: node,
                node: child,
            });
        }
        Ok(())
    }
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    if !value.is_empty() {
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;"));
        out.push('"');
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str) -> Result<NodeId, ZealError> {
        if tag.is_empty() {
            return Err(ZealError::Render("empty tag name".to_owned()));
        }
        let node = self.push(NodeKind::Element(ElementData {
            tag: tag.to_owned(),
            ..ElementData::default()
        }));
        self.log.push(Mutation::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId, ZealError> {
        let node = self.push(NodeKind::Text(text.to_owned()));
        self.log.push(Mutation::CreateText {
            node,
            text: text.to_owned(),
        });
        Ok(node)
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), ZealError> {
        match &mut self.entry_mut(*node)?.kind {
            NodeKind::Text(data) => text.clone_into(data),
            NodeKind::Element(_) => {
                return Err(ZealError::Render(format!("{node} is not a text node")));
            }
        }
        self.log.push(Mutation::SetText {
            node: *node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) -> Result<(), ZealError> {
        self.element_mut(*node)?.inner_html = None;
        self.clear_children(*node)?;
        let child = self.push(NodeKind::Text(text.to_owned()));
        self.nodes[child.index()].parent = Some(*node);
        self.nodes[node.index()].children.push(child);
        self.log.push(Mutation::SetTextContent {
            node: *node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn set_inner_html(&mut self, node: &NodeId, html: &str) -> Result<(), ZealError> {
        self.element_mut(*node)?.inner_html = Some(html.to_owned());
        self.clear_children(*node)?;
        self.log.push(Mutation::SetInnerHtml {
            node: *node,
            html: html.to_owned(),
        });
        Ok(())
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), ZealError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ZealError::Render(format!("invalid attribute name `{name}`")));
        }
        self.element_mut(*node)?
            .attributes
            .insert(name.to_owned(), value.to_owned());
        self.log.push(Mutation::SetAttribute {
            node: *node,
            name: name.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), ZealError> {
        if self.element_mut(*node)?.attributes.shift_remove(name).is_some() {
            self.log.push(Mutation::RemoveAttribute {
                node: *node,
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    fn set_data(&mut self, node: &NodeId, key: &str, value: &str) -> Result<(), ZealError> {
        self.element_mut(*node)?
            .dataset
            .insert(key.to_owned(), value.to_owned());
        self.log.push(Mutation::SetData {
            node: *node,
            key: key.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    fn remove_data(&mut self, node: &NodeId, key: &str) -> Result<(), ZealError> {
        if self.element_mut(*node)?.dataset.shift_remove(key).is_some() {
            self.log.push(Mutation::RemoveData {
                node: *node,
                key: key.to_owned(),
            });
        }
        Ok(())
    }

    fn set_style(
        &mut self,
        node: &NodeId,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), ZealError> {
        let style = &mut self.element_mut(*node)?.style;
        match value {
            Some(value) => {
                style.insert(property.to_owned(), value.to_owned());
            }
            None => {
                style.shift_remove(property);
            }
        }
        self.log.push(Mutation::SetStyle {
            node: *node,
            property: property.to_owned(),
            value: value.map(str::to_owned),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: &NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), ZealError> {
        self.element_mut(*node)?
            .listeners
            .insert(event.to_owned(), handler);
        self.log.push(Mutation::AddListener {
            node: *node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_listener(&mut self, node: &NodeId, event: &str) -> Result<(), ZealError> {
        if self.element_mut(*node)?.listeners.shift_remove(event).is_some() {
            self.log.push(Mutation::RemoveListener {
                node: *node,
                event: event.to_owned(),
            });
        }
        Ok(())
    }

    fn clear_listeners(&mut self, node: &NodeId) {
        let Ok(data) = self.element_mut(*node) else {
            return;
        };
        let events: Vec<String> = data.listeners.drain(..).map(|(event, _)| event).collect();
        for event in events {
            self.log.push(Mutation::RemoveListener { node: *node, event });
        }
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), ZealError> {
        self.element_mut(*parent)?;
        self.entry_mut(*child)?;
        if parent == child {
            return Err(ZealError::Render(format!("cannot insert {child} into itself")));
        }
        if reference.is_some_and(|reference| self.parent(*reference) != Some(*parent)) {
            return Err(ZealError::Render(format!(
                "reference node is not a child of {parent}"
            )));
        }
        self.detach(*child);
        let children = &mut self.nodes[parent.index()].children;
        let index = reference
            .and_then(|reference| children.iter().position(|node| node == reference))
            .unwrap_or(children.len());
        children.insert(index, *child);
        self.nodes[child.index()].parent = Some(*parent);
        self.log.push(Mutation::Insert {
            parent: *parent,
            node: *child,
            index,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), ZealError> {
        if self.parent(*child) != Some(*parent) {
            return Err(ZealError::Render(format!("{child} is not a child of {parent}")));
        }
        self.detach(*child);
        Ok(())
    }

    fn child_at(&self, parent: &NodeId, index: usize) -> Option<NodeId> {
        self.children(*parent).get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeal_core::handler::into_handler;

    #[test]
    fn insert_before_moves_attached_nodes() {
        let mut dom = MemoryDom::new();
        let root = dom.container();
        let a = dom.create_text("a").unwrap();
        let b = dom.create_text("b").unwrap();
        dom.append_child(&root, &a).unwrap();
        dom.append_child(&root, &b).unwrap();
        dom.insert_before(&root, &b, Some(&a)).unwrap();

        assert_eq!(dom.children(root), &[b, a]);
        assert_eq!(dom.text_content(root), "ba");
    }

    #[test]
    fn reference_must_be_a_child() {
        let mut dom = MemoryDom::new();
        let root = dom.container();
        let other = dom.container();
        let a = dom.create_text("a").unwrap();
        let stray = dom.create_text("stray").unwrap();
        dom.append_child(&other, &stray).unwrap();

        assert!(dom.insert_before(&root, &a, Some(&stray)).is_err());
        assert!(dom.remove_child(&root, &stray).is_err());
    }

    #[test]
    fn outer_html_prints_attributes_dataset_and_style() {
        let mut dom = MemoryDom::new();
        let root = dom.container();
        let p = dom.create_element("p").unwrap();
        dom.set_attribute(&p, "id", "x").unwrap();
        dom.set_data(&p, "userId", "7").unwrap();
        dom.set_style(&p, "display", Some("none")).unwrap();
        let text = dom.create_text("hi").unwrap();
        dom.append_child(&p, &text).unwrap();
        dom.append_child(&root, &p).unwrap();

        assert_eq!(
            dom.inner_markup(root),
            r#"<p id="x" data-userId="7" style="display: none">hi</p>"#
        );
    }

    #[test]
    fn dispatch_bubbles_until_stopped() {
        let dom = Rc::new(RefCell::new(MemoryDom::new()));
        let hits = Rc::new(RefCell::new(Vec::new()));
        let (outer, inner) = {
            let mut dom = dom.borrow_mut();
            let outer = dom.create_element("div").unwrap();
            let inner = dom.create_element("button").unwrap();
            dom.append_child(&outer, &inner).unwrap();
            let log = hits.clone();
            dom.add_listener(&outer, "click", into_handler(move |_| log.borrow_mut().push("outer")))
                .unwrap();
            let log = hits.clone();
            dom.add_listener(&inner, "click", into_handler(move |_| log.borrow_mut().push("inner")))
                .unwrap();
            (outer, inner)
        };

        assert_eq!(MemoryDom::dispatch(&dom, inner, &mut Event::new("click")), 2);
        assert_eq!(*hits.borrow(), ["inner", "outer"]);

        dom.borrow_mut()
            .add_listener(&inner, "click", into_handler(|event| event.stop_propagation()))
            .unwrap();
        assert_eq!(MemoryDom::dispatch(&dom, inner, &mut Event::new("click")), 1);
        assert_eq!(MemoryDom::dispatch(&dom, outer, &mut Event::new("input")), 0);
    }

    #[test]
    fn handlers_may_mutate_the_document() {
        let dom = Rc::new(RefCell::new(MemoryDom::new()));
        let button = dom.borrow_mut().create_element("button").unwrap();
        let target = dom.clone();
        dom.borrow_mut()
            .add_listener(
                &button,
                "click",
                into_handler(move |_| {
                    let mut dom = target.borrow_mut();
                    dom.set_attribute(&button, "clicked", "").unwrap();
                }),
            )
            .unwrap();

        MemoryDom::fire(&dom, button, "click");
        assert_eq!(dom.borrow().attribute(button, "clicked"), Some(""));
    }

    #[test]
    fn clear_listeners_drops_every_record() {
        let mut dom = MemoryDom::new();
        let button = dom.create_element("button").unwrap();
        dom.add_listener(&button, "click", into_handler(|_| {})).unwrap();
        dom.add_listener(&button, "input", into_handler(|_| {})).unwrap();
        assert_eq!(dom.total_listeners(), 2);
        dom.clear_listeners(&button);
        assert_eq!(dom.total_listeners(), 0);
    }
}
