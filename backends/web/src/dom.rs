use core::{cell::Cell, fmt};
use std::rc::Rc;

use wasm_bindgen::{JsCast, closure::Closure};
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, Node, Window};
use zeal_core::{Event, EventHandler, ZealError, report};
use zeal_dom::{Dom, FrameCallback, FrameScheduler};

use crate::error::{WebError, js};

struct Listener {
    node: Node,
    event: String,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    fn detach(&self) -> Result<(), ZealError> {
        self.node
            .remove_event_listener_with_callback(&self.event, self.closure.as_ref().unchecked_ref())
            .map_err(js)
    }
}

/// The browser document, seen through the [`Dom`] trait.
///
/// Listener closures live here until their node is torn down, so a removed node
/// never keeps Rust state alive.
pub struct WebDom {
    document: Document,
    listeners: Vec<Listener>,
}

impl fmt::Debug for WebDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDom")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl WebDom {
    /// Wraps the document of the current window.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::DomUnavailable`] outside a browser.
    pub fn new() -> Result<Self, WebError> {
        let window: Window = web_sys::window().ok_or(WebError::DomUnavailable)?;
        let document: Document = window.document().ok_or(WebError::DomUnavailable)?;
        Ok(Self::from_document(document))
    }

    /// Wraps `document`.
    #[must_use]
    pub const fn from_document(document: Document) -> Self {
        Self {
            document,
            listeners: Vec::new(),
        }
    }

    /// Returns the owning document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// The element with id `id`, to mount into.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::RootNotFound`] when no such element exists.
    pub fn root(&self, id: &str) -> Result<Node, WebError> {
        self.document
            .get_element_by_id(id)
            .map(Node::from)
            .ok_or_else(|| WebError::RootNotFound(id.to_owned()))
    }

    /// Removes every child of `node`, dropping the listeners held for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser refuses a removal.
    pub fn clear(&mut self, node: &Node) -> Result<(), WebError> {
        while let Some(child) = node.first_child() {
            self.forget_subtree(&child);
            node.remove_child(&child)?;
        }
        Ok(())
    }

    /// Number of listeners currently registered through this document.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn forget_subtree(&mut self, root: &Node) {
        self.listeners.retain(|listener| {
            let inside = root.contains(Some(&listener.node));
            if inside {
                let _ = listener.detach();
            }
            !inside
        });
    }
}

fn element(node: &Node) -> Result<&Element, ZealError> {
    node.dyn_ref::<Element>()
        .ok_or_else(|| WebError::WrongNode { expected: "an element" }.into())
}

fn html_element(node: &Node) -> Result<&HtmlElement, ZealError> {
    node.dyn_ref::<HtmlElement>()
        .ok_or_else(|| WebError::WrongNode { expected: "an HTML element" }.into())
}

/// Translates a browser event into the framework event and applies the handler's
/// requests back onto it.
fn dispatch(handler: &EventHandler, native: &web_sys::Event) {
    let mut event = Event::new(native.type_());
    let value = native
        .target()
        .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
        .map(|input| input.value());
    if let Some(value) = value {
        event = event.with_value(value);
    }

    handler(&mut event);

    if event.is_default_prevented() {
        native.prevent_default();
    }
    if event.is_propagation_stopped() {
        native.stop_propagation();
    }
}

impl Dom for WebDom {
    type Node = Node;

    fn create_element(&mut self, tag: &str) -> Result<Node, ZealError> {
        self.document.create_element(tag).map(Node::from).map_err(js)
    }

    fn create_text(&mut self, text: &str) -> Result<Node, ZealError> {
        Ok(self.document.create_text_node(text).into())
    }

    fn set_text(&mut self, node: &Node, text: &str) -> Result<(), ZealError> {
        node.set_node_value(Some(text));
        Ok(())
    }

    fn set_text_content(&mut self, node: &Node, text: &str) -> Result<(), ZealError> {
        self.forget_subtree_children(node);
        node.set_text_content(Some(text));
        Ok(())
    }

    fn set_inner_html(&mut self, node: &Node, html: &str) -> Result<(), ZealError> {
        let element = element(node)?;
        self.forget_subtree_children(node);
        element.set_inner_html(html);
        Ok(())
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<(), ZealError> {
        element(node)?.set_attribute(name, value).map_err(js)?;
        if name == "value" {
            if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
                input.set_value(value);
            }
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) -> Result<(), ZealError> {
        element(node)?.remove_attribute(name).map_err(js)
    }

    fn set_data(&mut self, node: &Node, key: &str, value: &str) -> Result<(), ZealError> {
        html_element(node)?.dataset().set(key, value).map_err(js)
    }

    fn remove_data(&mut self, node: &Node, key: &str) -> Result<(), ZealError> {
        let mut attribute = String::from("data-");
        for c in key.chars() {
            if c.is_ascii_uppercase() {
                attribute.push('-');
                attribute.push(c.to_ascii_lowercase());
            } else {
                attribute.push(c);
            }
        }
        element(node)?.remove_attribute(&attribute).map_err(js)
    }

    fn set_style(&mut self, node: &Node, property: &str, value: Option<&str>) -> Result<(), ZealError> {
        let style = html_element(node)?.style();
        match value {
            Some(value) => style.set_property(property, value).map_err(js),
            None => style.remove_property(property).map(drop).map_err(js),
        }
    }

    fn add_listener(&mut self, node: &Node, event: &str, handler: EventHandler) -> Result<(), ZealError> {
        self.remove_listener(node, event)?;
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |native: web_sys::Event| {
            dispatch(&handler, &native);
        });
        node.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(js)?;
        self.listeners.push(Listener {
            node: node.clone(),
            event: event.to_owned(),
            closure,
        });
        Ok(())
    }

    fn remove_listener(&mut self, node: &Node, event: &str) -> Result<(), ZealError> {
        let Some(position) = self
            .listeners
            .iter()
            .position(|listener| listener.node == *node && listener.event == event)
        else {
            return Ok(());
        };
        self.listeners.swap_remove(position).detach()
    }

    fn clear_listeners(&mut self, node: &Node) {
        self.listeners.retain(|listener| {
            let owned = listener.node == *node;
            if owned {
                if let Err(error) = listener.detach() {
                    report(error);
                }
            }
            !owned
        });
    }

    fn insert_before(&mut self, parent: &Node, child: &Node, reference: Option<&Node>) -> Result<(), ZealError> {
        parent.insert_before(child, reference).map(drop).map_err(js)
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) -> Result<(), ZealError> {
        parent.remove_child(child).map(drop).map_err(js)
    }

    fn child_at(&self, parent: &Node, index: usize) -> Option<Node> {
        u32::try_from(index)
            .ok()
            .and_then(|index| parent.child_nodes().item(index))
    }
}

impl WebDom {
    fn forget_subtree_children(&mut self, node: &Node) {
        let children = node.child_nodes();
        for index in 0..children.length() {
            if let Some(child) = children.item(index) {
                self.forget_subtree(&child);
            }
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Delivers frames through `requestAnimationFrame`.
#[derive(Debug, Clone)]
pub struct AnimationFrameScheduler {
    window: Window,
}

impl AnimationFrameScheduler {
    /// A scheduler bound to the current window.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::DomUnavailable`] outside a browser.
    pub fn new() -> Result<Self, WebError> {
        let window = web_sys::window().ok_or(WebError::DomUnavailable)?;
        Ok(Self { window })
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        let slot = Rc::new(Cell::new(Some(callback)));
        let pending = Rc::clone(&slot);
        let closure = Closure::once_into_js(move || {
            if let Some(callback) = pending.take() {
                callback();
            }
        });
        if let Err(error) = self.window.request_animation_frame(closure.unchecked_ref()) {
            // Without a frame the queue would never drain.
            report(js(error));
            if let Some(callback) = slot.take() {
                callback();
            }
        }
    }
}
