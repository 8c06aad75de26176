//! Mounting virtual trees.

use core::fmt;
use std::rc::Rc;

use zeal_core::{EventHandler, Lifecycle, Prop, Str, VChild, VNode, ZealError, report};
use zeal_reactive::ReactiveState;

use crate::{
    directive::DirectiveRegistry,
    host::{Dom, dataset_key},
};

/// Called when an element is mounted or about to be torn down.
pub type LifecycleHook<N> = Rc<dyn Fn(Lifecycle, &N)>;

/// Builds virtual trees into host nodes.
///
/// The renderer owns the lifecycle hooks and the directive binding; the
/// [`Patcher`](crate::Patcher) mounts and tears down through it so both paths fire the
/// same hooks.
pub struct Renderer<D: Dom> {
    hooks: Vec<LifecycleHook<D::Node>>,
    directives: Option<(Rc<DirectiveRegistry<D>>, ReactiveState)>,
}

impl<D: Dom> Clone for Renderer<D> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
            directives: self.directives.clone(),
        }
    }
}

impl<D: Dom> Default for Renderer<D> {
    fn default() -> Self {
        Self {
            hooks: Vec::new(),
            directives: None,
        }
    }
}

impl<D: Dom> fmt::Debug for Renderer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("hooks", &self.hooks.len())
            .field("directives", &self.directives.as_ref().map(|(registry, _)| registry))
            .finish()
    }
}

impl<D: Dom> Renderer<D> {
    /// A renderer without hooks or directives.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hook called for every mounted and every torn-down element.
    #[must_use]
    pub fn with_hook(mut self, hook: impl Fn(Lifecycle, &D::Node) + 'static) -> Self {
        self.hooks.push(Rc::new(hook));
        self
    }

    /// Runs `data-<name>` attributes through `registry`, against `state`.
    #[must_use]
    pub fn with_directives(mut self, registry: Rc<DirectiveRegistry<D>>, state: ReactiveState) -> Self {
        self.directives = Some((registry, state));
        self
    }

    /// Builds `vnode` and appends it to `container`.
    ///
    /// Returns the created node, or `None` after reporting the failure.
    pub fn render(&self, dom: &mut D, vnode: &VChild, container: &D::Node) -> Option<D::Node> {
        let result = self
            .create(dom, vnode)
            .and_then(|node| dom.append_child(container, &node).map(|()| node));
        match result {
            Ok(node) => Some(node),
            Err(error) => {
                report(error);
                None
            }
        }
    }

    /// Builds `vnode` into a detached host node.
    ///
    /// Children are attached before the mount hook fires for their parent.
    ///
    /// # Errors
    ///
    /// Returns the first host failure; nodes created before it are left detached.
    pub fn create(&self, dom: &mut D, vnode: &VChild) -> Result<D::Node, ZealError> {
        match vnode {
            VChild::Text(text) => dom.create_text(text),
            VChild::Html(markup) => {
                let wrapper = dom.create_element("div")?;
                dom.set_inner_html(&wrapper, markup)?;
                self.fire(Lifecycle::Mount, &wrapper);
                Ok(wrapper)
            }
            VChild::Element(element) => {
                let node = dom.create_element(element.tag())?;
                for (name, prop) in element.attributes() {
                    self.apply_attribute(dom, &node, name, Some(prop))?;
                }
                for (event, handler) in element.listeners() {
                    Self::bind_listener(dom, &node, event, handler.clone())?;
                }
                for child in element.children() {
                    let child = self.create(dom, child)?;
                    dom.append_child(&node, &child)?;
                }
                self.run_directives(dom, &node, element);
                self.fire(Lifecycle::Mount, &node);
                Ok(node)
            }
        }
    }

    /// Writes one attribute prop, or removes it when `prop` is absent or falsy.
    ///
    /// `data-*` names go to the dataset under their camel-cased key.
    pub(crate) fn apply_attribute(
        &self,
        dom: &mut D,
        node: &D::Node,
        name: &Str,
        prop: Option<&Prop>,
    ) -> Result<(), ZealError> {
        let value = prop.and_then(Prop::attribute_value);
        match (dataset_key(name), value) {
            (Some(key), Some(value)) => dom.set_data(node, &key, &value),
            (Some(key), None) => dom.remove_data(node, &key),
            (None, Some(value)) => dom.set_attribute(node, name, &value),
            (None, None) => dom.remove_attribute(node, name),
        }
    }

    /// Replaces the listener for `event`.
    pub(crate) fn bind_listener(
        dom: &mut D,
        node: &D::Node,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), ZealError> {
        dom.remove_listener(node, event)?;
        dom.add_listener(node, event, handler)
    }

    /// Runs every registered directive named by a `data-*` attribute of `element`.
    pub(crate) fn run_directives(&self, dom: &mut D, node: &D::Node, element: &VNode) {
        let Some((registry, state)) = &self.directives else {
            return;
        };
        for (name, prop) in element.attributes() {
            let Some(handler) = name
                .strip_prefix("data-")
                .and_then(|directive| registry.get(directive))
            else {
                continue;
            };
            let value = prop.attribute_value().unwrap_or_default();
            if let Err(error) = handler(dom, node, &value, state) {
                report(error);
            }
        }
    }

    /// Fires teardown hooks for `node` and its element descendants, deepest first, and
    /// drops their listener records. Does not detach anything.
    pub(crate) fn teardown(&self, dom: &mut D, node: &D::Node, vnode: &VChild) {
        match vnode {
            VChild::Text(_) => {}
            VChild::Html(_) => self.fire(Lifecycle::Teardown, node),
            VChild::Element(element) => {
                for (index, child) in element.children().iter().enumerate() {
                    if matches!(child, VChild::Text(_)) {
                        continue;
                    }
                    if let Some(child_node) = dom.child_at(node, index) {
                        self.teardown(dom, &child_node, child);
                    }
                }
                self.fire(Lifecycle::Teardown, node);
                dom.clear_listeners(node);
            }
        }
    }

    fn fire(&self, moment: Lifecycle, node: &D::Node) {
        for hook in &self.hooks {
            hook(moment, node);
        }
    }
}
