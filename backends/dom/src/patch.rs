//! Reconciling a new virtual tree against the previous one.
//!
//! Attribute work on an element is gated by the patch flags of the two nodes:
//!
//! | Flag | Work |
//! |---|---|
//! | `CLASS` | diff `class` |
//! | `STYLE` | diff `style` |
//! | `PROPS`, `FULL_PROPS` | diff every other attribute of the new node |
//! | `FULL_PROPS` | also remove attributes only the old node had |
//! | `HYDRATE` | rebind every listener |
//!
//! Children are always walked. Keyed children are matched by key and moved into place;
//! every other child is matched by position only, so an unkeyed element is replaced
//! rather than patched. Text compares by value.

use core::fmt;
use std::collections::{HashMap, HashSet};

use zeal_core::{PatchFlags, Prop, Str, VChild, VNode, ZealError, report, vnode::EVENT_PREFIX};

use crate::{host::Dom, render::Renderer};

/// Applies the difference between two virtual trees to the document.
pub struct Patcher<D: Dom> {
    renderer: Renderer<D>,
}

impl<D: Dom> Clone for Patcher<D> {
    fn clone(&self) -> Self {
        Self {
            renderer: self.renderer.clone(),
        }
    }
}

impl<D: Dom> fmt::Debug for Patcher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patcher")
            .field("renderer", &self.renderer)
            .finish()
    }
}

impl<D: Dom> Default for Patcher<D> {
    fn default() -> Self {
        Self::new(Renderer::new())
    }
}

impl<D: Dom> Patcher<D> {
    /// A patcher that mounts through `renderer`.
    #[must_use]
    pub const fn new(renderer: Renderer<D>) -> Self {
        Self { renderer }
    }

    /// The renderer used for mounting.
    #[must_use]
    pub const fn renderer(&self) -> &Renderer<D> {
        &self.renderer
    }

    /// Reconciles the child of `parent` at `index`.
    ///
    /// - `new` absent: the old node is torn down and detached;
    /// - `old` absent: `new` is mounted at `index`;
    /// - both present: patched in place, or replaced when they cannot be.
    ///
    /// Failures are reported; a failing subtree keeps its previous state and the rest
    /// of the pass continues.
    pub fn update(
        &self,
        dom: &mut D,
        parent: &D::Node,
        new: Option<&VChild>,
        old: Option<&VChild>,
        index: usize,
    ) {
        if let Err(error) = self.try_update(dom, parent, new, old, index) {
            report(error);
        }
    }

    fn try_update(
        &self,
        dom: &mut D,
        parent: &D::Node,
        new: Option<&VChild>,
        old: Option<&VChild>,
        index: usize,
    ) -> Result<(), ZealError> {
        match (new, old) {
            (None, None) => Ok(()),
            (None, Some(old)) => {
                let node = node_at(dom, parent, index)?;
                self.remove(dom, parent, &node, old)
            }
            (Some(new), None) => self.mount_at(dom, parent, index, new),
            (Some(new), Some(old)) => {
                let node = node_at(dom, parent, index)?;
                self.patch(dom, parent, &node, new, old)
            }
        }
    }

    // ============================================================================
    // Nodes
    // ============================================================================

    fn patch(
        &self,
        dom: &mut D,
        parent: &D::Node,
        node: &D::Node,
        new: &VChild,
        old: &VChild,
    ) -> Result<(), ZealError> {
        if new.same_ref(old) {
            return Ok(());
        }
        match (new, old) {
            (VChild::Text(new_text), VChild::Text(old_text)) => {
                if new_text != old_text {
                    dom.set_text(node, new_text)?;
                }
                Ok(())
            }
            (VChild::Element(new_element), VChild::Element(old_element))
                if new_element.tag() == old_element.tag() =>
            {
                self.patch_attributes(dom, node, new_element, old_element)?;
                self.patch_children(dom, node, new_element.children(), old_element.children());
                self.renderer.run_directives(dom, node, new_element);
                Ok(())
            }
            _ => self.replace(dom, parent, node, new, old),
        }
    }

    fn mount_at(
        &self,
        dom: &mut D,
        parent: &D::Node,
        index: usize,
        new: &VChild,
    ) -> Result<(), ZealError> {
        let node = self.renderer.create(dom, new)?;
        let reference = dom.child_at(parent, index);
        dom.insert_before(parent, &node, reference.as_ref())
    }

    fn remove(
        &self,
        dom: &mut D,
        parent: &D::Node,
        node: &D::Node,
        old: &VChild,
    ) -> Result<(), ZealError> {
        self.renderer.teardown(dom, node, old);
        dom.remove_child(parent, node)
    }

    /// Tears `node` down and mounts `new` where it was.
    fn replace(
        &self,
        dom: &mut D,
        parent: &D::Node,
        node: &D::Node,
        new: &VChild,
        old: &VChild,
    ) -> Result<(), ZealError> {
        self.renderer.teardown(dom, node, old);
        let fresh = self.renderer.create(dom, new)?;
        dom.insert_before(parent, &fresh, Some(node))?;
        dom.remove_child(parent, node)
    }

    // ============================================================================
    // Attributes
    // ============================================================================

    fn patch_attributes(
        &self,
        dom: &mut D,
        node: &D::Node,
        new: &VNode,
        old: &VNode,
    ) -> Result<(), ZealError> {
        let flags = new.flags() | old.flags();
        if flags.is_empty() {
            return Ok(());
        }

        if flags.contains(PatchFlags::CLASS) {
            self.diff_attribute(dom, node, &Str::from("class"), new, old)?;
        }
        if flags.contains(PatchFlags::STYLE) {
            self.diff_attribute(dom, node, &Str::from("style"), new, old)?;
        }
        if flags.needs_props() {
            for (name, _) in new.attributes() {
                if &**name != "class" && &**name != "style" {
                    self.diff_attribute(dom, node, name, new, old)?;
                }
            }
        }
        if flags.contains(PatchFlags::FULL_PROPS) {
            for (name, _) in old.attributes() {
                if new.prop(name).is_none() {
                    tracing::trace!(target: "zeal::dom", attribute = %name, "removing stale attribute");
                    self.renderer.apply_attribute(dom, node, name, None)?;
                }
            }
        }
        if flags.contains(PatchFlags::HYDRATE) {
            for (event, _) in old.listeners() {
                if new.prop(&format!("{EVENT_PREFIX}{event}")).is_none() {
                    dom.remove_listener(node, event)?;
                }
            }
            for (event, handler) in new.listeners() {
                Renderer::bind_listener(dom, node, event, handler.clone())?;
            }
        }
        Ok(())
    }

    fn diff_attribute(
        &self,
        dom: &mut D,
        node: &D::Node,
        name: &Str,
        new: &VNode,
        old: &VNode,
    ) -> Result<(), ZealError> {
        let next = new.prop(name);
        let changed = next.is_some_and(Prop::is_accessor)
            || next.and_then(Prop::attribute_value) != old.prop(name).and_then(Prop::attribute_value);
        if changed {
            self.renderer.apply_attribute(dom, node, name, next)?;
        }
        Ok(())
    }

    // ============================================================================
    // Children
    // ============================================================================

    /// Walks new and old children side by side.
    ///
    /// A new child whose key names an old child takes that child's node, moved into
    /// place and patched. Any other new child pairs with the old child at the same
    /// position unless that one is claimed by key: text is updated in place, anything
    /// else is replaced. Old children nothing claimed are removed at the end.
    fn patch_children(&self, dom: &mut D, parent: &D::Node, new: &[VChild], old: &[VChild]) {
        let old_nodes: Vec<Option<D::Node>> = (0..old.len()).map(|index| dom.child_at(parent, index)).collect();
        let keyed: HashMap<&str, usize> = old
            .iter()
            .enumerate()
            .filter_map(|(index, child)| child.key().map(|key| (key, index)))
            .collect();
        let new_keys: HashSet<&str> = new.iter().filter_map(VChild::key).collect();
        let mut claimed = vec![false; old.len()];

        for (index, child) in new.iter().enumerate() {
            let by_key = child
                .key()
                .and_then(|key| keyed.get(key).copied())
                .filter(|&matched| !claimed[matched]);
            let result = if let Some(matched) = by_key {
                claimed[matched] = true;
                self.relocate(dom, parent, old_nodes[matched].as_ref(), index, child, &old[matched])
            } else {
                let positional = old.get(index).filter(|previous| {
                    !claimed[index] && !previous.key().is_some_and(|key| new_keys.contains(key))
                });
                if let Some(previous) = positional {
                    claimed[index] = true;
                    self.replace_positional(dom, parent, old_nodes[index].as_ref(), index, child, previous)
                } else {
                    self.mount_at(dom, parent, index, child)
                }
            };
            if let Err(error) = result {
                report(error);
            }
        }

        for ((previous, node), claimed) in old.iter().zip(&old_nodes).zip(claimed) {
            let Some(node) = node.as_ref().filter(|_| !claimed) else {
                continue;
            };
            if let Err(error) = self.remove(dom, parent, node, previous) {
                report(error);
            }
        }
    }

    fn relocate(
        &self,
        dom: &mut D,
        parent: &D::Node,
        node: Option<&D::Node>,
        index: usize,
        new: &VChild,
        old: &VChild,
    ) -> Result<(), ZealError> {
        let node = node.ok_or_else(|| missing(index))?;
        let current = dom.child_at(parent, index);
        if current.as_ref() != Some(node) {
            tracing::debug!(target: "zeal::dom", key = new.key(), index, "moving keyed node");
            dom.insert_before(parent, node, current.as_ref())?;
        }
        self.patch(dom, parent, node, new, old)
    }

    fn replace_positional(
        &self,
        dom: &mut D,
        parent: &D::Node,
        node: Option<&D::Node>,
        index: usize,
        new: &VChild,
        old: &VChild,
    ) -> Result<(), ZealError> {
        let node = node.ok_or_else(|| missing(index))?;
        let current = dom.child_at(parent, index);
        let keep = new.same_ref(old) || matches!((new, old), (VChild::Text(_), VChild::Text(_)));
        if keep {
            if current.as_ref() != Some(node) {
                dom.insert_before(parent, node, current.as_ref())?;
            }
            return self.patch(dom, parent, node, new, old);
        }

        tracing::trace!(target: "zeal::dom", index, "replacing unkeyed child");
        self.renderer.teardown(dom, node, old);
        let fresh = self.renderer.create(dom, new)?;
        dom.insert_before(parent, &fresh, current.as_ref())?;
        dom.remove_child(parent, node)
    }
}

fn node_at<D: Dom>(dom: &D, parent: &D::Node, index: usize) -> Result<D::Node, ZealError> {
    dom.child_at(parent, index).ok_or_else(|| missing(index))
}

fn missing(index: usize) -> ZealError {
    ZealError::Reconcile(format!("no node at child index {index}"))
}
