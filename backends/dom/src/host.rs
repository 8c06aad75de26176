//! The host document seen by the renderer and reconciler.

use core::fmt::Debug;

use zeal_core::{EventHandler, ZealError};

/// A document the renderer can build into.
///
/// Node handles are cheap to clone and compare by identity. Every operation may fail
/// (a detached node, a host exception); failures come back as [`ZealError`] so the
/// caller can report them and carry on with the rest of the tree.
pub trait Dom {
    /// A handle to an element or text node.
    type Node: Clone + PartialEq + Debug;

    /// Creates a detached element.
    ///
    /// # Errors
    ///
    /// Returns an error when the host rejects the tag.
    fn create_element(&mut self, tag: &str) -> Result<Self::Node, ZealError>;

    /// Creates a detached text node.
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot create the node.
    fn create_text(&mut self, text: &str) -> Result<Self::Node, ZealError>;

    /// Replaces the data of a text node.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not a text node.
    fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), ZealError>;

    /// Replaces all children of an element with a single text node.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not an element.
    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> Result<(), ZealError>;

    /// Replaces all children of an element with unescaped markup.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not an element or the host rejects the markup.
    fn set_inner_html(&mut self, node: &Self::Node, html: &str) -> Result<(), ZealError>;

    /// Sets an attribute.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not an element or the name is invalid.
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), ZealError>;

    /// Removes an attribute. Removing an absent attribute is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not an element.
    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), ZealError>;

    /// Sets a dataset entry; `key` is already camel-cased.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not an element.
    fn set_data(&mut self, node: &Self::Node, key: &str, value: &str) -> Result<(), ZealError>;

    /// Removes a dataset entry.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not an element.
    fn remove_data(&mut self, node: &Self::Node, key: &str) -> Result<(), ZealError>;

    /// Sets (`Some`) or clears (`None`) one inline style property.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` is not an element.
    fn set_style(
        &mut self,
        node: &Self::Node,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), ZealError>;

    /// Registers the listener for `event`, replacing any previous one for that name.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` cannot carry listeners.
    fn add_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), ZealError>;

    /// Removes the listener for `event`, if one is registered.
    ///
    /// # Errors
    ///
    /// Returns an error when `node` cannot carry listeners.
    fn remove_listener(&mut self, node: &Self::Node, event: &str) -> Result<(), ZealError>;

    /// Drops every listener record held for `node`.
    fn clear_listeners(&mut self, node: &Self::Node);

    /// Inserts `child` before `reference`, or appends it when `reference` is `None`.
    ///
    /// A child that is already attached somewhere is moved.
    ///
    /// # Errors
    ///
    /// Returns an error when `reference` is not a child of `parent`.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), ZealError>;

    /// Detaches `child` from `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error when `child` is not a child of `parent`.
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), ZealError>;

    /// The child at `index`, counting text nodes.
    fn child_at(&self, parent: &Self::Node, index: usize) -> Option<Self::Node>;

    /// Appends `child` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// See [`Dom::insert_before`].
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), ZealError> {
        self.insert_before(parent, child, None)
    }
}

/// Maps a `data-*` attribute name to its dataset key.
///
/// `data-user-id` becomes `userId`. A dash is only folded away when a lowercase ASCII
/// letter follows it, the same rule browsers apply. Returns `None` for names without
/// the `data-` prefix.
#[must_use]
pub fn dataset_key(attribute: &str) -> Option<String> {
    let rest = attribute.strip_prefix("data-")?;
    let mut key = String::with_capacity(rest.len());
    let mut chars = rest.chars().peekable();
    while let Some(ch) = chars.next() {
        match chars.peek() {
            Some(next) if ch == '-' && next.is_ascii_lowercase() => {
                key.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => key.push(ch),
        }
    }
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::dataset_key;

    #[test]
    fn dataset_keys_are_camel_cased() {
        assert_eq!(dataset_key("data-user-id").as_deref(), Some("userId"));
        assert_eq!(dataset_key("data-show").as_deref(), Some("show"));
        assert_eq!(dataset_key("data-x-1").as_deref(), Some("x-1"));
        assert_eq!(dataset_key("data-z-1a2b").as_deref(), Some("z-1a2b"));
        assert_eq!(dataset_key("title"), None);
    }
}
