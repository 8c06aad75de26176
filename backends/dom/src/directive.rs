//! `data-<name>` directives.
//!
//! A [`DirectiveRegistry`] is an explicit object handed to a
//! [`Renderer`](crate::Renderer); nothing is registered globally. Whenever an element
//! carrying `data-<name>` is mounted or patched and `<name>` is registered, the handler
//! runs with the attribute value and the component state.
//!
//! | Name | Value | Effect |
//! |---|---|---|
//! | `model` | `path` | `value` from state, `input` writes back |
//! | `show` | expression | `display: none` while falsy |
//! | `text` | expression | text content |
//! | `html` | expression | unescaped inner markup |
//! | `bind` | `attr:path` | attribute from state |

use core::fmt;
use std::{collections::BTreeMap, rc::Rc};

use zeal_core::{Prop, Str, ZealError, evaluate_in, handler::into_handler, report};
use zeal_reactive::ReactiveState;

use crate::host::Dom;

/// Runs for an element carrying the directive's attribute.
///
/// Receives the document, the element, the attribute value and the component state.
pub type DirectiveHandler<D> =
    Rc<dyn Fn(&mut D, &<D as Dom>::Node, &str, &ReactiveState) -> Result<(), ZealError>>;

/// Named directive handlers.
pub struct DirectiveRegistry<D: Dom> {
    handlers: BTreeMap<Str, DirectiveHandler<D>>,
}

impl<D: Dom> fmt::Debug for DirectiveRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

impl<D: Dom> Clone for DirectiveRegistry<D> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<D: Dom> Default for DirectiveRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dom> DirectiveRegistry<D> {
    /// An empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// A registry with `model`, `show`, `text`, `html` and `bind` registered.
    #[must_use]
    pub fn with_builtins() -> Self
    where
        D: 'static,
    {
        let mut registry = Self::new();
        registry.register("model", model::<D>);
        registry.register("show", show::<D>);
        registry.register("text", text::<D>);
        registry.register("html", html::<D>);
        registry.register("bind", bind::<D>);
        registry
    }

    /// Registers `handler` under `name` (without the `data-` prefix), replacing any
    /// previous handler.
    pub fn register(
        &mut self,
        name: impl Into<Str>,
        handler: impl Fn(&mut D, &D::Node, &str, &ReactiveState) -> Result<(), ZealError> + 'static,
    ) {
        let name = name.into();
        if self.handlers.insert(name.clone(), Rc::new(handler)).is_some() {
            tracing::debug!(target: "zeal::dom", directive = %name, "replaced directive handler");
        }
    }

    /// Removes a directive, returning whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    /// The handler registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DirectiveHandler<D>> {
        self.handlers.get(name)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|name| &**name)
    }
}

// ============================================================================
// Built-ins
// ============================================================================

fn model<D: Dom>(
    dom: &mut D,
    node: &D::Node,
    path: &str,
    state: &ReactiveState,
) -> Result<(), ZealError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(ZealError::directive("model", "expected a state path"));
    }
    let value = evaluate_in(path, state);
    dom.set_attribute(node, "value", &value.to_display_string())?;

    let state = state.clone();
    let path = Str::from(path);
    dom.remove_listener(node, "input")?;
    dom.add_listener(
        node,
        "input",
        into_handler(move |event| {
            let value = event.value().unwrap_or_default().to_owned();
            if let Err(error) = state.set_path(&path, value) {
                report(error);
            }
        }),
    )
}

fn show<D: Dom>(
    dom: &mut D,
    node: &D::Node,
    expr: &str,
    state: &ReactiveState,
) -> Result<(), ZealError> {
    let visible = evaluate_in(expr, state).is_truthy();
    dom.set_style(node, "display", (!visible).then_some("none"))
}

fn text<D: Dom>(
    dom: &mut D,
    node: &D::Node,
    expr: &str,
    state: &ReactiveState,
) -> Result<(), ZealError> {
    dom.set_text_content(node, &evaluate_in(expr, state).to_display_string())
}

fn html<D: Dom>(
    dom: &mut D,
    node: &D::Node,
    expr: &str,
    state: &ReactiveState,
) -> Result<(), ZealError> {
    dom.set_inner_html(node, &evaluate_in(expr, state).to_display_string())
}

fn bind<D: Dom>(
    dom: &mut D,
    node: &D::Node,
    binding: &str,
    state: &ReactiveState,
) -> Result<(), ZealError> {
    let Some((attribute, path)) = binding.split_once(':') else {
        return Err(ZealError::directive(
            "bind",
            format!("expected `attr:path`, found `{binding}`"),
        ));
    };
    let attribute = attribute.trim();
    match Prop::Value(evaluate_in(path.trim(), state)).attribute_value() {
        Some(value) => dom.set_attribute(node, attribute, &value),
        None => dom.remove_attribute(node, attribute),
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;

    use serde_json::json;
    use zeal_core::Event;

    use super::*;
    use crate::{MemoryDom, NodeId};

    fn element(dom: &mut MemoryDom) -> NodeId {
        dom.create_element("div").unwrap()
    }

    #[test]
    fn builtins_are_registered() {
        let registry = DirectiveRegistry::<MemoryDom>::with_builtins();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["bind", "html", "model", "show", "text"]
        );
    }

    #[test]
    fn show_toggles_display() {
        let state = ReactiveState::new(json!({ "open": false }));
        let registry = DirectiveRegistry::<MemoryDom>::with_builtins();
        let show = registry.get("show").unwrap();
        let mut dom = MemoryDom::new();
        let node = element(&mut dom);

        show(&mut dom, &node, "open", &state).unwrap();
        assert_eq!(dom.style(node, "display"), Some("none"));

        state.set("open", true);
        show(&mut dom, &node, "open", &state).unwrap();
        assert_eq!(dom.style(node, "display"), None);
    }

    #[test]
    fn text_and_html_replace_content() {
        let state = ReactiveState::new(json!({ "label": "<b>hi</b>" }));
        let registry = DirectiveRegistry::<MemoryDom>::with_builtins();
        let mut dom = MemoryDom::new();
        let node = element(&mut dom);

        registry.get("text").unwrap()(&mut dom, &node, "label", &state).unwrap();
        assert_eq!(dom.text_content(node), "<b>hi</b>");

        registry.get("html").unwrap()(&mut dom, &node, "label", &state).unwrap();
        assert_eq!(dom.inner_html(node), Some("<b>hi</b>"));
        assert!(dom.children(node).is_empty());
    }

    #[test]
    fn bind_sets_and_removes_attributes() {
        let state = ReactiveState::new(json!({ "link": { "href": "/a" }, "off": false }));
        let registry = DirectiveRegistry::<MemoryDom>::with_builtins();
        let bind = registry.get("bind").unwrap();
        let mut dom = MemoryDom::new();
        let node = element(&mut dom);

        bind(&mut dom, &node, "href:link.href", &state).unwrap();
        assert_eq!(dom.attribute(node, "href"), Some("/a"));

        bind(&mut dom, &node, "href:off", &state).unwrap();
        assert_eq!(dom.attribute(node, "href"), None);

        let error = bind(&mut dom, &node, "href", &state).unwrap_err();
        assert!(matches!(error, ZealError::Directive { ref name, .. } if name == "bind"));
    }

    #[test]
    fn model_reads_and_writes_back() {
        let state = ReactiveState::new(json!({ "form": { "name": "Ada" } }));
        let registry = DirectiveRegistry::<MemoryDom>::with_builtins();
        let dom = Rc::new(RefCell::new(MemoryDom::new()));
        let node = element(&mut dom.borrow_mut());

        registry.get("model").unwrap()(&mut dom.borrow_mut(), &node, "form.name", &state).unwrap();
        assert_eq!(dom.borrow().attribute(node, "value"), Some("Ada"));

        MemoryDom::dispatch(&dom, node, &mut Event::new("input").with_value("Grace"));
        assert_eq!(evaluate_in("form.name", &state), "Grace".into());
    }

    #[test]
    fn custom_directives_share_the_contract() {
        let state = ReactiveState::new(json!({ "n": 3 }));
        let mut registry = DirectiveRegistry::<MemoryDom>::new();
        registry.register("count", |dom: &mut MemoryDom, node: &NodeId, expr: &str, state: &ReactiveState| {
            let n = evaluate_in(expr, state).to_display_string();
            dom.set_attribute(node, "aria-valuenow", &n)
        });
        assert!(registry.contains("count"));

        let mut dom = MemoryDom::new();
        let node = element(&mut dom);
        registry.get("count").unwrap()(&mut dom, &node, "n", &state).unwrap();
        assert_eq!(dom.attribute(node, "aria-valuenow"), Some("3"));

        assert!(registry.unregister("count"));
        assert!(!registry.contains("count"));
    }
}
