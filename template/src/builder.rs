//! Intermediate tree to VNodes.
//!
//! Runs on every render. Static elements come back as the same shared [`VNode`] on
//! every build, static text as the same shared string, `z-once` output as the same
//! children it produced the first time. Everything else is evaluated afresh.

use std::{rc::Rc, slice};

use zeal_core::{
    EventHandler, Prop, Str, VChild, VNode, Value, ZealError, evaluate_in,
    handler::{into_handler, with_modifiers},
    report,
};

use crate::{
    class::{merge, normalize_class, normalize_style},
    context::{EventContext, Method, Scope},
    interpolate,
    node::{AttrNode, ElementNode, ForNode, KeySource, Node, OnceNode},
};

/// The result of building one intermediate node.
#[derive(Debug, Clone)]
pub enum Built {
    /// Nothing (a false `z-if`, a loop over nothing).
    Empty,
    /// A single child.
    One(VChild),
    /// Several children, already flat.
    Many(Vec<VChild>),
}

impl Built {
    /// Appends the built children to `out`, flattening one level.
    pub fn append_to(self, out: &mut Vec<VChild>) {
        match self {
            Self::Empty => {}
            Self::One(child) => out.push(child),
            Self::Many(children) => out.extend(children),
        }
    }

    /// The built children as a flat list.
    #[must_use]
    pub fn into_vec(self) -> Vec<VChild> {
        let mut out = Vec::new();
        self.append_to(&mut out);
        out
    }
}

/// Builds one node in `scope`.
#[must_use]
pub fn build(node: &Node, scope: &Scope<'_>) -> Built {
    match node {
        Node::StaticText(text) => Built::One(VChild::Text(text.clone())),
        Node::DynamicText(segments) => Built::One(VChild::Text(interpolate::render(segments, scope))),
        Node::Html(expr) => Built::One(VChild::Html(evaluate_in(expr, scope).to_display_string())),
        Node::Element(element) => Built::One(VChild::Element(build_element(element, scope))),
        Node::If {
            condition,
            children,
        } => {
            if evaluate_in(condition, scope).is_truthy() {
                Built::Many(build_children(children, scope))
            } else {
                Built::Empty
            }
        }
        Node::For(repeat) => build_for(repeat, scope),
        Node::Once(once) => Built::Many(build_once(once, scope)),
        Node::Slot { name, fallback } => match scope.context().slot(name) {
            Some(content) => Built::Many(content()),
            None => Built::Many(build_children(fallback, scope)),
        },
    }
}

/// Builds a list of nodes into a flat child list.
#[must_use]
pub fn build_children(nodes: &[Node], scope: &Scope<'_>) -> Vec<VChild> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        build(node, scope).append_to(&mut out);
    }
    out
}

fn build_for(repeat: &ForNode, scope: &Scope<'_>) -> Built {
    let binding = &repeat.binding;
    let items: Vec<(Value, Value)> = match evaluate_in(&binding.source, scope).unwrap_ref() {
        Value::Array(array) => array
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(index, item)| (item, Value::from(index)))
            .collect(),
        Value::Object(object) => object
            .entries()
            .into_iter()
            .map(|(key, item)| (item, Value::String(key)))
            .collect(),
        other => {
            tracing::debug!(
                target: "zeal::template",
                source = %binding.source,
                kind = other.type_name(),
                "z-for source is not iterable, building nothing"
            );
            return Built::Empty;
        }
    };

    let mut out = Vec::new();
    for (item, index) in items {
        let mut locals = vec![(binding.item.clone(), item)];
        if let Some(name) = &binding.index {
            locals.push((name.clone(), index.clone()));
        }
        let derived = scope.iterate(locals, index.to_display_string());
        out.extend(build_children(&repeat.children, &derived));
    }
    Built::Many(out)
}

/// Output of a `z-once` node, built the first time its loop position is reached.
fn build_once(once: &OnceNode, scope: &Scope<'_>) -> Vec<VChild> {
    if let Some(children) = once.cache.borrow().get(scope.iteration()) {
        return children.clone();
    }
    let children = build_children(slice::from_ref(&*once.node), scope);
    once.cache
        .borrow_mut()
        .insert(scope.iteration().to_vec(), children.clone());
    children
}

/// Builds an element. Static elements are built once and shared afterwards.
#[must_use]
pub fn build_element(element: &ElementNode, scope: &Scope<'_>) -> Rc<VNode> {
    if element.is_static {
        return element
            .cache
            .get_or_init(|| Rc::new(make_element(element, scope)))
            .clone();
    }
    Rc::new(make_element(element, scope))
}

fn make_element(element: &ElementNode, scope: &Scope<'_>) -> VNode {
    let mut node = VNode::new(element.tag.clone()).with_flags(element.flags);

    for attr in &element.attrs {
        match attr {
            AttrNode::Static { name, value } | AttrNode::Directive { name, value } => {
                node.set_prop(name.clone(), Prop::Value(Value::String(value.clone())));
            }
            AttrNode::Bound { name, expr } => {
                node.set_prop(name.clone(), Prop::Value(evaluate_in(expr, scope)));
            }
            AttrNode::Class { fixed, expr } => {
                let dynamic = normalize_class(&evaluate_in(expr, scope));
                node.set_prop("class", merge(fixed.as_ref(), &dynamic, " "));
            }
            AttrNode::Style { fixed, expr } => {
                let dynamic = normalize_style(&evaluate_in(expr, scope));
                node.set_prop("style", merge(fixed.as_ref(), &dynamic, "; "));
            }
            AttrNode::Event {
                event,
                method,
                modifiers,
            } => {
                let handler = event_handler(method.as_ref(), scope);
                node = node.with_listener(event, with_modifiers(handler, *modifiers));
            }
            AttrNode::Model { path } => {
                node.set_prop("value", Prop::Value(evaluate_in(path, scope)));
                node = node.with_listener("input", model_handler(path, scope));
            }
        }
    }

    match &element.key {
        Some(KeySource::Static(key)) => node = node.with_key(key.clone()),
        Some(KeySource::Bound(expr)) => {
            let key = evaluate_in(expr, scope);
            if !key.is_nullish() {
                node = node.with_key(key.to_display_string());
            }
        }
        None => {}
    }

    node.with_children(build_children(&element.children, scope))
}

fn event_handler(method: Option<&Method>, scope: &Scope<'_>) -> EventHandler {
    let Some(method) = method.cloned() else {
        return into_handler(|_| {});
    };
    let state = scope.context().state().clone();
    let locals = scope.locals().to_vec();
    into_handler(move |event| method(&mut EventContext::new(event, &state, &locals)))
}

/// `z-model` writes the event value back to where the path points.
///
/// `name` writes a state field; `a.b.name` writes field `name` of the object `a.b`
/// evaluates to, which must be reactive.
fn model_handler(path: &Str, scope: &Scope<'_>) -> EventHandler {
    let state = scope.context().state();
    let (target, field) = match path.rsplit_once('.') {
        Some((parent, field)) => (state.wrapper(&evaluate_in(parent, scope)), field),
        None if scope.is_local(path) => (None, &**path),
        None => (Some(state.get()), &**path),
    };
    let Some(target) = target else {
        report(ZealError::directive(
            "model",
            format!("`{path}` does not point into reactive state"),
        ));
        return into_handler(|_| {});
    };
    let field = Str::from(field);
    into_handler(move |event| {
        target.set(&field, Value::from(event.value().unwrap_or_default()));
    })
}
