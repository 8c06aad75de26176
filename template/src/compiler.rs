//! Markup to intermediate tree.
//!
//! Each attribute is classified once ([`classify`]) and turned into an [`AttrNode`] or a
//! structural wrapper. Structural directives nest in a fixed order, outermost first:
//! `z-once`, `z-for`, `z-if`. So `<li z-for="x in xs" z-if="x.done">` filters per
//! item, and `z-once` on a loop freezes the whole list.

use zeal_core::{Modifiers, PatchFlags, Str, ZealError, report};

use crate::{
    context::TemplateContext,
    interpolate::{self, Segment},
    node::{AttrNode, ElementNode, ForBinding, ForNode, KeySource, Node, OnceNode},
    parser::{Attribute, Element, Markup, Position},
};

/// What an attribute name means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKind {
    /// Anything without special meaning.
    Plain,
    /// `key`.
    Key,
    /// `:x`, `bind:x`, `z-bind:x`.
    Bound(String),
    /// `@evt`, `z-on:evt`, with modifiers.
    Event(String, Modifiers),
    /// `z-if`, `show-when`.
    If,
    /// `z-for`, `repeat`.
    For,
    /// `z-once`.
    Once,
    /// `z-pre`.
    Pre,
    /// `z-model`.
    Model,
    /// `z-html`, `set-html`.
    Html,
    /// `set-text`.
    Text,
}

/// Classifies an attribute by name.
#[must_use]
pub fn classify(name: &str) -> AttrKind {
    match name {
        "z-if" | "show-when" => return AttrKind::If,
        "z-for" | "repeat" => return AttrKind::For,
        "z-once" => return AttrKind::Once,
        "z-pre" => return AttrKind::Pre,
        "z-model" => return AttrKind::Model,
        "z-html" | "set-html" => return AttrKind::Html,
        "set-text" => return AttrKind::Text,
        "key" => return AttrKind::Key,
        _ => {}
    }

    if let Some(event) = name.strip_prefix('@').or_else(|| name.strip_prefix("z-on:")) {
        let mut parts = event.split('.');
        let event = parts.next().unwrap_or_default().to_owned();
        return AttrKind::Event(event, Modifiers::parse(parts));
    }

    if let Some(bound) = name
        .strip_prefix(':')
        .or_else(|| name.strip_prefix("bind:"))
        .or_else(|| name.strip_prefix("z-bind:"))
    {
        return AttrKind::Bound(bound.to_owned());
    }

    AttrKind::Plain
}

/// Parses the value of a `z-for` attribute: `item in list`, `item from list` or
/// `(item, index) in list`.
///
/// # Errors
///
/// Returns [`ZealError::Compile`] located at `position` when the value does not have
/// that shape.
pub fn parse_for(value: &str, position: Position) -> Result<ForBinding, ZealError> {
    let malformed = || position.error(format!("malformed z-for expression `{value}`"));

    let (lhs, source) = [" in ", " from "]
        .into_iter()
        .find_map(|separator| value.split_once(separator))
        .ok_or_else(malformed)?;
    let source = source.trim();
    if source.is_empty() {
        return Err(malformed());
    }

    let lhs = lhs.trim();
    let (item, index) = match lhs.strip_prefix('(').and_then(|l| l.strip_suffix(')')) {
        Some(inner) => match inner.split_once(',') {
            Some((item, index)) => (item.trim(), Some(index.trim())),
            None => (inner.trim(), None),
        },
        None => (lhs, None),
    };
    if !is_identifier(item) || index.is_some_and(|index| !is_identifier(index)) {
        return Err(malformed());
    }

    Ok(ForBinding {
        item: Str::from(item),
        index: index.map(Str::from),
        source: Str::from(source),
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Compiles parsed markup against a context.
pub(crate) struct Compiler<'a> {
    context: &'a TemplateContext,
    scope_attr: Str,
}

impl<'a> Compiler<'a> {
    pub(crate) const fn new(context: &'a TemplateContext, scope_attr: Str) -> Self {
        Self {
            context,
            scope_attr,
        }
    }

    /// Compiles the top-level nodes into a single root element.
    ///
    /// A lone element is the root; anything else is wrapped in a `div`.
    pub(crate) fn compile_root(&self, markup: &[Markup]) -> Result<ElementNode, ZealError> {
        let nodes = self.compile_children(markup)?;
        Ok(match <[Node; 1]>::try_from(nodes) {
            Ok([Node::Element(root)]) => root,
            Ok([node]) => self.wrapper(vec![node]),
            Err(nodes) => self.wrapper(nodes),
        })
    }

    fn wrapper(&self, children: Vec<Node>) -> ElementNode {
        let flags = text_flag(&children);
        ElementNode::new("div", vec![self.scope_attribute()], None, children, flags)
    }

    fn scope_attribute(&self) -> AttrNode {
        AttrNode::Static {
            name: self.scope_attr.clone(),
            value: Str::from(""),
        }
    }

    fn compile_children(&self, markup: &[Markup]) -> Result<Vec<Node>, ZealError> {
        markup.iter().map(|node| self.compile_node(node)).collect()
    }

    fn compile_node(&self, markup: &Markup) -> Result<Node, ZealError> {
        match markup {
            Markup::Text { text, position } => compile_text(text, *position),
            Markup::Element(element) if element.tag == "slot" => self.compile_slot(element),
            Markup::Element(element) => self.compile_element(element),
        }
    }

    fn compile_slot(&self, element: &Element) -> Result<Node, ZealError> {
        let name = element
            .attribute("name")
            .map_or("default", Attribute::value);
        Ok(Node::Slot {
            name: Str::from(name),
            fallback: self.compile_children(&element.children)?,
        })
    }

    fn compile_element(&self, element: &Element) -> Result<Node, ZealError> {
        if element.attribute("z-pre").is_some() {
            return Ok(Node::Element(self.compile_pre(element)));
        }

        let mut attrs = vec![self.scope_attribute()];
        let mut flags = PatchFlags::empty();
        let mut key = None;
        let mut condition = None;
        let mut repeat = None;
        let mut once = false;
        let mut html = None;
        let mut text = None;
        let mut class = (None, None);
        let mut style = (None, None);

        for attribute in &element.attributes {
            let value = attribute.value();
            match classify(&attribute.name) {
                AttrKind::If => condition = Some(Str::from(value)),
                AttrKind::For => repeat = Some(parse_for(value, attribute.position)?),
                AttrKind::Once => once = true,
                AttrKind::Pre => {}
                AttrKind::Html => html = Some(Str::from(value)),
                AttrKind::Text => text = Some(Str::from(value)),
                AttrKind::Key => key = Some(KeySource::Static(Str::from(value))),
                AttrKind::Model => {
                    attrs.push(AttrNode::Model {
                        path: Str::from(value.trim()),
                    });
                    flags |= PatchFlags::FULL_PROPS | PatchFlags::HYDRATE;
                }
                AttrKind::Event(event, modifiers) => {
                    attrs.push(AttrNode::Event {
                        event: Str::from(event),
                        method: self.resolve_method(value, attribute.position),
                        modifiers,
                    });
                    flags |= PatchFlags::HYDRATE;
                }
                AttrKind::Bound(name) => match name.as_str() {
                    "key" => key = Some(KeySource::Bound(Str::from(value))),
                    "class" => {
                        class.1 = Some(Str::from(value));
                        flags |= PatchFlags::CLASS;
                    }
                    "style" => {
                        style.1 = Some(Str::from(value));
                        flags |= PatchFlags::STYLE;
                    }
                    _ => {
                        attrs.push(AttrNode::Bound {
                            name: Str::from(name),
                            expr: Str::from(value),
                        });
                        flags |= PatchFlags::PROPS;
                    }
                },
                AttrKind::Plain => match attribute.name.as_str() {
                    "class" => class.0 = Some(Str::from(value)),
                    "style" => style.0 = Some(Str::from(value)),
                    name if name.starts_with("data-") => attrs.push(AttrNode::Directive {
                        name: Str::from(name),
                        value: Str::from(value),
                    }),
                    name => attrs.push(AttrNode::Static {
                        name: Str::from(name),
                        value: Str::from(value),
                    }),
                },
            }
        }

        attrs.extend(combine(class, |fixed, expr| AttrNode::Class { fixed, expr }, "class"));
        attrs.extend(combine(style, |fixed, expr| AttrNode::Style { fixed, expr }, "style"));

        let children = if let Some(expr) = html {
            vec![Node::Html(expr)]
        } else if let Some(expr) = text {
            vec![Node::DynamicText(vec![Segment::Expr(expr)])]
        } else {
            self.compile_children(&element.children)?
        };
        flags |= text_flag(&children);

        let mut node = Node::Element(ElementNode::new(
            element.tag.as_str(),
            attrs,
            key,
            children,
            flags,
        ));
        if let Some(condition) = condition {
            node = Node::If {
                condition,
                children: vec![node],
            };
        }
        if let Some(binding) = repeat {
            node = Node::For(ForNode {
                binding,
                children: vec![node],
            });
        }
        if once {
            node = Node::Once(OnceNode::new(node));
        }
        Ok(node)
    }

    /// `z-pre`: attributes and text are copied verbatim, directives are ignored.
    fn compile_pre(&self, element: &Element) -> ElementNode {
        let mut attrs = vec![self.scope_attribute()];
        attrs.extend(
            element
                .attributes
                .iter()
                .filter(|attribute| attribute.name != "z-pre")
                .map(|attribute| AttrNode::Static {
                    name: Str::from(attribute.name.as_str()),
                    value: Str::from(attribute.value()),
                }),
        );
        let children = element
            .children
            .iter()
            .map(|child| match child {
                Markup::Text { text, .. } => Node::StaticText(Str::from(text.as_str())),
                Markup::Element(child) => Node::Element(self.compile_pre(child)),
            })
            .collect();
        ElementNode::new(
            element.tag.as_str(),
            attrs,
            None,
            children,
            PatchFlags::empty(),
        )
    }

    fn resolve_method(&self, value: &str, position: Position) -> Option<crate::context::Method> {
        let name = value.trim();
        let name = name.strip_suffix("()").unwrap_or(name);
        let method = self.context.method(name).cloned();
        if method.is_none() {
            report(position.error(format!("unknown method `{name}`")));
        }
        method
    }
}

fn compile_text(text: &str, position: Position) -> Result<Node, ZealError> {
    let segments = interpolate::parse(text, position)?;
    if interpolate::is_static(&segments) {
        Ok(Node::StaticText(Str::from(text)))
    } else {
        Ok(Node::DynamicText(segments))
    }
}

fn text_flag(children: &[Node]) -> PatchFlags {
    if children
        .iter()
        .any(|child| matches!(child, Node::DynamicText(_)))
    {
        PatchFlags::TEXT
    } else {
        PatchFlags::empty()
    }
}

/// Folds a static value and a bound expression of `class`/`style` into one attribute.
fn combine(
    (fixed, expr): (Option<Str>, Option<Str>),
    bound: impl FnOnce(Option<Str>, Str) -> AttrNode,
    name: &str,
) -> Option<AttrNode> {
    match (fixed, expr) {
        (fixed, Some(expr)) => Some(bound(fixed, expr)),
        (Some(value), None) => Some(AttrNode::Static {
            name: Str::from(name),
            value,
        }),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_expressions() {
        let binding = parse_for("item in items", Position::START).expect("valid");
        assert_eq!(&*binding.item, "item");
        assert_eq!(binding.index, None);
        assert_eq!(&*binding.source, "items");

        let binding = parse_for("(todo, i) from state.todos", Position::START).expect("valid");
        assert_eq!(&*binding.item, "todo");
        assert_eq!(binding.index.as_deref(), Some("i"));
        assert_eq!(&*binding.source, "state.todos");
    }

    #[test]
    fn malformed_for_expressions_are_located() {
        let position = Position { line: 3, column: 9 };
        for value in ["items", "in items", "item in ", "(a, ) in xs", "a b in xs"] {
            let error = parse_for(value, position).expect_err(value);
            assert!(
                matches!(error, ZealError::Compile { line: 3, column: 9, .. }),
                "{value}: {error:?}"
            );
        }
    }
}
