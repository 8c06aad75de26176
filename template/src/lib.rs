//! Template compilation for Zeal.
//!
//! [`compile_template`] parses template text once into an intermediate tree and hands
//! back a [`CompiledTemplate`]. Every [`CompiledTemplate::render`] walks that fixed
//! tree against the current state and produces a fresh virtual tree; the text is never
//! parsed again unless it changes ([`CompiledTemplate::recompile`]).
//!
//! ```
//! use zeal_reactive::ReactiveState;
//! use zeal_template::{TemplateContext, compile_template};
//!
//! let state = ReactiveState::new(serde_json::json!({ "name": "Ada" }));
//! let template = compile_template("<p>Hello {{ name }}</p>", TemplateContext::new(state.clone()));
//!
//! let first = template.render();
//! let p = first.as_element().expect("root element");
//! assert_eq!(p.children()[0].as_text(), Some("Hello Ada"));
//!
//! state.set("name", "Grace");
//! let second = template.render();
//! assert_eq!(second.as_element().unwrap().children()[0].as_text(), Some("Hello Grace"));
//! ```
//!
//! # Directives
//!
//! | Attribute | Effect |
//! |---|---|
//! | `:x`, `bind:x`, `z-bind:x` | bound attribute, evaluated per build |
//! | `@evt`, `z-on:evt` (`.prevent`, `.stop`) | listener calling a context method |
//! | `z-if`, `show-when` | build only while truthy |
//! | `z-for`, `repeat` | `item in list`, `(item, index) in list` |
//! | `z-once` | build once (per loop position), reuse forever |
//! | `z-pre` | copy the subtree literally |
//! | `z-model` | `value` prop plus an `input` listener writing back |
//! | `z-html`, `set-html` | raw markup instead of children |
//! | `set-text` | text from an expression instead of children |
//! | `key`, `:key` | reconciliation key |

use std::rc::Rc;

use zeal_core::{PatchFlags, Str, VChild, ZealError, report};

pub mod builder;
pub mod class;
pub mod compiler;
pub mod context;
pub mod interpolate;
pub mod node;
pub mod parser;

pub use builder::{Built, build, build_children, build_element};
pub use context::{
    Computed, EventContext, Method, Scope, SlotContent, TemplateContext, TemplateContextBuilder,
};
pub use node::{AttrNode, ElementNode, Node};

/// Class of the placeholder rendered by templates that failed to compile.
pub const ERROR_CLASS: &str = "z-error";

/// A compiled template, ready to render against its context.
#[derive(Debug)]
pub struct CompiledTemplate {
    source: String,
    context: Rc<TemplateContext>,
    root: ElementNode,
    scope_id: Str,
    error: Option<ZealError>,
}

/// Compiles `text` against `context`.
///
/// Never fails: a malformed template is reported on the error channel and the
/// returned template renders a `<div class="z-error">` placeholder carrying the
/// message.
#[must_use]
pub fn compile_template(text: &str, context: TemplateContext) -> CompiledTemplate {
    compile_shared(text, Rc::new(context))
}

/// Compiles `text` against `context`, handing errors back to the caller.
///
/// # Errors
///
/// Returns [`ZealError::Compile`] for malformed markup, unterminated `{{` and
/// malformed `z-for` expressions.
pub fn try_compile(text: &str, context: TemplateContext) -> Result<CompiledTemplate, ZealError> {
    let context = Rc::new(context);
    let scope_id = scope_id(text, context.scope_prefix());
    let root = compile_root(text, &context, &scope_id)?;
    Ok(CompiledTemplate::new(text, context, root, scope_id, None))
}

fn compile_shared(text: &str, context: Rc<TemplateContext>) -> CompiledTemplate {
    let scope_id = scope_id(text, context.scope_prefix());
    match compile_root(text, &context, &scope_id) {
        Ok(root) => CompiledTemplate::new(text, context, root, scope_id, None),
        Err(error) => {
            report(error.clone());
            let root = error_placeholder(&error, &scope_id);
            CompiledTemplate::new(text, context, root, scope_id, Some(error))
        }
    }
}

fn compile_root(
    text: &str,
    context: &TemplateContext,
    scope_id: &Str,
) -> Result<ElementNode, ZealError> {
    let markup = parser::parse(text)?;
    let root = compiler::Compiler::new(context, scope_id.clone()).compile_root(&markup)?;
    tracing::debug!(
        target: "zeal::template",
        scope_id = %scope_id,
        tag = %root.tag,
        is_static = root.is_static,
        "compiled template"
    );
    Ok(root)
}

fn error_placeholder(error: &ZealError, scope_id: &Str) -> ElementNode {
    ElementNode::new(
        "div",
        vec![
            AttrNode::Static {
                name: scope_id.clone(),
                value: Str::from(""),
            },
            AttrNode::Static {
                name: Str::from("class"),
                value: Str::from(ERROR_CLASS),
            },
        ],
        None,
        vec![Node::StaticText(Str::from(error.to_string()))],
        PatchFlags::empty(),
    )
}

/// The scope-id attribute name for `text`: `prefix` followed by a 32-bit FNV-1a hash
/// of the text in hex.
#[must_use]
pub fn scope_id(text: &str, prefix: &str) -> Str {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let hash = text
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(PRIME));
    Str::from(format!("{prefix}{hash:08x}"))
}

impl CompiledTemplate {
    fn new(
        text: &str,
        context: Rc<TemplateContext>,
        root: ElementNode,
        scope_id: Str,
        error: Option<ZealError>,
    ) -> Self {
        Self {
            source: text.to_owned(),
            context,
            root,
            scope_id,
            error,
        }
    }

    /// Builds a fresh virtual tree from the current state.
    ///
    /// Binding-free templates return the same shared node on every call.
    #[must_use]
    pub fn render(&self) -> VChild {
        let scope = Scope::new(&self.context);
        VChild::Element(build_element(&self.root, &scope))
    }

    /// The scope-id attribute stamped on every element.
    #[must_use]
    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    /// The template text this was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The context the template renders against.
    #[must_use]
    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    /// The compiled root element.
    #[must_use]
    pub const fn root(&self) -> &ElementNode {
        &self.root
    }

    /// The compile error, for templates that render the placeholder.
    #[must_use]
    pub const fn error(&self) -> Option<&ZealError> {
        self.error.as_ref()
    }

    /// Recompiles against the same context if `text` differs from the current source.
    ///
    /// Returns whether anything was recompiled.
    pub fn recompile(&mut self, text: &str) -> bool {
        if text == self.source {
            return false;
        }
        *self = compile_shared(text, Rc::clone(&self.context));
        true
    }
}
