//! What a template is compiled against, and the scopes it is built in.
//!
//! A [`TemplateContext`] bundles a component's state, props, methods, computed values
//! and slot content. Templates are built in a [`Scope`]: the root scope resolves names
//! against the context; every `z-for` iteration derives a child scope that adds the
//! loop variables on top.
//!
//! Name lookup order is: loop variables (innermost first), the `props` keyword,
//! computed values, state fields, then individual props.

use std::{collections::HashMap, rc::Rc};

use zeal_core::{
    Event, Resolve, Str, VChild, Value, ZealError, error::report, impl_debug,
};
use zeal_reactive::ReactiveState;

/// Attribute name prefix for the per-template scope id.
pub const DEFAULT_SCOPE_PREFIX: &str = "data-z-";

/// What a method sees when an event fires.
pub struct EventContext<'a> {
    /// The event being dispatched.
    pub event: &'a mut Event,
    /// The component state.
    pub state: &'a ReactiveState,
    locals: &'a [(Str, Value)],
}

impl<'a> EventContext<'a> {
    pub(crate) const fn new(
        event: &'a mut Event,
        state: &'a ReactiveState,
        locals: &'a [(Str, Value)],
    ) -> Self {
        Self {
            event,
            state,
            locals,
        }
    }

    /// Reads a loop variable that was in scope where the listener was bound.
    #[must_use]
    pub fn local(&self, name: &str) -> Value {
        lookup(self.locals, name).unwrap_or_default()
    }
}

impl_debug!(EventContext<'_>);

/// A component method, bound to events by name.
pub type Method = Rc<dyn Fn(&mut EventContext<'_>)>;

/// A computed value, derived from state on every read.
pub type Computed = Rc<dyn Fn(&ReactiveState) -> Result<Value, ZealError>>;

/// Content for a `<slot>`.
pub type SlotContent = Rc<dyn Fn() -> Vec<VChild>>;

/// Everything a template can refer to.
pub struct TemplateContext {
    state: ReactiveState,
    props: Value,
    methods: HashMap<Str, Method>,
    computed: HashMap<Str, Computed>,
    slots: HashMap<Str, SlotContent>,
    scope_prefix: Str,
}

impl_debug!(TemplateContext);

impl TemplateContext {
    /// A context with only state.
    #[must_use]
    pub fn new(state: ReactiveState) -> Self {
        Self::builder(state).build()
    }

    /// Starts building a context around `state`.
    #[must_use]
    pub fn builder(state: ReactiveState) -> TemplateContextBuilder {
        TemplateContextBuilder {
            context: Self {
                state,
                props: Value::object::<&str, Value>([]),
                methods: HashMap::new(),
                computed: HashMap::new(),
                slots: HashMap::new(),
                scope_prefix: Str::from(DEFAULT_SCOPE_PREFIX),
            },
        }
    }

    /// The component state.
    #[must_use]
    pub const fn state(&self) -> &ReactiveState {
        &self.state
    }

    /// The props object.
    #[must_use]
    pub const fn props(&self) -> &Value {
        &self.props
    }

    /// Looks up a method.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Evaluates a computed value. Failures are reported and read as `undefined`.
    #[must_use]
    pub fn computed(&self, name: &str) -> Option<Value> {
        let computed = self.computed.get(name)?;
        Some(match computed(&self.state) {
            Ok(value) => value,
            Err(error) => {
                report(error);
                Value::Undefined
            }
        })
    }

    /// Looks up slot content.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&SlotContent> {
        self.slots.get(name)
    }

    /// Prefix of the scope-id attribute.
    #[must_use]
    pub fn scope_prefix(&self) -> &str {
        &self.scope_prefix
    }
}

impl Resolve for TemplateContext {
    fn resolve(&self, name: &str) -> Value {
        if name == "props" {
            return self.props.clone();
        }
        if let Some(value) = self.computed(name) {
            return value;
        }
        let value = self.state.resolve(name);
        if value.is_undefined() {
            self.props.resolve(name)
        } else {
            value
        }
    }
}

/// Builder for [`TemplateContext`].
pub struct TemplateContextBuilder {
    context: TemplateContext,
}

impl_debug!(TemplateContextBuilder);

impl TemplateContextBuilder {
    /// Sets the props object.
    #[must_use]
    pub fn props(mut self, props: impl Into<Value>) -> Self {
        self.context.props = props.into();
        self
    }

    /// Registers a method.
    #[must_use]
    pub fn method(
        mut self,
        name: impl Into<Str>,
        method: impl Fn(&mut EventContext<'_>) + 'static,
    ) -> Self {
        self.context.methods.insert(name.into(), Rc::new(method));
        self
    }

    /// Registers a computed value.
    #[must_use]
    pub fn computed(
        mut self,
        name: impl Into<Str>,
        computed: impl Fn(&ReactiveState) -> Result<Value, ZealError> + 'static,
    ) -> Self {
        self.context.computed.insert(name.into(), Rc::new(computed));
        self
    }

    /// Registers content for a named slot (`default` for the unnamed one).
    #[must_use]
    pub fn slot(mut self, name: impl Into<Str>, content: impl Fn() -> Vec<VChild> + 'static) -> Self {
        self.context.slots.insert(name.into(), Rc::new(content));
        self
    }

    /// Overrides the scope-id attribute prefix.
    #[must_use]
    pub fn scope_prefix(mut self, prefix: impl Into<Str>) -> Self {
        self.context.scope_prefix = prefix.into();
        self
    }

    /// Finishes the context.
    #[must_use]
    pub fn build(self) -> TemplateContext {
        self.context
    }
}

/// Where an expression is evaluated during a build.
#[derive(Clone)]
pub struct Scope<'a> {
    context: &'a TemplateContext,
    locals: Vec<(Str, Value)>,
    iteration: Vec<Str>,
}

impl<'a> Scope<'a> {
    /// The root scope of a context.
    #[must_use]
    pub const fn new(context: &'a TemplateContext) -> Self {
        Self {
            context,
            locals: Vec::new(),
            iteration: Vec::new(),
        }
    }

    /// A child scope with extra variables; later bindings shadow earlier ones.
    #[must_use]
    pub fn derive(&self, bindings: impl IntoIterator<Item = (Str, Value)>) -> Self {
        let mut locals = self.locals.clone();
        locals.extend(bindings);
        Self {
            context: self.context,
            locals,
            iteration: self.iteration.clone(),
        }
    }

    /// A child scope for one loop item at `position` (array index or object key).
    #[must_use]
    pub fn iterate(&self, bindings: impl IntoIterator<Item = (Str, Value)>, position: Str) -> Self {
        let mut scope = self.derive(bindings);
        scope.iteration.push(position);
        scope
    }

    /// Loop positions from the outermost `z-for` in, empty outside any loop.
    #[must_use]
    pub fn iteration(&self) -> &[Str] {
        &self.iteration
    }

    /// The context this scope belongs to.
    #[must_use]
    pub const fn context(&self) -> &'a TemplateContext {
        self.context
    }

    /// Whether `name` is a loop variable here.
    #[must_use]
    pub fn is_local(&self, name: &str) -> bool {
        lookup(&self.locals, name).is_some()
    }

    pub(crate) fn locals(&self) -> &[(Str, Value)] {
        &self.locals
    }
}

impl Resolve for Scope<'_> {
    fn resolve(&self, name: &str) -> Value {
        lookup(&self.locals, name).unwrap_or_else(|| self.context.resolve(name))
    }
}

impl_debug!(Scope<'_>);

fn lookup(locals: &[(Str, Value)], name: &str) -> Option<Value> {
    locals
        .iter()
        .rev()
        .find(|(local, _)| &**local == name)
        .map(|(_, value)| value.clone())
}
