//! Components: a template plus the state, methods and hooks it renders against.
//!
//! A [`ComponentDefinition`] is the reusable description. Mounting one produces a
//! [`Component`], which owns a fresh [`ReactiveState`], compiles the template once,
//! mounts the first tree and re-renders on every state change.
//!
//! ```ignore
//! let counter = ComponentDefinition::new(r#"<button @click="inc">{{ count }}</button>"#)
//!     .state(json!({ "count": 0 }))
//!     .method("inc", |cx| {
//!         let next = cx.state.get().get("count").as_f64().unwrap_or(0.0) + 1.0;
//!         cx.state.set("count", next);
//!     });
//! ```

use core::{
    cell::{Cell, RefCell},
    fmt,
};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use zeal_core::{Str, VChild, Value, ZealError, report};
use zeal_dom::{DirectiveRegistry, Dom, FrameScheduler, Patcher, Renderer, UpdateQueue};
use zeal_reactive::{ReactiveState, Subscription};
use zeal_template::{
    CompiledTemplate, Computed, EventContext, Method, TemplateContext, compile_template,
    context::DEFAULT_SCOPE_PREFIX,
};

/// Runs with the component state when the instance is mounted or unmounted.
pub type ComponentHook = Rc<dyn Fn(&ReactiveState)>;

// ============================================================================
// Definition
// ============================================================================

/// Everything needed to create component instances.
#[derive(Clone)]
pub struct ComponentDefinition {
    template: Str,
    data: serde_json::Value,
    methods: Vec<(Str, Method)>,
    computed: Vec<(Str, Computed)>,
    mounted: Vec<ComponentHook>,
    unmounted: Vec<ComponentHook>,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("template", &self.template)
            .field("data", &self.data)
            .field("methods", &self.methods.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .field("computed", &self.computed.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ComponentDefinition {
    /// A definition rendering `template` over an empty state object.
    #[must_use]
    pub fn new(template: impl Into<Str>) -> Self {
        Self {
            template: template.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            methods: Vec::new(),
            computed: Vec::new(),
            mounted: Vec::new(),
            unmounted: Vec::new(),
        }
    }

    /// Initial state. Every instance starts from its own copy.
    #[must_use]
    pub fn state(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Registers a method callable from template listeners.
    #[must_use]
    pub fn method(
        mut self,
        name: impl Into<Str>,
        method: impl Fn(&mut EventContext<'_>) + 'static,
    ) -> Self {
        self.methods.push((name.into(), Rc::new(method)));
        self
    }

    /// Registers a computed value, re-evaluated on every read.
    #[must_use]
    pub fn computed(
        mut self,
        name: impl Into<Str>,
        computed: impl Fn(&ReactiveState) -> Result<Value, ZealError> + 'static,
    ) -> Self {
        self.computed.push((name.into(), Rc::new(computed)));
        self
    }

    /// Runs after the first tree is in the document.
    #[must_use]
    pub fn on_mounted(mut self, hook: impl Fn(&ReactiveState) + 'static) -> Self {
        self.mounted.push(Rc::new(hook));
        self
    }

    /// Runs after the instance has been removed from the document.
    #[must_use]
    pub fn on_unmounted(mut self, hook: impl Fn(&ReactiveState) + 'static) -> Self {
        self.unmounted.push(Rc::new(hook));
        self
    }

    /// The template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    fn context(&self, state: ReactiveState, props: Value, scope_prefix: &str) -> TemplateContext {
        let mut builder = TemplateContext::builder(state)
            .props(props)
            .scope_prefix(scope_prefix);
        for (name, method) in &self.methods {
            let method = Rc::clone(method);
            builder = builder.method(name.clone(), move |cx| method(cx));
        }
        for (name, computed) in &self.computed {
            let computed = Rc::clone(computed);
            builder = builder.computed(name.clone(), move |state| computed(state));
        }
        builder.build()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Named component definitions, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    definitions: IndexMap<Str, ComponentDefinition>,
}

impl ComponentRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition` under `name`, returning the definition it replaced.
    pub fn register(
        &mut self,
        name: impl Into<Str>,
        definition: ComponentDefinition,
    ) -> Option<ComponentDefinition> {
        let name = name.into();
        let previous = self.definitions.insert(name.clone(), definition);
        if previous.is_some() {
            tracing::debug!(target: "zeal", component = %name, "replaced component definition");
        }
        previous
    }

    /// The definition registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentDefinition> {
        self.definitions.get(name)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Removes `name`, returning its definition.
    pub fn remove(&mut self, name: &str) -> Option<ComponentDefinition> {
        self.definitions.shift_remove(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(|name| &**name)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// ============================================================================
// Mount options
// ============================================================================

/// How a [`Component`] is mounted and updated.
pub struct MountOptions<D: Dom> {
    renderer: Renderer<D>,
    directives: Option<Rc<DirectiveRegistry<D>>>,
    scheduler: Option<Rc<dyn FrameScheduler>>,
    retry: Option<Rc<dyn FrameScheduler>>,
    scope_prefix: Str,
}

impl<D: Dom> Clone for MountOptions<D> {
    fn clone(&self) -> Self {
        Self {
            renderer: self.renderer.clone(),
            directives: self.directives.clone(),
            scheduler: self.scheduler.clone(),
            retry: self.retry.clone(),
            scope_prefix: self.scope_prefix.clone(),
        }
    }
}

impl<D: Dom> fmt::Debug for MountOptions<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountOptions")
            .field("renderer", &self.renderer)
            .field("directives", &self.directives)
            .field("batched", &self.scheduler.is_some())
            .field("retries", &self.retry.is_some())
            .field("scope_prefix", &self.scope_prefix)
            .finish()
    }
}

impl<D: Dom> Default for MountOptions<D> {
    fn default() -> Self {
        Self {
            renderer: Renderer::new(),
            directives: None,
            scheduler: None,
            retry: None,
            scope_prefix: Str::from(DEFAULT_SCOPE_PREFIX),
        }
    }
}

impl<D: Dom> MountOptions<D> {
    /// Immediate updates, no directives, the default scope prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts through `renderer` (and its lifecycle hooks).
    #[must_use]
    pub fn renderer(mut self, renderer: Renderer<D>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Runs `data-*` directives from `registry` against the component state.
    #[must_use]
    pub fn directives(mut self, registry: Rc<DirectiveRegistry<D>>) -> Self {
        self.directives = Some(registry);
        self
    }

    /// Queues re-renders and applies them on frames delivered by `scheduler`.
    #[must_use]
    pub fn batched(mut self, scheduler: Rc<dyn FrameScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Retries an immediate re-render that found the document busy on the next
    /// frame from `scheduler`. Without one it waits for the next state change.
    #[must_use]
    pub fn retry_on(mut self, scheduler: Rc<dyn FrameScheduler>) -> Self {
        self.retry = Some(scheduler);
        self
    }

    /// Overrides the scope-id attribute prefix.
    #[must_use]
    pub fn scope_prefix(mut self, prefix: impl Into<Str>) -> Self {
        self.scope_prefix = prefix.into();
        self
    }
}

// ============================================================================
// Instance
// ============================================================================

struct Instance<D: Dom> {
    this: Weak<Self>,
    template: RefCell<CompiledTemplate>,
    state: ReactiveState,
    dom: Rc<RefCell<D>>,
    patcher: Patcher<D>,
    queue: Option<UpdateQueue<D>>,
    retry: Option<Rc<dyn FrameScheduler>>,
    container: D::Node,
    root: RefCell<Option<D::Node>>,
    index: Cell<usize>,
    tree: RefCell<Option<VChild>>,
    rendering: Cell<bool>,
    rerun: Cell<bool>,
    stale: Cell<bool>,
    renders: Cell<usize>,
    subscription: RefCell<Option<Subscription>>,
    unmounted: Vec<ComponentHook>,
}

/// A mounted component instance.
///
/// Cloning yields another handle to the same instance.
pub struct Component<D: Dom> {
    inner: Rc<Instance<D>>,
}

impl<D: Dom> Clone for Component<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: Dom> fmt::Debug for Component<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("scope_id", &self.inner.template.borrow().scope_id())
            .field("container", &self.inner.container)
            .field("index", &self.inner.index.get())
            .field("renders", &self.inner.renders.get())
            .field("mounted", &self.inner.subscription.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl<D> Component<D>
where
    D: Dom + 'static,
    D::Node: 'static,
{
    /// Creates an instance of `definition` and appends its tree to `container`.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Render`] when the document is borrowed elsewhere or the
    /// first tree cannot be mounted. Template compile errors do not fail the mount:
    /// the error placeholder is mounted instead.
    pub fn mount(
        definition: &ComponentDefinition,
        dom: Rc<RefCell<D>>,
        container: &D::Node,
        props: impl Into<Value>,
        options: &MountOptions<D>,
    ) -> Result<Self, ZealError> {
        let state = ReactiveState::new(Value::from(definition.data.clone()));
        let context = definition.context(state.clone(), props.into(), &options.scope_prefix);
        let template = compile_template(definition.template(), context);

        let renderer = match &options.directives {
            Some(registry) => options
                .renderer
                .clone()
                .with_directives(Rc::clone(registry), state.clone()),
            None => options.renderer.clone(),
        };
        let patcher = Patcher::new(renderer);
        let tree = template.render();

        let (root, index) = {
            let mut document = dom
                .try_borrow_mut()
                .map_err(|_| ZealError::Render("document is busy, cannot mount".to_owned()))?;
            let root = patcher
                .renderer()
                .render(&mut document, &tree, container)
                .ok_or_else(|| ZealError::Render("component failed to mount".to_owned()))?;
            let index = position_of(&*document, container, &root).unwrap_or_default();
            (root, index)
        };

        let queue = options
            .scheduler
            .as_ref()
            .map(|scheduler| UpdateQueue::new(Rc::clone(&dom), patcher.clone(), Rc::clone(scheduler)));

        tracing::debug!(
            target: "zeal",
            scope_id = template.scope_id(),
            index,
            batched = queue.is_some(),
            "mounted component"
        );

        let inner = Rc::new_cyclic(|this| Instance {
            this: this.clone(),
            template: RefCell::new(template),
            state: state.clone(),
            dom,
            patcher,
            queue,
            retry: options.retry.clone(),
            container: container.clone(),
            root: RefCell::new(Some(root)),
            index: Cell::new(index),
            tree: RefCell::new(Some(tree)),
            rendering: Cell::new(false),
            rerun: Cell::new(false),
            stale: Cell::new(false),
            renders: Cell::new(0),
            subscription: RefCell::new(None),
            unmounted: definition.unmounted.clone(),
        });

        let weak = inner.this.clone();
        let subscription = state.on_change(move |_| {
            if let Some(instance) = weak.upgrade() {
                instance.rerender();
            }
        });
        *inner.subscription.borrow_mut() = Some(subscription);

        for hook in &definition.mounted {
            hook(&state);
        }
        Ok(Self { inner })
    }

    /// The instance state. Writes re-render the component.
    #[must_use]
    pub fn state(&self) -> &ReactiveState {
        &self.inner.state
    }

    /// The tree currently in the document (or queued for it), if mounted.
    #[must_use]
    pub fn tree(&self) -> Option<VChild> {
        self.inner.tree.borrow().clone()
    }

    /// The scope-id attribute stamped on this component's elements.
    #[must_use]
    pub fn scope_id(&self) -> String {
        self.inner.template.borrow().scope_id().to_owned()
    }

    /// The node the component is mounted under.
    #[must_use]
    pub fn container(&self) -> &D::Node {
        &self.inner.container
    }

    /// Position of the component root among the container's children, as of the
    /// last render. Siblings unmounted since then are accounted for on the next one.
    #[must_use]
    pub fn index(&self) -> usize {
        self.inner.index.get()
    }

    /// Number of re-renders since mounting.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.inner.renders.get()
    }

    /// Whether the component is still mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.subscription.borrow().is_some()
    }

    /// Re-renders now, as a state change would.
    pub fn refresh(&self) {
        if self.is_mounted() {
            self.inner.rerender();
        }
    }

    /// Swaps in a new template and re-renders if the text changed.
    ///
    /// The state survives; methods and computed values are kept. Returns whether the
    /// template changed.
    pub fn reload_template(&self, text: &str) -> bool {
        let changed = self.inner.template.borrow_mut().recompile(text);
        if changed {
            tracing::info!(target: "zeal", scope_id = %self.scope_id(), "reloaded template");
            self.refresh();
        }
        changed
    }

    /// Stops reacting to state changes, tears the tree down and runs the unmount
    /// hooks. Does nothing if already unmounted.
    pub fn unmount(&self) {
        let Some(subscription) = self.inner.subscription.borrow_mut().take() else {
            return;
        };
        subscription.cancel();

        let old = self.inner.tree.borrow_mut().take();
        self.inner.stale.set(false);
        match &self.inner.queue {
            Some(queue) => {
                let index = self.inner.locate();
                queue.enqueue(&self.inner.container, None, old, index);
            }
            None => match self.inner.dom.try_borrow_mut() {
                Ok(mut dom) => {
                    let index = self.inner.locate_in(&dom);
                    self.inner
                        .patcher
                        .update(&mut dom, &self.inner.container, None, old.as_ref(), index);
                }
                Err(_) => report(ZealError::Render(
                    "document is busy, component left in place".to_owned(),
                )),
            },
        }
        self.inner.root.borrow_mut().take();

        for hook in &self.inner.unmounted {
            hook(&self.inner.state);
        }
        tracing::debug!(target: "zeal", scope_id = %self.scope_id(), "unmounted component");
    }
}

impl<D> Instance<D>
where
    D: Dom + 'static,
    D::Node: 'static,
{
    /// Renders until no further change was requested meanwhile.
    ///
    /// A change raised while a pass is running (a computed value writing state, a
    /// directive reacting to its own update) sets `rerun` and is picked up once the
    /// running pass returns.
    fn rerender(&self) {
        if self.rendering.replace(true) {
            self.rerun.set(true);
            return;
        }
        loop {
            self.rerun.set(false);
            self.render_pass();
            if !self.rerun.get() {
                break;
            }
            tracing::trace!(target: "zeal", "running deferred re-render");
        }
        self.rendering.set(false);
    }

    fn render_pass(&self) {
        let new = self.template.borrow().render();
        match &self.queue {
            Some(queue) => {
                let index = self.locate();
                let old = self.tree.replace(Some(new.clone()));
                queue.enqueue(&self.container, Some(new), old, index);
            }
            None => {
                let Ok(mut dom) = self.dom.try_borrow_mut() else {
                    self.defer();
                    return;
                };
                self.stale.set(false);
                let index = self.locate_in(&dom);
                let old = self.tree.borrow().clone();
                self.patcher
                    .update(&mut dom, &self.container, Some(&new), old.as_ref(), index);
                *self.root.borrow_mut() = dom.child_at(&self.container, index);
                *self.tree.borrow_mut() = Some(new);
            }
        }
        self.renders.set(self.renders.get() + 1);
    }

    /// Keeps the previous tree and retries once the document is free.
    fn defer(&self) {
        report(ZealError::Render(
            "document is busy, deferring re-render".to_owned(),
        ));
        if self.stale.replace(true) {
            return;
        }
        let Some(scheduler) = &self.retry else {
            return;
        };
        let this = self.this.clone();
        scheduler.request_frame(Box::new(move || {
            if let Some(instance) = this.upgrade() {
                if instance.stale.get() && instance.subscription.borrow().is_some() {
                    instance.rerender();
                }
            }
        }));
    }

    /// Where the root sits now. Falls back to the last known position, and picks up
    /// the node found there, when the root was replaced by a queued patch.
    fn locate_in(&self, dom: &D) -> usize {
        let found = self
            .root
            .borrow()
            .as_ref()
            .and_then(|root| position_of(dom, &self.container, root));
        let index = found.unwrap_or_else(|| self.index.get());
        if found.is_none() {
            *self.root.borrow_mut() = dom.child_at(&self.container, index);
        }
        self.index.set(index);
        index
    }

    fn locate(&self) -> usize {
        match self.dom.try_borrow() {
            Ok(dom) => self.locate_in(&dom),
            Err(_) => self.index.get(),
        }
    }
}

fn position_of<D: Dom>(dom: &D, container: &D::Node, node: &D::Node) -> Option<usize> {
    (0..)
        .map_while(|index| dom.child_at(container, index).map(|child| (index, child)))
        .find_map(|(index, child)| (child == *node).then_some(index))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registry_keeps_registration_order() {
        let mut registry = ComponentRegistry::new();
        registry.register("b", ComponentDefinition::new("<p></p>"));
        registry.register("a", ComponentDefinition::new("<p></p>"));
        assert!(registry.register("b", ComponentDefinition::new("<i></i>")).is_some());

        assert_eq!(registry.names().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(registry.get("b").unwrap().template(), "<i></i>");
        assert!(registry.remove("b").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn context_carries_methods_and_computed() {
        let definition = ComponentDefinition::new("<p>{{ double }}</p>")
            .state(json!({ "n": 2 }))
            .method("noop", |_| {})
            .computed("double", |state| {
                let n = state.get().get("n").as_f64().unwrap_or_default();
                Ok(Value::from(n * 2.0))
            });
        let state = ReactiveState::new(Value::from(json!({ "n": 2 })));

        let context = definition.context(state, Value::Null, "data-x-");

        assert!(context.method("noop").is_some());
        assert_eq!(context.computed("double"), Some(Value::from(4)));
        assert_eq!(context.scope_prefix(), "data-x-");
    }
}
