//! A Zeal application: configuration, a document, and the components mounted into it.

use core::{cell::RefCell, fmt};
use std::rc::Rc;

use zeal_core::{Lifecycle, Str, Value, ZealError, report};
use zeal_dom::{DirectiveRegistry, Dom, FrameScheduler, Renderer};
use zeal_reactive::ReactiveState;

use crate::{
    component::{Component, ComponentDefinition, ComponentRegistry, MountOptions},
    config::{AppConfig, UpdateMode},
};

/// Represents a Zeal application.
pub struct App<D: Dom> {
    config: AppConfig,
    dom: Rc<RefCell<D>>,
    components: ComponentRegistry,
    directives: Rc<DirectiveRegistry<D>>,
    renderer: Renderer<D>,
    scheduler: Option<Rc<dyn FrameScheduler>>,
    mounted: Vec<Component<D>>,
}

impl<D: Dom> fmt::Debug for App<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("components", &self.components)
            .field("directives", &self.directives)
            .field("mounted", &self.mounted.len())
            .finish_non_exhaustive()
    }
}

impl<D> App<D>
where
    D: Dom + 'static,
    D::Node: 'static,
{
    /// An application over `dom` with the built-in directives registered.
    #[must_use]
    pub fn new(config: AppConfig, dom: Rc<RefCell<D>>) -> Self {
        Self {
            config,
            dom,
            components: ComponentRegistry::new(),
            directives: Rc::new(DirectiveRegistry::with_builtins()),
            renderer: Renderer::new(),
            scheduler: None,
            mounted: Vec::new(),
        }
    }

    /// Sets the frame source used in [`UpdateMode::Batched`].
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Rc<dyn FrameScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Adds a hook fired for every element mounted or torn down by any component.
    #[must_use]
    pub fn on_element(mut self, hook: impl Fn(Lifecycle, &D::Node) + 'static) -> Self {
        self.renderer = self.renderer.with_hook(hook);
        self
    }

    /// Registers a component definition under `name`.
    pub fn component(&mut self, name: impl Into<Str>, definition: ComponentDefinition) -> &mut Self {
        self.components.register(name, definition);
        self
    }

    /// Registers a `data-<name>` directive for components mounted from now on.
    pub fn directive(
        &mut self,
        name: impl Into<Str>,
        handler: impl Fn(&mut D, &D::Node, &str, &ReactiveState) -> Result<(), ZealError> + 'static,
    ) -> &mut Self {
        Rc::make_mut(&mut self.directives).register(name, handler);
        self
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The document.
    #[must_use]
    pub const fn dom(&self) -> &Rc<RefCell<D>> {
        &self.dom
    }

    /// Registered component definitions.
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Registered directives.
    #[must_use]
    pub fn directives(&self) -> &DirectiveRegistry<D> {
        &self.directives
    }

    /// Components mounted and not yet unmounted, in mount order.
    #[must_use]
    pub fn mounted(&self) -> &[Component<D>] {
        &self.mounted
    }

    /// Mounts the component registered as `name` into `container`.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Render`] for an unknown component name and whatever
    /// [`Component::mount`] returns.
    pub fn mount(
        &mut self,
        name: &str,
        container: &D::Node,
        props: impl Into<Value>,
    ) -> Result<Component<D>, ZealError> {
        let definition = self
            .components
            .get(name)
            .ok_or_else(|| ZealError::Render(format!("no component registered as `{name}`")))?;
        let component = Component::mount(
            definition,
            Rc::clone(&self.dom),
            container,
            props,
            &self.mount_options(),
        )?;
        tracing::info!(target: "zeal", component = name, "mounted");
        self.mounted.push(component.clone());
        Ok(component)
    }

    /// Unmounts every component, most recent first.
    pub fn unmount_all(&mut self) {
        while let Some(component) = self.mounted.pop() {
            component.unmount();
        }
    }

    fn mount_options(&self) -> MountOptions<D> {
        let options = MountOptions::new()
            .renderer(self.renderer.clone())
            .directives(Rc::clone(&self.directives))
            .scope_prefix(self.config.scope_prefix.as_str());
        match (self.config.update_mode, &self.scheduler) {
            (UpdateMode::Immediate, Some(scheduler)) => options.retry_on(Rc::clone(scheduler)),
            (UpdateMode::Immediate, None) => options,
            (UpdateMode::Batched, Some(scheduler)) => options.batched(Rc::clone(scheduler)),
            (UpdateMode::Batched, None) => {
                report(ZealError::Config(
                    "batched updates need a frame scheduler, falling back to immediate".to_owned(),
                ));
                options
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use zeal_dom::MemoryDom;

    use super::*;

    fn app() -> App<MemoryDom> {
        App::new(AppConfig::default(), Rc::new(RefCell::new(MemoryDom::new())))
    }

    #[test]
    fn starts_with_builtin_directives() {
        let app = app();
        assert!(app.directives().contains("model"));
        assert!(app.components().is_empty());
    }

    #[test]
    fn custom_directives_extend_the_builtins() {
        let mut app = app();
        app.directive("focus", |_, _, _, _| Ok(()));
        assert!(app.directives().contains("focus"));
        assert!(app.directives().contains("show"));
    }

    #[test]
    fn unknown_components_fail_to_mount() {
        let mut app = app();
        let container = app.dom().borrow_mut().container();
        let error = app.mount("missing", &container, Value::Null).unwrap_err();
        assert!(matches!(error, ZealError::Render(message) if message.contains("missing")));
    }
}
