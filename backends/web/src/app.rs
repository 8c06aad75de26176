use core::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::Node;
use zeal::{App, AppConfig, Component, ComponentDefinition, debug};
use zeal_core::{Str, Value, ZealError};

use crate::{
    dom::{AnimationFrameScheduler, WebDom},
    error::WebError,
};

/// Builder for [`WebApp`].
#[derive(Debug, Clone)]
pub struct WebAppBuilder {
    config: AppConfig,
    install_logging: bool,
}

impl Default for WebAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebAppBuilder {
    /// Creates a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            install_logging: true,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the DOM element identifier that should host the application.
    #[must_use]
    pub fn with_root_id(mut self, id: impl Into<String>) -> Self {
        self.config.root_id = id.into();
        self
    }

    /// Controls whether the panic hook and the `tracing` subscriber are installed.
    #[must_use]
    pub const fn install_logging(mut self, install: bool) -> Self {
        self.install_logging = install;
        self
    }

    /// Finalises the builder and creates a [`WebApp`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the DOM root element cannot
    /// be found.
    pub fn build(self) -> Result<WebApp, WebError> {
        WebApp::new_with_options(self)
    }
}

/// Entry point for running Zeal inside the browser.
#[wasm_bindgen]
#[derive(Debug)]
pub struct WebApp {
    app: App<WebDom>,
    root: Node,
}

impl WebApp {
    fn new_with_options(builder: WebAppBuilder) -> Result<Self, WebError> {
        let WebAppBuilder {
            config,
            install_logging,
        } = builder;
        config.validate()?;
        if install_logging {
            console_error_panic_hook::set_once();
            debug::install_tracing_with(&config.log_filter);
        }

        let dom = WebDom::new()?;
        let root = dom.root(&config.root_id)?;
        let scheduler = AnimationFrameScheduler::new()?;
        tracing::info!(target: "zeal::web", root_id = %config.root_id, mode = ?config.update_mode, "starting");

        let app = App::new(config, Rc::new(RefCell::new(dom))).with_scheduler(Rc::new(scheduler));
        Ok(Self { app, root })
    }

    /// The application.
    #[must_use]
    pub const fn app(&self) -> &App<WebDom> {
        &self.app
    }

    /// Mutable access to the application, to register directives and components.
    #[must_use]
    pub const fn app_mut(&mut self) -> &mut App<WebDom> {
        &mut self.app
    }

    /// The element components are mounted into.
    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Registers a component definition.
    pub fn register(&mut self, name: impl Into<Str>, definition: ComponentDefinition) -> &mut Self {
        self.app.component(name, definition);
        self
    }

    /// Mounts the component registered as `name` into the root element.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown components and failed mounts.
    pub fn mount_component(&mut self, name: &str, props: impl Into<Value>) -> Result<Component<WebDom>, WebError> {
        let root = self.root.clone();
        Ok(self.app.mount(name, &root, props)?)
    }
}

#[wasm_bindgen]
impl WebApp {
    /// Creates a new [`WebApp`] using the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM root element cannot be found.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, WebError> {
        Self::new_with_options(WebAppBuilder::new())
    }

    /// Creates a [`WebApp`] from a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or a missing root element.
    #[wasm_bindgen(js_name = fromConfig)]
    pub fn from_config(config: &str) -> Result<Self, WebError> {
        WebAppBuilder::new().with_config(AppConfig::from_json(config)?).build()
    }

    /// Mounts the registered component `name`, with props given as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed props, unknown components and failed mounts.
    #[wasm_bindgen]
    pub fn mount(&mut self, name: &str, props: &str) -> Result<(), WebError> {
        let props: serde_json::Value = if props.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(props)
                .map_err(|error| ZealError::Config(format!("invalid props: {error}")))?
        };
        self.mount_component(name, props).map(drop)
    }

    /// Unmounts every mounted component.
    #[wasm_bindgen(js_name = unmountAll)]
    pub fn unmount_all(&mut self) {
        self.app.unmount_all();
    }
}
