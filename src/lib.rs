#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

pub mod app;
pub mod component;
pub mod config;
pub mod debug;

#[doc(inline)]
pub use app::App;
#[doc(inline)]
pub use component::{Component, ComponentDefinition, ComponentRegistry, MountOptions};
#[doc(inline)]
pub use config::{AppConfig, UpdateMode};

pub use zeal_dom as dom;
pub use zeal_reactive as reactive;
pub use zeal_template as template;

pub mod prelude {
    //! Commonly used types, importable in one line.
    //!
    //! ```rust
    //! use zeal::prelude::*;
    //!
    //! let counter = ComponentDefinition::new("<p>{{ count }}</p>")
    //!     .state(serde_json::json!({ "count": 0 }));
    //! # let _ = counter;
    //! ```
    pub use crate::{App, AppConfig, Component, ComponentDefinition, MountOptions, UpdateMode};
    pub use zeal_core::{
        Event, Lifecycle, PatchFlags, Prop, VChild, VNode, Value, ZealError, set_error_handler,
    };
    pub use zeal_dom::{DirectiveRegistry, Dom, MemoryDom, Patcher, Renderer};
    pub use zeal_reactive::ReactiveState;
    pub use zeal_template::{EventContext, TemplateContext, compile_template};
}
