//! Web/WASM backend for the Zeal framework.
//!
//! [`WebDom`] implements the [`zeal_dom::Dom`] host trait over `web-sys`, so the
//! renderer and reconciler drive the real browser document. [`WebApp`] is the
//! `wasm-bindgen` entry point: it finds the root element, installs logging and wires
//! [`AnimationFrameScheduler`] in for batched updates.
//!
//! Everything here needs a browser; outside one, constructors return
//! [`WebError::DomUnavailable`].

mod app;
mod dom;
mod error;

pub use app::{WebApp, WebAppBuilder};
pub use dom::{AnimationFrameScheduler, WebDom};
pub use error::WebError;
