//! Mounting and patching Zeal virtual trees into a document.
//!
//! The crate never talks to a browser directly. Everything goes through the [`Dom`]
//! trait, which a host implements over its own node handles: [`MemoryDom`] keeps an
//! in-memory tree with a mutation log, `zeal-web` implements it over `web-sys`.
//!
//! There are exactly two ways to mutate a document:
//!
//! - [`Renderer::render`] builds a virtual tree into fresh host nodes and appends them;
//! - [`Patcher::update`] reconciles a new tree against the previous one in place.
//!
//! [`UpdateQueue`] defers patches to a frame callback and collapses repeated requests
//! for the same position. [`DirectiveRegistry`] maps `data-<name>` attributes to
//! handlers that run whenever such an attribute is applied.

mod batch;
mod directive;
mod host;
mod memory;
mod patch;
mod render;

pub use batch::{FrameCallback, FrameScheduler, ManualScheduler, UpdateQueue};
pub use directive::{DirectiveHandler, DirectiveRegistry};
pub use host::{Dom, dataset_key};
pub use memory::{MemoryDom, Mutation, NodeId};
pub use patch::Patcher;
pub use render::{LifecycleHook, Renderer};
