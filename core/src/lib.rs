//! Core building blocks of the Zeal UI framework.
//!
//! This crate holds everything the other layers agree on:
//!
//! - [`value`]: the dynamic value graph component state is made of;
//! - [`evaluate`] and [`resolve`]: dotted-path expression evaluation;
//! - [`vnode`] and [`flags`]: virtual nodes and their patch flags;
//! - [`event`] and [`handler`]: events as seen by template listeners;
//! - [`error`]: the error taxonomy and the process-wide error channel.

extern crate alloc;

#[macro_use]
mod macros;

pub mod error;
pub mod evaluate;
pub mod event;
pub mod flags;
pub mod handler;
pub mod resolve;
pub mod value;
pub mod vnode;

#[doc(inline)]
pub use error::{ZealError, recover, report, set_error_handler};
#[doc(inline)]
pub use evaluate::{evaluate, evaluate_in};
pub use event::{Event, Lifecycle};
pub use flags::PatchFlags;
pub use handler::{EventHandler, Modifiers};
pub use resolve::Resolve;
pub use value::{Array, Object, ObjectId, Ref, Str, Value};
pub use vnode::{Prop, VChild, VNode};
