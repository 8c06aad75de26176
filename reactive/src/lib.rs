//! Deep-reactive state for Zeal components.
//!
//! A [`ReactiveState`] owns a graph of [`Value`](zeal_core::Value)s. Every object and
//! array reachable from the root is wrapped in a [`Reactive`] handle when the state is
//! created (or when a value is written into it later), and writes through those handles
//! notify the state's observers synchronously:
//!
//! - `on_change` listeners get every change made by one `set`/`merge` call at once;
//! - watchers get one call per written key, plus the [`WILDCARD`] watcher for every key.
//!
//! Wrapping is identity based: the same source object always maps to the same wrapper,
//! and cyclic graphs are wrapped in finite time. Objects marked raw, and frozen objects,
//! are left alone.

mod cache;
mod handle;
mod state;
mod watch;

pub use cache::WrapperCache;
pub use handle::{Reactive, Target};
pub use state::ReactiveState;
pub use watch::{Change, ChangeListener, Subscription, WILDCARD, WatchCallback};
