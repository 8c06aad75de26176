//! DOM events as seen by template handlers.

use crate::value::Str;

/// An event delivered to a listener registered from a template (`@click`, `z-on:input`).
///
/// Hosts translate their native event into this type before invoking the handler and
/// honour [`Event::prevent_default`] / [`Event::stop_propagation`] afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: Str,
    value: Option<Str>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    /// Creates an event with the given type name (`click`, `input`, ...).
    pub fn new(name: impl Into<Str>) -> Self {
        Self {
            name: name.into(),
            value: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Attaches the current value of the event target (form controls).
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Str>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// The event type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value of the event target, if the host provided one.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Requests that the host's default action is skipped.
    pub const fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Requests that the event does not bubble further.
    pub const fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether [`Event::prevent_default`] was called.
    #[must_use]
    pub const fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Whether [`Event::stop_propagation`] was called.
    #[must_use]
    pub const fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Lifecycle moments reported for mounted nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Lifecycle {
    /// A node was created and attached.
    Mount,
    /// A node is about to be detached and destroyed.
    Teardown,
}
