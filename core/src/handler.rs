//! Event handler types and modifier wrapping.
//!
//! Handlers are shared closures over a mutable [`Event`]. Template event bindings may
//! carry dot-suffixed modifiers (`@submit.prevent`, `@click.stop`); [`with_modifiers`]
//! wraps a handler so the corresponding event method runs before the handler body.

extern crate alloc;

use alloc::rc::Rc;
use core::fmt;

use crate::event::Event;

/// A shared event listener.
pub type EventHandler = Rc<dyn Fn(&mut Event)>;

/// Converts a closure into an [`EventHandler`].
pub fn into_handler(handler: impl Fn(&mut Event) + 'static) -> EventHandler {
    Rc::new(handler)
}

/// Modifiers parsed from an event binding such as `@submit.prevent.stop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Call [`Event::prevent_default`] before the handler.
    pub prevent: bool,
    /// Call [`Event::stop_propagation`] before the handler.
    pub stop: bool,
}

impl Modifiers {
    /// Parses modifier names, ignoring unknown ones.
    pub fn parse<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut modifiers = Self::default();
        for name in names {
            match name {
                "prevent" => modifiers.prevent = true,
                "stop" => modifiers.stop = true,
                other => tracing::debug!(target: "zeal", modifier = other, "ignoring unknown event modifier"),
            }
        }
        modifiers
    }

    /// Returns `true` if no modifier is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.prevent && !self.stop
    }
}

/// Wraps `handler` so the modifiers are applied to the event first.
#[must_use]
pub fn with_modifiers(handler: EventHandler, modifiers: Modifiers) -> EventHandler {
    if modifiers.is_empty() {
        return handler;
    }
    Rc::new(move |event: &mut Event| {
        if modifiers.prevent {
            event.prevent_default();
        }
        if modifiers.stop {
            event.stop_propagation();
        }
        handler(event);
    })
}

/// Debug wrapper printing a handler as an opaque value.
pub struct DebugHandler<'a>(pub &'a EventHandler);

impl fmt::Debug for DebugHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn modifiers_run_before_the_handler() {
        let saw_prevented = Rc::new(Cell::new(false));
        let flag = saw_prevented.clone();
        let handler = into_handler(move |event| flag.set(event.is_default_prevented()));

        let wrapped = with_modifiers(handler, Modifiers::parse(["prevent", "stop", "once"]));
        let mut event = Event::new("submit");
        wrapped(&mut event);

        assert!(saw_prevented.get());
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn empty_modifiers_keep_the_handler() {
        let handler = into_handler(|_| {});
        let wrapped = with_modifiers(handler.clone(), Modifiers::default());
        assert!(Rc::ptr_eq(&handler, &wrapped));
    }
}
