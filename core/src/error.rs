//! Error taxonomy and the process-wide error channel.
//!
//! Nothing in the framework lets an internal failure escape to the host application.
//! Every layer recovers locally (an `undefined` value, a placeholder node, a skipped
//! subtree) and hands the error to [`report`]. If a handler was installed with
//! [`set_error_handler`] it receives the error; otherwise the error is logged with
//! [`tracing::warn!`] and dropped.
//!
//! The channel is thread-local: the framework is single-threaded and every
//! instance lives on the thread that drives the host event loop.

extern crate alloc;

use alloc::{rc::Rc, string::String};
use core::cell::RefCell;

/// Every failure the framework can recover from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ZealError {
    /// An expression could not be evaluated.
    #[error("failed to evaluate `{expr}`: {message}")]
    Expression {
        /// The expression text.
        expr: String,
        /// What went wrong.
        message: String,
    },
    /// The template text is malformed.
    #[error("template error at {line}:{column}: {message}")]
    Compile {
        /// Description of the problem.
        message: String,
        /// 1-based line of the offending input.
        line: usize,
        /// 1-based column of the offending input.
        column: usize,
    },
    /// A virtual node could not be materialized.
    #[error("render error: {0}")]
    Render(String),
    /// A patch could not be applied; the subtree keeps its previous state.
    #[error("reconcile error: {0}")]
    Reconcile(String),
    /// A registered directive handler failed.
    #[error("directive `{name}` failed: {message}")]
    Directive {
        /// Directive name without the `data-` prefix.
        name: String,
        /// What went wrong.
        message: String,
    },
    /// A write hit a frozen object or array.
    #[error("cannot write `{key}` on a frozen value")]
    Frozen {
        /// The key (or array operation) that was rejected.
        key: String,
    },
    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ZealError {
    /// Shorthand for an [`ZealError::Expression`] error.
    pub fn expression(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expression {
            expr: expr.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`ZealError::Directive`] error.
    pub fn directive(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Directive {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Handler installed on the error channel.
pub type ErrorHandler = Rc<dyn Fn(&ZealError)>;

thread_local! {
    static ERROR_HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
}

/// Installs the handler that intercepts every internally caught error.
///
/// Replaces any previously installed handler.
pub fn set_error_handler(handler: impl Fn(&ZealError) + 'static) {
    ERROR_HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Removes the installed handler, restoring log-and-degrade behaviour.
pub fn clear_error_handler() {
    ERROR_HANDLER.with(|slot| slot.borrow_mut().take());
}

/// Hands an error to the installed handler, or logs it.
pub fn report(error: ZealError) {
    // Clone out of the slot so the handler may itself report or reinstall.
    let handler = ERROR_HANDLER.with(|slot| slot.borrow().clone());
    match handler {
        Some(handler) => handler(&error),
        None => tracing::warn!(target: "zeal", "{error}"),
    }
}

/// Reports the error of a failed result and converts it into `None`.
pub fn recover<T>(result: Result<T, ZealError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            report(error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{string::ToString, vec::Vec};

    #[test]
    fn handler_receives_reported_errors() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        set_error_handler(move |error| sink.borrow_mut().push(error.to_string()));

        report(ZealError::Render("boom".into()));
        assert_eq!(recover::<()>(Err(ZealError::Config("bad".into()))), None);

        clear_error_handler();
        report(ZealError::Render("unseen".into()));

        assert_eq!(
            *seen.borrow(),
            ["render error: boom", "invalid configuration: bad"]
        );
    }

    #[test]
    fn compile_error_message_carries_position() {
        let error = ZealError::Compile {
            message: "unclosed <div>".into(),
            line: 3,
            column: 7,
        };
        assert_eq!(error.to_string(), "template error at 3:7: unclosed <div>");
    }
}
