//! `tracing` subscriber and panic logging.

use std::panic::{self, PanicHookInfo};
use std::sync::Once;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};
use zeal_core::ZealError;

/// Filter used when neither `RUST_LOG` nor the configuration provides one.
pub const DEFAULT_FILTER: &str = "info";

// ============================================================================
// Global State
// ============================================================================

static PANIC_HOOK_INSTALLED: Once = Once::new();
static TRACING_INSTALLED: Once = Once::new();

// ============================================================================
// Installation
// ============================================================================

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`]. Idempotent.
pub fn install_tracing() {
    install_tracing_with(DEFAULT_FILTER);
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to `directives`.
///
/// Only the first call in a process has any effect. If another subscriber is already
/// the global default this one is dropped.
pub fn install_tracing_with(directives: &str) {
    TRACING_INSTALLED.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| parse_filter(directives))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let result = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_filter(filter))
            .try_init();

        if result.is_err() {
            eprintln!("zeal: a global tracing subscriber is already installed");
        }
    });
}

/// Logs panics through `tracing` before running the previous hook. Idempotent.
pub fn install_panic_logger() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            previous(info);
        }));
    });
}

/// Parses `tracing` filter directives.
///
/// # Errors
///
/// Returns [`ZealError::Config`] when a directive does not parse.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, ZealError> {
    EnvFilter::try_new(directives)
        .map_err(|error| ZealError::Config(format!("invalid log filter `{directives}`: {error}")))
}

// ============================================================================
// Panic Logging
// ============================================================================

fn log_panic(info: &PanicHookInfo<'_>) {
    let message = panic_message(info);
    match info.location() {
        Some(location) => tracing::error!(
            target: "zeal::panic",
            file = location.file(),
            line = location.line(),
            "{message}"
        ),
        None => tracing::error!(target: "zeal::panic", "{message}"),
    }
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_parse() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("zeal::dom=trace,warn").is_ok());
        assert!(matches!(parse_filter("zeal=loud"), Err(ZealError::Config(_))));
    }

    #[test]
    fn installation_is_idempotent() {
        install_tracing_with("zeal=debug");
        install_tracing();
        install_panic_logger();
        install_panic_logger();
        tracing::debug!(target: "zeal", "still logging");
    }
}
