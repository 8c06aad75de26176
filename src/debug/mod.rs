//! Development helpers: logging setup.

pub mod logging;

pub use logging::{install_panic_logger, install_tracing, install_tracing_with};
