use wasm_bindgen::JsValue;
use zeal_core::ZealError;

/// Error type produced by the web backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebError {
    /// The DOM APIs are not accessible (e.g., when executed outside of a browser).
    #[error("DOM is not available")]
    DomUnavailable,
    /// The requested mounting node cannot be located.
    #[error("failed to find DOM element with id `{0}`")]
    RootNotFound(String),
    /// A node had the wrong type for the requested operation.
    #[error("expected {expected}, found another node type")]
    WrongNode {
        /// What the operation needed.
        expected: &'static str,
    },
    /// Wrapper around JavaScript exceptions.
    #[error("JavaScript error: {0}")]
    Js(String),
    /// An error raised by the framework.
    #[error(transparent)]
    Zeal(#[from] ZealError),
}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        value
            .as_string()
            .map_or_else(|| Self::Js(format!("{value:?}")), Self::Js)
    }
}

impl From<WebError> for JsValue {
    fn from(value: WebError) -> Self {
        Self::from(value.to_string())
    }
}

impl From<WebError> for ZealError {
    fn from(value: WebError) -> Self {
        match value {
            WebError::Zeal(error) => error,
            other => Self::Render(other.to_string()),
        }
    }
}

/// Maps a JavaScript exception into the framework error type.
pub(crate) fn js(value: JsValue) -> ZealError {
    WebError::from(value).into()
}
