//! Dotted-path expression evaluation.
//!
//! The expression language is deliberately tiny: a path such as `user.address.city`,
//! optionally negated with a leading `!`, or a string/number/keyword literal. Paths are
//! split on `.` and walked one segment at a time; any step that lands on something that
//! is not an object (or array) ends the walk with [`Value::Undefined`]. A [`Ref`] at
//! the end of the path is unwrapped to its content.
//!
//! Evaluation never fails outward. Malformed paths are reported on the error channel
//! ([`crate::error::report`]) and evaluate to `undefined`.
//!
//! [`Ref`]: crate::value::Ref

use crate::{
    error::{ZealError, report},
    resolve::{Resolve, member},
    value::Value,
};

/// Evaluates `expr` against a state snapshot.
///
/// ```
/// use zeal_core::{evaluate::evaluate, value::Value};
///
/// let state = Value::from(serde_json::json!({ "user": { "name": "Ada" } }));
/// assert_eq!(evaluate("user.name", &state), Value::from("Ada"));
/// assert_eq!(evaluate("user.name.first", &state), Value::Undefined);
/// assert_eq!(evaluate("missing.name", &state), Value::Undefined);
/// ```
#[must_use]
pub fn evaluate(expr: &str, snapshot: &Value) -> Value {
    evaluate_in(expr, snapshot)
}

/// Evaluates `expr`, resolving its first segment through `scope`.
#[must_use]
pub fn evaluate_in<R: Resolve + ?Sized>(expr: &str, scope: &R) -> Value {
    match try_evaluate_in(expr, scope) {
        Ok(value) => value,
        Err(error) => {
            report(error);
            Value::Undefined
        }
    }
}

/// Like [`evaluate_in`] but hands malformed expressions back to the caller.
///
/// # Errors
///
/// Returns [`ZealError::Expression`] when the path contains an empty segment.
pub fn try_evaluate_in<R: Resolve + ?Sized>(expr: &str, scope: &R) -> Result<Value, ZealError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(Value::Undefined);
    }

    if let Some(rest) = expr.strip_prefix('!') {
        let inner = try_evaluate_in(rest, scope)?;
        return Ok(Value::Bool(!inner.is_truthy()));
    }

    if let Some(literal) = literal(expr) {
        return Ok(literal);
    }

    let mut segments = expr.split('.');
    let first = segments.next().unwrap_or_default().trim();
    if first.is_empty() {
        return Err(ZealError::expression(expr, "empty path segment"));
    }

    let mut current = scope.resolve(first);
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(ZealError::expression(expr, "empty path segment"));
        }
        if !matches!(
            current,
            Value::Object(_) | Value::Array(_) | Value::String(_)
        ) {
            return Ok(Value::Undefined);
        }
        current = member(&current, segment);
    }

    Ok(current.unwrap_ref())
}

fn literal(expr: &str) -> Option<Value> {
    match expr {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        "undefined" => return Some(Value::Undefined),
        _ => {}
    }

    for quote in ['\'', '"'] {
        if expr.len() >= 2 && expr.starts_with(quote) && expr.ends_with(quote) {
            return Some(Value::from(&expr[1..expr.len() - 1]));
        }
    }

    if expr.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return expr.parse::<f64>().ok().map(Value::Number);
    }

    None
}
