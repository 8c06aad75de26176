//! # The Resolve Pattern
//!
//! Expressions in templates name things: `user.name`, `item`, `$count`. Only the
//! first segment of such a path depends on *where* the expression is evaluated. At the
//! top level it names a state field, a prop or a computed value; inside a `z-for`
//! body it may name the loop variable. Everything after the first segment is a plain
//! walk through the value graph.
//!
//! [`Resolve`] captures that first step. Anything that can answer "what does this
//! name mean here?" implements it:
//!
//! - a [`Value`] resolves names as members of itself (the plain snapshot case);
//! - template scopes layer loop variables over their parent and over the component
//!   context.
//!
//! ```
//! use zeal_core::{evaluate::evaluate_in, resolve::Resolve, value::Value};
//!
//! struct Answer;
//!
//! impl Resolve for Answer {
//!     fn resolve(&self, name: &str) -> Value {
//!         if name == "answer" { Value::from(42) } else { Value::Undefined }
//!     }
//! }
//!
//! assert_eq!(evaluate_in("answer", &Answer), Value::from(42));
//! ```

use crate::value::Value;

/// Looks up the first segment of an expression path.
pub trait Resolve {
    /// Returns the value bound to `name`, or [`Value::Undefined`].
    fn resolve(&self, name: &str) -> Value;
}

impl Resolve for Value {
    fn resolve(&self, name: &str) -> Value {
        member(self, name)
    }
}

impl<R: Resolve + ?Sized> Resolve for &R {
    fn resolve(&self, name: &str) -> Value {
        (**self).resolve(name)
    }
}

/// Reads one path segment from `value`.
///
/// Objects yield their field; arrays accept numeric indices and `length`; strings
/// accept `length`. Every other combination yields [`Value::Undefined`].
#[must_use]
pub fn member(value: &Value, segment: &str) -> Value {
    match value {
        Value::Object(object) => object.get(segment),
        Value::Array(array) => {
            if segment == "length" {
                Value::from(array.len())
            } else {
                segment
                    .parse::<usize>()
                    .map_or(Value::Undefined, |index| array.get(index))
            }
        }
        Value::String(s) if segment == "length" => Value::from(s.chars().count()),
        _ => Value::Undefined,
    }
}
