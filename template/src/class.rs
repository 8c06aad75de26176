//! Class and style binding normalization.
//!
//! `:class` accepts a string, an array (nested arrays and objects allowed) or an
//! object whose truthy keys are the class names. `:style` accepts a string or an
//! object of property/value pairs; camel-cased property names are converted to their
//! hyphenated form. A static `class`/`style` on the same element comes first.

use zeal_core::{Str, Value};

/// Normalizes a class binding to a space-separated class list.
#[must_use]
pub fn normalize_class(value: &Value) -> String {
    let mut classes = Vec::new();
    collect_classes(value, &mut classes);
    classes.join(" ")
}

fn collect_classes(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => out.extend(text.split_whitespace().map(str::to_owned)),
        Value::Array(array) => {
            for item in array.to_vec() {
                collect_classes(&item, out);
            }
        }
        Value::Object(object) => out.extend(
            object
                .entries()
                .into_iter()
                .filter(|(_, enabled)| enabled.is_truthy())
                .map(|(name, _)| name.to_string()),
        ),
        Value::Number(_) => out.push(value.to_string()),
        Value::Ref(cell) => collect_classes(&cell.get(), out),
        Value::Undefined | Value::Null | Value::Bool(_) => {}
    }
}

/// Normalizes a style binding to `prop: value; prop: value`.
#[must_use]
pub fn normalize_style(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().trim_end_matches(';').trim().to_owned(),
        Value::Object(object) => object
            .entries()
            .into_iter()
            .filter(|(_, v)| !v.is_nullish() && !matches!(v, Value::Bool(false)))
            .map(|(name, v)| format!("{}: {v}", hyphenate(&name)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Array(array) => join_non_empty(
            &array.to_vec().iter().map(normalize_style).collect::<Vec<_>>(),
            "; ",
        ),
        Value::Ref(cell) => normalize_style(&cell.get()),
        _ => String::new(),
    }
}

/// Joins a static part and a dynamic part, skipping whichever is empty.
#[must_use]
pub fn merge(fixed: Option<&Str>, dynamic: &str, separator: &str) -> String {
    let fixed = fixed.map_or("", |fixed| fixed.trim());
    join_non_empty(&[fixed.to_owned(), dynamic.to_owned()], separator)
}

fn join_non_empty(parts: &[String], separator: &str) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}

fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
