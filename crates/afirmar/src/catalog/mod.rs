//! Built-in predicates and assertions.
//!
//! Predicates act on the statement's subject and propagate changes after
//! acting. Assertions check the object, honour negation and fail with
//! `TargetNotFound` when the object resolves to nothing (except
//! [`be_found`], whose job is exactly that check).
//!
//! On multi targets every resolved element must satisfy an assertion;
//! negated, every element must fail it.

pub mod assertions;
pub mod predicates;

pub use assertions::{
    be_found, contain_text, have_attributes, have_been_called, have_class, have_emitted, have_properties,
    have_state, have_text, satisfy, BeFound, CalledAssertion, EmittedAssertion,
};
pub use predicates::{
    act, call, click, detect_changes, emit, repeated, set_attributes, set_properties, set_state, trigger, wait,
};

use crate::result::AfirmarError;
use crate::target::Target;
use serde_json::Value;

/// Collapse runs of whitespace, as `text_content` does
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `actual` contains every field of `expected`, recursively for
/// objects
pub(crate) fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| json_contains(a, value))),
        _ => actual == expected,
    }
}

/// "Expected `target` [not ]to `description`, but `actual`"
pub(crate) fn expectation_failed(target: &Target, negated: bool, description: &str, actual: &str) -> AfirmarError {
    let not = if negated { "not " } else { "" };
    AfirmarError::assertion(format!("Expected {target} {not}to {description}, but {actual}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a \n b\tc "), "a b c");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_json_contains() {
        let state = json!({"opened": true, "user": {"name": "Ada", "id": 1}, "tags": [1, 2]});
        assert!(json_contains(&state, &json!({"opened": true})));
        assert!(json_contains(&state, &json!({"user": {"name": "Ada"}})));
        assert!(!json_contains(&state, &json!({"user": {"name": "Bob"}})));
        assert!(!json_contains(&state, &json!({"missing": null})));
        assert!(!json_contains(&state, &json!({"tags": [1]})));
        assert!(json_contains(&state, &json!({})));
    }
}
