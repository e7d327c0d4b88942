//! Path-template compilation.
//!
//! Templates use `:name` placeholders (`/users/:id/posts/:postId`). Compiling a
//! template against an input map substitutes every placeholder with the
//! percent-encoded input value.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::types::InputMap;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder pattern is valid"));

static CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}/]*\}").expect("capture pattern is valid"));

/// Errors from compiling a path template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("missing path parameter `{param}` for template `{template}`")]
    MissingParam { param: String, template: String },
    #[error("path parameter `{param}` must be a string, number or boolean")]
    UnsupportedValue { param: String },
}

/// Substitutes every placeholder in `template` with the matching `input` value.
///
/// # Errors
///
/// Returns [`PathError::MissingParam`] when a placeholder has no input value and
/// [`PathError::UnsupportedValue`] when the value is an object, array or null.
pub fn compile(template: &str, input: &InputMap) -> Result<String, PathError> {
    let mut failure = None;
    let compiled = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let param = &caps[1];
        match input.get(param).map(|value| segment(param, value)) {
            Some(Ok(encoded)) => encoded,
            Some(Err(err)) => {
                failure.get_or_insert(err);
                String::new()
            }
            None => {
                failure.get_or_insert(PathError::MissingParam {
                    param: param.to_string(),
                    template: template.to_string(),
                });
                String::new()
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(compiled.into_owned()),
    }
}

/// Rewrites `:name` placeholders into `{name}` route-capture syntax.
#[must_use]
pub fn to_route_syntax(template: &str) -> Cow<'_, str> {
    PLACEHOLDER.replace_all(template, "{${1}}")
}

/// The shape of a route in `{name}` syntax with every capture name erased.
///
/// Two routes with the same shape match the same requests, so a router can
/// hold only one of them.
#[must_use]
pub fn route_shape(route: &str) -> String {
    CAPTURE.replace_all(route, "{}").into_owned()
}

fn segment(param: &str, value: &Value) -> Result<String, PathError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            return Err(PathError::UnsupportedValue {
                param: param.to_string(),
            })
        }
    };
    Ok(urlencoding::encode(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn input(value: Value) -> InputMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn substitutes_and_encodes() {
        let path = compile(
            "/users/:id/files/:name",
            &input(json!({"id": 42, "name": "a b/c"})),
        )
        .unwrap();
        assert_eq!(path, "/users/42/files/a%20b%2Fc");
    }

    #[test]
    fn template_without_placeholders_is_unchanged() {
        assert_eq!(compile("/health", &InputMap::new()).unwrap(), "/health");
    }

    #[test]
    fn missing_param_is_reported() {
        let err = compile("/users/:id", &InputMap::new()).unwrap_err();
        assert_eq!(
            err,
            PathError::MissingParam {
                param: "id".into(),
                template: "/users/:id".into()
            }
        );
    }

    #[test]
    fn object_values_are_rejected() {
        let err = compile("/users/:id", &input(json!({"id": {"x": 1}}))).unwrap_err();
        assert!(matches!(err, PathError::UnsupportedValue { .. }));
    }

    proptest::proptest! {
        #[test]
        fn substituted_segment_never_splits_the_path(value in ".*") {
            let mut input = InputMap::new();
            input.insert("id".into(), Value::String(value));
            let path = compile("/items/:id", &input).unwrap();
            proptest::prop_assert_eq!(path.matches('/').count(), 2);
            proptest::prop_assert!(path.starts_with("/items/"));
        }
    }

    #[test]
    fn converts_route_syntax() {
        assert_eq!(to_route_syntax("/a/:x/b/:y_z"), "/a/{x}/b/{y_z}");
    }

    #[test]
    fn shapes_ignore_capture_names() {
        assert_eq!(route_shape("/users/{id}"), route_shape("/users/{userId}"));
        assert_eq!(route_shape("/services/{module}/{name}"), "/services/{}/{}");
        assert_ne!(route_shape("/users/{id}"), route_shape("/users/me"));
    }
}
