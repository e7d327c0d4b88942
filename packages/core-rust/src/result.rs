//! Service results and the per-invocation result envelope.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::InvocationArgs;
use crate::schema::ValidationIssue;
use crate::types::{InputMap, Verb};

/// Outcome discriminant of a [`ServiceResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    #[default]
    Success,
    Error,
}

/// Error payload of a failed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultError {
    pub message: String,
}

/// A discoverable reference to another service, attached to a result object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypermediaLink {
    pub rel: String,
    pub href: String,
    pub verb: Verb,
    /// Raw link input, only attached in `service` alias mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputMap>,
}

/// What a service's logic produced.
///
/// Serializes as `{type, meta?, data?, err?, errCode?, links?}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceResult {
    #[serde(rename = "type")]
    pub kind: ResultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ResultError>,
    /// Response code override; wins over the default for the result's branch.
    #[serde(rename = "errCode", default, skip_serializing_if = "Option::is_none")]
    pub err_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<HypermediaLink>>,
}

impl ServiceResult {
    /// A success result.
    #[must_use]
    pub fn success(meta: Value, data: Option<Value>) -> Self {
        Self {
            kind: ResultKind::Success,
            meta: Some(meta),
            data,
            ..Self::default()
        }
    }

    /// An error result with an explicit code.
    #[must_use]
    pub fn error(message: impl Into<String>, code: u16) -> Self {
        Self {
            kind: ResultKind::Error,
            err: Some(ResultError {
                message: message.into(),
            }),
            err_code: Some(code),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind == ResultKind::Success
    }
}

/// The complete result envelope of one service invocation.
///
/// Created fresh per invocation. `response_code` and `response` stay `None`
/// until the response-formatting stage runs.
#[derive(Debug, Clone)]
pub struct RunnerStat {
    pub result: ServiceResult,
    pub allowed: bool,
    pub denied: bool,
    pub denials: Vec<String>,
    pub is_valid: bool,
    pub validation_errors: Vec<ValidationIssue>,
    pub args: Arc<InvocationArgs>,
    pub response: Option<Value>,
    pub response_code: Option<u16>,
}

impl RunnerStat {
    /// Initial envelope: valid, allowed, not denied, empty success result.
    #[must_use]
    pub fn new(args: InvocationArgs) -> Self {
        Self {
            result: ServiceResult::default(),
            allowed: true,
            denied: false,
            denials: Vec::new(),
            is_valid: true,
            validation_errors: Vec::new(),
            args: Arc::new(args),
            response: None,
            response_code: None,
        }
    }

    /// `allowed && !denied`.
    #[must_use]
    pub fn is_rule_satisfied(&self) -> bool {
        self.allowed && !self.denied
    }
}
