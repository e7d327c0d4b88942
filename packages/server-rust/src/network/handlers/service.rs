//! Handlers translating HTTP requests into service calls.
//!
//! The request becomes invocation arguments as follows: the bearer header is
//! resolved to an identity, and `input` is the query string overlaid with the
//! JSON body's fields, overlaid with the path parameters. The resulting
//! `{responseCode, response}` pair becomes the status and JSON body.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, RawPathParams, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::warn;
use waymark_core::{AliasMode, InputMap, InvocationArgs, RunnerStat, ServiceScope, TransportHandle};

use super::AppState;
use crate::auth::Identity;
use crate::service::{build_service_pipeline, response, RunnerError, ServiceCall};

/// The definition a mounted route dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub name: String,
    pub module: String,
}

/// Handles a request on a route mounted from a `rest` registry entry.
pub async fn rest_handler(
    state: AppState,
    target: ServiceTarget,
    params: RawPathParams,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = params
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    dispatch(
        &state,
        target,
        AliasMode::Rest,
        params,
        query.into_iter().collect(),
        headers,
        &body,
    )
    .await
}

/// Handles `POST {prefix}/{module}/{name}`, the `service` alias endpoint.
///
/// Only definitions registered with a `service` route are reachable here;
/// anything else is a 404.
pub async fn service_handler(
    State(state): State<AppState>,
    Path((module, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let registry = state.router.runner().registry();
    if registry.route(&name, AliasMode::Service, &module).is_none() {
        return into_response(Err(RunnerError::UnknownService { name, module }));
    }
    dispatch(
        &state,
        ServiceTarget { name, module },
        AliasMode::Service,
        BTreeMap::new(),
        query.into_iter().collect(),
        headers,
        &body,
    )
    .await
}

async fn dispatch(
    state: &AppState,
    target: ServiceTarget,
    alias: AliasMode,
    params: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    body: &[u8],
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(rejection) => return rejection,
    };

    let mut input = InputMap::new();
    for (key, value) in &query {
        input.insert(key.clone(), Value::String(value.clone()));
    }
    if let Some(Value::Object(fields)) = &body {
        input.extend(fields.clone());
    }
    for (key, value) in &params {
        input.insert(key.clone(), Value::String(value.clone()));
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let identity = state
        .authority
        .as_ref()
        .map_or_else(Identity::anonymous, |authority| {
            authority.authenticate(authorization)
        });

    let args = identity.apply(InvocationArgs {
        input,
        params,
        query,
        body,
        transport: Some(TransportHandle::new(headers)),
        ..InvocationArgs::default()
    });
    let call = ServiceCall::new(target.name, args)
        .in_scope(ServiceScope::new(target.module, alias))
        .with_policy_extractors(state.config.policy_extractors.clone());

    let pipeline = build_service_pipeline(state.router.clone(), state.router.runner().config());
    into_response(pipeline.oneshot(call).await)
}

/// An empty body is no body; anything else must be JSON.
fn parse_body(body: &[u8]) -> Result<Option<Value>, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": format!("Request body is not valid JSON: {err}") })),
        )
            .into_response()
    })
}

/// Maps a pipeline outcome onto an HTTP response.
#[must_use]
pub fn into_response(result: Result<RunnerStat, RunnerError>) -> Response {
    match result {
        Ok(stat) => {
            let (code, body) = if let (Some(code), Some(body)) =
                (stat.response_code, stat.response.as_ref())
            {
                (code, body.clone())
            } else {
                response::format_response(&stat)
            };
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
        Err(err) => {
            let status = match &err {
                RunnerError::UnknownService { .. } => StatusCode::NOT_FOUND,
                RunnerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(error = %err, status = status.as_u16(), "service call failed");
            (status, Json(json!({ "message": err.to_string() }))).into_response()
        }
    }
}
