//! Router assembly for the HTTP binding.
//!
//! Every `rest` registry entry is mounted at its path and verb; the `service`
//! alias is served by one generic `POST {prefix}/{module}/{name}` endpoint.
//! Binding a listener and serving the router is left to the embedding binary.

use std::collections::{HashMap, HashSet};

use axum::extract::{Query, RawPathParams, State};
use axum::http::HeaderMap;
use axum::routing::{post, MethodFilter, MethodRouter};
use axum::Router;
use bytes::Bytes;
use tracing::{debug, warn};
use waymark_core::{path, AliasMode, Verb};

use super::handlers::{rest_handler, service_handler, AppState, ServiceTarget};
use super::middleware::with_http_layers;

fn method_filter(verb: Verb) -> MethodFilter {
    match verb {
        Verb::Get => MethodFilter::GET,
        Verb::Post => MethodFilter::POST,
        Verb::Put => MethodFilter::PUT,
        Verb::Patch => MethodFilter::PATCH,
        Verb::Delete => MethodFilter::DELETE,
    }
}

/// Assembles the axum router with all routes and middleware.
///
/// Routes are mounted in registry registration order. Routes are compared by
/// shape, with capture names ignored. An entry whose shape is already
/// mounted under a different template, or under the same template and verb,
/// is skipped with a warning. So is an entry shaped like the service endpoint.
pub fn build_router(state: AppState) -> Router {
    let registry = std::sync::Arc::clone(state.router.runner().registry());
    let service_route = state.config.service_route();
    let service_shape = path::route_shape(&service_route);

    let mut order: Vec<String> = Vec::new();
    // shape -> (template mounted for it, its method router)
    let mut methods: HashMap<String, (String, MethodRouter<AppState>)> = HashMap::new();
    let mut mounted: HashSet<(String, Verb)> = HashSet::new();

    for entry in registry.routes() {
        if entry.alias != AliasMode::Rest {
            continue;
        }
        if !entry.path.starts_with('/') {
            warn!(service = %entry.name, path = %entry.path, "route path must start with '/'; skipped");
            continue;
        }
        let route = path::to_route_syntax(&entry.path).into_owned();
        let shape = path::route_shape(&route);
        if shape == service_shape {
            warn!(
                service = %entry.name,
                path = %entry.path,
                endpoint = %service_route,
                "route collides with the service endpoint; skipped"
            );
            continue;
        }
        if let Some((existing, _)) = methods.get(&shape) {
            if *existing != route {
                warn!(
                    service = %entry.name,
                    path = %entry.path,
                    mounted = %existing,
                    "route conflicts with a mounted route; skipped"
                );
                continue;
            }
        }
        if !mounted.insert((shape.clone(), entry.verb)) {
            warn!(
                service = %entry.name,
                module = %entry.module,
                verb = %entry.verb,
                path = %entry.path,
                "route already mounted; skipped"
            );
            continue;
        }

        let target = ServiceTarget {
            name: entry.name.clone(),
            module: entry.module.clone(),
        };
        let handler = move |State(state): State<AppState>,
                            params: RawPathParams,
                            query: Query<HashMap<String, String>>,
                            headers: HeaderMap,
                            body: Bytes| {
            rest_handler(state, target.clone(), params, query, headers, body)
        };

        debug!(service = %entry.name, verb = %entry.verb, path = %route, "mounting route");
        let filter = method_filter(entry.verb);
        let method_router = match methods.remove(&shape) {
            Some((_, existing)) => existing.on(filter, handler),
            None => {
                order.push(shape.clone());
                MethodRouter::new().on(filter, handler)
            }
        };
        methods.insert(shape, (route, method_router));
    }

    let mut router = Router::new();
    for shape in order {
        if let Some((route, method_router)) = methods.remove(&shape) {
            router = router.route(&route, method_router);
        }
    }

    let router = router.route(&service_route, post(service_handler));
    with_http_layers(router, &state.config).with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
