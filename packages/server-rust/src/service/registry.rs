use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use waymark_core::{AliasMode, Verb, DEFAULT_MODULE};

use super::definition::ServiceDefinition;

// ---------------------------------------------------------------------------
// Route types
// ---------------------------------------------------------------------------

/// How one alias of a definition is exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    pub alias: AliasMode,
    pub verb: Verb,
    /// Path template with `:param` placeholders.
    pub path: String,
}

impl ServiceRoute {
    #[must_use]
    pub fn rest(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            alias: AliasMode::Rest,
            verb,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn service(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            alias: AliasMode::Service,
            verb,
            path: path.into(),
        }
    }
}

/// A registered route: definition name, owning module, alias, verb and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub name: String,
    pub module: String,
    pub alias: AliasMode,
    pub verb: Verb,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    name: String,
    alias: AliasMode,
    module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DefinitionKey {
    module: String,
    name: String,
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Registry of service definitions and their routing metadata.
///
/// Provides two lookup mechanisms:
/// - **Definitions** by `(name, module)`: what the runner executes
/// - **Routes** by `(name, alias, module)`: path and verb used for hypermedia links
///   and HTTP mounting
///
/// The same name may be registered in several modules and under several aliases.
/// Populated at startup and read-only once traffic begins; it is shared by `Arc`
/// and passed explicitly to the runner.
pub struct ServiceRegistry {
    definitions: DashMap<DefinitionKey, Arc<ServiceDefinition>>,
    routes: DashMap<RouteKey, RouteEntry>,
    /// Route registration order, for deterministic mounting.
    route_order: RwLock<Vec<RouteKey>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
            routes: DashMap::new(),
            route_order: RwLock::new(Vec::new()),
        }
    }

    /// Registers a definition in `module` (or the default module) with its routes.
    ///
    /// An empty module name is the default module.
    ///
    /// Re-registering a name in the same module replaces the definition; a route
    /// with an existing `(name, alias, module)` key replaces that route.
    pub fn register<I>(&self, module: Option<&str>, definition: ServiceDefinition, routes: I)
    where
        I: IntoIterator<Item = ServiceRoute>,
    {
        let module = match module {
            Some(module) if !module.is_empty() => module.to_string(),
            _ => DEFAULT_MODULE.to_string(),
        };
        let name = definition.name().to_string();
        for route in routes {
            self.insert_route(RouteEntry {
                name: name.clone(),
                module: module.clone(),
                alias: route.alias,
                verb: route.verb,
                path: route.path,
            });
        }
        self.definitions
            .insert(DefinitionKey { module, name }, Arc::new(definition));
    }

    fn insert_route(&self, entry: RouteEntry) {
        let key = RouteKey {
            name: entry.name.clone(),
            alias: entry.alias,
            module: entry.module.clone(),
        };
        if self.routes.insert(key.clone(), entry).is_none() {
            self.route_order.write().push(key);
        }
    }

    /// Retrieve a definition by name within a module.
    pub fn definition(&self, name: &str, module: &str) -> Option<Arc<ServiceDefinition>> {
        let key = DefinitionKey {
            module: module.to_string(),
            name: name.to_string(),
        };
        self.definitions.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Retrieve the route registered for `(name, alias, module)`.
    pub fn route(&self, name: &str, alias: AliasMode, module: &str) -> Option<RouteEntry> {
        let key = RouteKey {
            name: name.to_string(),
            alias,
            module: module.to_string(),
        };
        self.routes.get(&key).map(|entry| entry.value().clone())
    }

    /// All routes in registration order.
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.route_order
            .read()
            .iter()
            .filter_map(|key| self.routes.get(key).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
