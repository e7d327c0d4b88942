use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form input map handed to a service (JSON object semantics).
pub type InputMap = serde_json::Map<String, serde_json::Value>;

/// Module name used when a registration or invocation does not name one.
pub const DEFAULT_MODULE: &str = "default";

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier for the authenticated entity (the token subject).
    pub id: String,
    /// Roles assigned to this principal.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Remaining credential claims, passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub claims: InputMap,
}

impl Principal {
    /// Creates a principal with no roles and no extra claims.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            claims: InputMap::new(),
        }
    }
}

/// Invocation style of a service registration.
///
/// The same definition may be reachable both as an RPC-style `service` call and as
/// a `rest` route; the alias is part of every registry lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasMode {
    /// RPC-style invocation by service name.
    Service,
    /// Resource-style invocation by path and verb.
    Rest,
}

impl AliasMode {
    /// Returns the lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Rest => "rest",
        }
    }
}

impl fmt::Display for AliasMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verb a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Returns the uppercase method name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an invocation lives: its owning module and its alias mode.
///
/// Hypermedia link targets are looked up in the same scope as the invocation
/// that declares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceScope {
    /// Owning module name.
    pub module: String,
    /// Invocation style.
    pub alias: AliasMode,
}

impl ServiceScope {
    /// Creates a scope, substituting [`DEFAULT_MODULE`] for an empty module name.
    #[must_use]
    pub fn new(module: impl Into<String>, alias: AliasMode) -> Self {
        let module = module.into();
        Self {
            module: if module.is_empty() {
                DEFAULT_MODULE.to_string()
            } else {
                module
            },
            alias,
        }
    }

    /// Scope in the default module with the given alias mode.
    #[must_use]
    pub fn in_default_module(alias: AliasMode) -> Self {
        Self::new(DEFAULT_MODULE, alias)
    }
}

impl Default for ServiceScope {
    fn default() -> Self {
        Self::in_default_module(AliasMode::Service)
    }
}
