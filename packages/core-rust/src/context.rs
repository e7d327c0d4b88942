use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::types::{InputMap, Principal};

/// Transport-specific request/response handle, carried through a run untouched.
#[derive(Clone)]
pub struct TransportHandle(Arc<dyn Any + Send + Sync>);

impl TransportHandle {
    /// Wraps an arbitrary transport value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrows the wrapped value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportHandle(..)")
    }
}

/// Per-call arguments of one service invocation.
///
/// Owned by exactly one runner execution. Pre-processors write into `input`
/// and policy extractors append to `policies` while the run is in progress;
/// later stages only read.
#[derive(Debug, Clone, Default)]
pub struct InvocationArgs {
    /// Whether the caller presented a valid credential.
    pub is_authenticated: bool,
    /// Granted policy names, in grant order. Duplicates are allowed.
    pub policies: Vec<String>,
    /// Authenticated principal, if any.
    pub user: Option<Principal>,
    /// Free-form input the service validates and consumes.
    pub input: InputMap,
    /// Path parameters extracted by the transport.
    pub params: BTreeMap<String, String>,
    /// Query parameters extracted by the transport.
    pub query: BTreeMap<String, String>,
    /// Raw request body, when the transport had one.
    pub body: Option<Value>,
    /// Opaque transport handle.
    pub transport: Option<TransportHandle>,
}

impl InvocationArgs {
    /// Arguments for an unauthenticated caller with the given input.
    #[must_use]
    pub fn anonymous(input: InputMap) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    /// Marks the invocation as authenticated on behalf of `user`.
    #[must_use]
    pub fn authenticated(mut self, user: Principal) -> Self {
        self.is_authenticated = true;
        self.user = Some(user);
        self
    }

    /// Appends granted policies.
    #[must_use]
    pub fn with_policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies.extend(policies.into_iter().map(Into::into));
        self
    }

    /// Sets a single input field.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.input.insert(key.into(), value);
        self
    }

    /// Whether `policy` was granted to the caller.
    #[must_use]
    pub fn has_policy(&self, policy: &str) -> bool {
        self.policies.iter().any(|p| p == policy)
    }

    /// Arguments for a reachability probe on another service.
    ///
    /// Keeps the caller's authentication state, principal and granted policies;
    /// everything request-specific is replaced by `input`.
    #[must_use]
    pub fn probe(&self, input: Option<InputMap>) -> Self {
        Self {
            is_authenticated: self.is_authenticated,
            policies: self.policies.clone(),
            user: self.user.clone(),
            input: input.unwrap_or_default(),
            ..Self::default()
        }
    }
}
