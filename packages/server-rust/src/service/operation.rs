//! Service calls routed through the pipeline and the errors a run can raise.

use uuid::Uuid;
use waymark_core::{InvocationArgs, SchemaError, ServiceScope};

use super::runner::{Stage, StageFlags};

/// A named service invocation dispatched through the [`ServiceRouter`](super::ServiceRouter).
#[derive(Debug, Clone)]
pub struct ServiceCall {
    /// Unique id of this call, used for tracing.
    pub call_id: Uuid,
    /// Registered definition name.
    pub name: String,
    /// Owning module and alias mode of the call.
    pub scope: ServiceScope,
    /// Invocation arguments, moved into the run.
    pub args: InvocationArgs,
    /// Stage enable/disable flags.
    pub flags: StageFlags,
    /// Reference ids of the policy extractors to run, in order.
    pub policy_extractors: Vec<String>,
    /// Per-call timeout override in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl ServiceCall {
    /// A call in the default scope with every stage enabled.
    #[must_use]
    pub fn new(name: impl Into<String>, args: InvocationArgs) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            name: name.into(),
            scope: ServiceScope::default(),
            args,
            flags: StageFlags::default(),
            policy_extractors: Vec::new(),
            timeout_ms: None,
        }
    }

    #[must_use]
    pub fn in_scope(mut self, scope: ServiceScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_policy_extractors<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy_extractors = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: StageFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Errors raised while running a service.
///
/// Only [`RunnerError::MissingLogic`] escapes [`Runner::execute`](super::Runner::execute);
/// every other variant is absorbed into the result envelope as a 500.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("service `{service}` forgot to define logic")]
    MissingLogic { service: String },
    #[error("unknown service `{name}` in module `{module}`")]
    UnknownService { name: String, module: String },
    #[error("unknown policy extractor `{id}` in module `{module}`")]
    UnknownPolicyExtractor { id: String, module: String },
    #[error("service `{service}` declares an unusable schema: {source}")]
    Schema {
        service: String,
        #[source]
        source: SchemaError,
    },
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
    #[error("link target `{pointer}` does not exist in the result data")]
    LinkTarget { pointer: String },
    #[error("failed to resolve link to `{target}`: {reason}")]
    LinkResolution { target: String, reason: String },
    #[error("link probe depth {depth} exceeds the limit of {limit}")]
    LinkDepthExceeded { depth: usize, limit: usize },
    #[error("service call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl RunnerError {
    /// Wraps a callback failure raised in `stage`.
    #[must_use]
    pub fn stage(stage: Stage, source: anyhow::Error) -> Self {
        Self::Stage { stage, source }
    }
}
