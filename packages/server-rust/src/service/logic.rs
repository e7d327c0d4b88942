use std::sync::Arc;

use serde_json::Value;
use waymark_core::{InvocationArgs, ServiceResult};

use crate::auth::TokenAuthority;

/// Handle given to a service's logic callback.
#[derive(Clone)]
pub struct LogicContext {
    args: Arc<InvocationArgs>,
    authority: Option<Arc<TokenAuthority>>,
}

impl LogicContext {
    #[must_use]
    pub fn new(args: Arc<InvocationArgs>, authority: Option<Arc<TokenAuthority>>) -> Self {
        Self { args, authority }
    }

    #[must_use]
    pub fn args(&self) -> &InvocationArgs {
        &self.args
    }

    #[must_use]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.args.input.get(key)
    }

    /// The credential signer/verifier, when the runner was given one.
    #[must_use]
    pub fn auth(&self) -> Option<&TokenAuthority> {
        self.authority.as_deref()
    }

    /// A success result.
    #[must_use]
    pub fn success(&self, meta: Value, data: Option<Value>) -> ServiceResult {
        ServiceResult::success(meta, data)
    }

    /// An error result with code 500.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> ServiceResult {
        ServiceResult::error(message, 500)
    }

    /// An error result with an explicit code.
    #[must_use]
    pub fn error_with_code(&self, message: impl Into<String>, code: u16) -> ServiceResult {
        ServiceResult::error(message, code)
    }
}

impl std::fmt::Debug for LogicContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicContext")
            .field("args", &self.args)
            .field("has_authority", &self.authority.is_some())
            .finish()
    }
}
