//! Authorization rule context.
//!
//! Once a rule exists the decision starts as deny (`allowed = false`). The rule
//! callback flips it with [`RuleContext::allow`] or the policy helpers; any
//! [`RuleContext::deny`] wins over an allow.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use waymark_core::{InvocationArgs, Principal};

/// Accumulated rule outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDecision {
    pub allowed: bool,
    pub denied: bool,
    pub denials: Vec<String>,
}

impl RuleDecision {
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.allowed && !self.denied
    }
}

/// Handle given to a service's rule callback.
///
/// Cheap to clone; every clone shares the same decision.
#[derive(Debug, Clone)]
pub struct RuleContext {
    args: Arc<InvocationArgs>,
    decision: Arc<Mutex<RuleDecision>>,
}

impl RuleContext {
    /// A context with the default-deny decision.
    #[must_use]
    pub fn new(args: Arc<InvocationArgs>) -> Self {
        Self {
            args,
            decision: Arc::new(Mutex::new(RuleDecision::default())),
        }
    }

    #[must_use]
    pub fn args(&self) -> &InvocationArgs {
        &self.args
    }

    #[must_use]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.args.input.get(key)
    }

    #[must_use]
    pub fn user(&self) -> Option<&Principal> {
        self.args.user.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.args.is_authenticated
    }

    #[must_use]
    pub fn has_policy(&self, name: &str) -> bool {
        self.args.has_policy(name)
    }

    /// Allows the call.
    pub fn allow(&self) {
        self.decision.lock().allowed = true;
    }

    /// Denies the call without a message.
    pub fn deny(&self) {
        self.decision.lock().denied = true;
    }

    /// Denies the call, recording `message` in the denials list.
    pub fn deny_with(&self, message: impl Into<String>) {
        let mut decision = self.decision.lock();
        decision.denied = true;
        decision.denials.push(message.into());
    }

    /// Allows the call if `name` was granted. Returns whether it was.
    pub fn allow_policy(&self, name: &str) -> bool {
        if self.has_policy(name) {
            self.allow();
            true
        } else {
            false
        }
    }

    /// Denies the call if `name` was granted. Returns whether it was.
    pub fn deny_policy(&self, name: &str) -> bool {
        if self.has_policy(name) {
            self.deny_with(format!("Denied by policy {name}"));
            true
        } else {
            false
        }
    }

    /// Snapshot of the decision so far.
    #[must_use]
    pub fn decision(&self) -> RuleDecision {
        self.decision.lock().clone()
    }
}
