//! Service definitions and the builder DSL that attaches stage callbacks.
//!
//! A [`ServiceDefinition`] is a name plus a build function. The runner invokes the
//! build function once per execution with a fresh [`ServiceBuilder`], so no state
//! survives between invocations. The builder fills a [`StageTable`]: one optional
//! slot per stage (last registration wins) and an ordered list of keyed
//! pre-processors.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use waymark_core::{InvocationArgs, ServiceResult};

use super::capabilities::CapabilityContext;
use super::logic::LogicContext;
use super::operation::RunnerError;
use super::rule::RuleContext;

/// Lazily computes one input field.
pub type PreProcessor =
    Box<dyn for<'a> Fn(&'a InvocationArgs) -> BoxFuture<'a, anyhow::Result<Value>> + Send + Sync>;

/// Authorization callback.
pub type RuleFn = Box<dyn Fn(RuleContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Business logic callback.
pub type LogicFn =
    Box<dyn Fn(LogicContext) -> BoxFuture<'static, anyhow::Result<ServiceResult>> + Send + Sync>;

/// Hypermedia declaration callback.
pub type CapabilityFn =
    Box<dyn Fn(CapabilityContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

type BuildFn = dyn Fn(&mut ServiceBuilder) + Send + Sync;

/// A named, declarative bundle of stage callbacks.
#[derive(Clone)]
pub struct ServiceDefinition {
    name: String,
    build: Arc<BuildFn>,
}

impl ServiceDefinition {
    /// Creates a definition from its build function.
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&mut ServiceBuilder) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the build function against a fresh builder.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::MissingLogic`] when no logic callback was registered.
    pub fn build(&self) -> Result<StageTable, RunnerError> {
        let mut builder = ServiceBuilder::default();
        (self.build)(&mut builder);
        builder.finish(&self.name)
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registrar handed to a definition's build function.
#[derive(Default)]
pub struct ServiceBuilder {
    validator: Option<Value>,
    pre: Vec<(String, PreProcessor)>,
    rule: Option<RuleFn>,
    logic: Option<LogicFn>,
    capabilities: Option<CapabilityFn>,
}

impl ServiceBuilder {
    /// Declares the JSON schema the input map is checked against.
    pub fn define_validator(&mut self, schema: Value) -> &mut Self {
        self.validator = Some(schema);
        self
    }

    /// Registers a pre-processor computing `input[key]` when it is absent.
    pub fn define_pre<F>(&mut self, key: impl Into<String>, pre: F) -> &mut Self
    where
        F: for<'a> Fn(&'a InvocationArgs) -> BoxFuture<'a, anyhow::Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.pre.push((key.into(), Box::new(pre)));
        self
    }

    /// Registers the authorization rule.
    pub fn define_rule<F>(&mut self, rule: F) -> &mut Self
    where
        F: Fn(RuleContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.rule = Some(Box::new(rule));
        self
    }

    /// Registers the business logic. Required.
    pub fn define_logic<F>(&mut self, logic: F) -> &mut Self
    where
        F: Fn(LogicContext) -> BoxFuture<'static, anyhow::Result<ServiceResult>>
            + Send
            + Sync
            + 'static,
    {
        self.logic = Some(Box::new(logic));
        self
    }

    /// Registers the hypermedia declaration.
    pub fn define_capabilities<F>(&mut self, capabilities: F) -> &mut Self
    where
        F: Fn(CapabilityContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.capabilities = Some(Box::new(capabilities));
        self
    }

    fn finish(self, service: &str) -> Result<StageTable, RunnerError> {
        let logic = self.logic.ok_or_else(|| RunnerError::MissingLogic {
            service: service.to_string(),
        })?;
        Ok(StageTable {
            validator: self.validator,
            pre: self.pre,
            rule: self.rule,
            logic,
            capabilities: self.capabilities,
        })
    }
}

/// The stage callbacks captured from one build.
pub struct StageTable {
    pub validator: Option<Value>,
    pub pre: Vec<(String, PreProcessor)>,
    pub rule: Option<RuleFn>,
    pub logic: LogicFn,
    pub capabilities: Option<CapabilityFn>,
}

impl fmt::Debug for StageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageTable")
            .field("validator", &self.validator)
            .field("pre", &self.pre.iter().map(|(key, _)| key).collect::<Vec<_>>())
            .field("rule", &self.rule.is_some())
            .field("capabilities", &self.capabilities.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
