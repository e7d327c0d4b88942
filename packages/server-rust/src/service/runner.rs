//! The service runner: executes one definition against one invocation.
//!
//! Stages run strictly in order, each awaited to completion before the next:
//!
//! 1. **Build** — invoke the definition's build function (fatal without logic)
//! 2. **Validate** — check `input` against the declared schema, collecting every issue
//! 3. **Pre-process** — fill absent `input` keys from keyed pre-processors
//! 4. **Aggregate policies** — append grants from the requested policy extractors
//! 5. **Authorize** — run the rule (default-deny once a rule exists)
//! 6. **Execute logic** — validation error, 401/403, or the logic's own result
//! 7. **Resolve capabilities** — probe link targets and attach hypermedia links
//! 8. **Format response** — map the terminal state onto `{responseCode, response}`
//!
//! Stages 2-8 can be disabled individually. Any error in stages 2-7 is absorbed
//! at the pipeline boundary as a 500 result before formatting.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{debug, info_span, warn, Instrument};
use waymark_core::{
    InvocationArgs, ResultKind, RunnerStat, SchemaValidator, ServiceResult, ServiceScope,
};

use super::capabilities::CapabilityContext;
use super::config::RunnerConfig;
use super::context::ModuleContext;
use super::definition::{ServiceDefinition, StageTable};
use super::links::LinkResolver;
use super::logic::LogicContext;
use super::operation::RunnerError;
use super::registry::ServiceRegistry;
use super::response;
use super::rule::RuleContext;
use crate::auth::TokenAuthority;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Build,
    Validate,
    PreProcess,
    AggregatePolicies,
    Authorize,
    ExecuteLogic,
    ResolveCapabilities,
    FormatResponse,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Validate => "validate",
            Self::PreProcess => "pre-process",
            Self::AggregatePolicies => "policy aggregation",
            Self::Authorize => "authorize",
            Self::ExecuteLogic => "logic",
            Self::ResolveCapabilities => "capabilities",
            Self::FormatResponse => "format response",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StageFlags / RunOptions
// ---------------------------------------------------------------------------

/// Per-stage disable switches. A disabled stage is skipped entirely.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageFlags {
    pub disable_validator: bool,
    pub disable_pre: bool,
    pub disable_policies: bool,
    pub disable_rule: bool,
    pub disable_logic: bool,
    pub disable_capabilities: bool,
    pub disable_response: bool,
}

impl StageFlags {
    /// Flags for a reachability probe: validation and authorization only.
    #[must_use]
    pub fn probe() -> Self {
        Self {
            disable_logic: true,
            disable_capabilities: true,
            ..Self::default()
        }
    }

    /// Whether `stage` runs under these flags. Build always runs.
    #[must_use]
    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Build => true,
            Stage::Validate => !self.disable_validator,
            Stage::PreProcess => !self.disable_pre,
            Stage::AggregatePolicies => !self.disable_policies,
            Stage::Authorize => !self.disable_rule,
            Stage::ExecuteLogic => !self.disable_logic,
            Stage::ResolveCapabilities => !self.disable_capabilities,
            Stage::FormatResponse => !self.disable_response,
        }
    }
}

/// Options for one execution.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub flags: StageFlags,
    /// Reference ids of the policy extractors to run, in order.
    pub policy_extractors: Vec<String>,
    /// Module and alias mode of the invocation; link targets resolve in the same scope.
    pub scope: ServiceScope,
    /// Link-probe nesting depth; 0 for a top-level call.
    pub depth: usize,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Executes service definitions.
///
/// Holds only shared, read-only collaborators; all per-call state lives in the
/// [`RunnerStat`] of each execution, so concurrent and recursive executions are
/// independent.
pub struct Runner {
    registry: Arc<ServiceRegistry>,
    context: Arc<ModuleContext>,
    validator: Arc<dyn SchemaValidator>,
    authority: Option<Arc<TokenAuthority>>,
    config: Arc<RunnerConfig>,
}

impl Runner {
    #[must_use]
    pub fn new(
        registry: Arc<ServiceRegistry>,
        context: Arc<ModuleContext>,
        validator: Arc<dyn SchemaValidator>,
        config: Arc<RunnerConfig>,
    ) -> Self {
        Self {
            registry,
            context,
            validator,
            authority: None,
            config,
        }
    }

    /// Gives logic callbacks access to a credential signer/verifier.
    #[must_use]
    pub fn with_authority(mut self, authority: Arc<TokenAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Executes `definition` against `args`.
    ///
    /// Failures of any stage are absorbed into the returned envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::MissingLogic`] when the definition never registers
    /// a logic callback; no stage runs in that case.
    pub fn execute<'a>(
        &'a self,
        definition: &'a ServiceDefinition,
        args: InvocationArgs,
        options: RunOptions,
    ) -> BoxFuture<'a, Result<RunnerStat, RunnerError>> {
        let span = info_span!(
            "service",
            service = definition.name(),
            module = %options.scope.module,
            alias = %options.scope.alias,
            depth = options.depth,
        );
        Box::pin(
            async move {
                let stages = definition.build()?;
                let mut stat = RunnerStat::new(args);
                if let Err(err) = self
                    .run_stages(definition.name(), &stages, &mut stat, &options)
                    .await
                {
                    warn!(error = %err, "service run failed");
                    absorb_fault(&mut stat, &err);
                }
                if options.flags.is_enabled(Stage::FormatResponse) {
                    response::apply(&mut stat);
                }
                debug!(response_code = ?stat.response_code, "service run complete");
                Ok(stat)
            }
            .instrument(span),
        )
    }

    /// Executes `definition` as a reachability probe.
    ///
    /// Unlike [`execute`](Self::execute), stage failures are returned rather than
    /// absorbed, so the caller can tell "not allowed" from "could not decide".
    pub(crate) fn probe<'a>(
        &'a self,
        definition: &'a ServiceDefinition,
        args: InvocationArgs,
        options: RunOptions,
    ) -> BoxFuture<'a, Result<RunnerStat, RunnerError>> {
        let span = info_span!(
            "link_probe",
            service = definition.name(),
            depth = options.depth,
        );
        Box::pin(
            async move {
                let stages = definition.build()?;
                let mut stat = RunnerStat::new(args);
                self.run_stages(definition.name(), &stages, &mut stat, &options)
                    .await?;
                Ok(stat)
            }
            .instrument(span),
        )
    }

    async fn run_stages(
        &self,
        service: &str,
        stages: &StageTable,
        stat: &mut RunnerStat,
        options: &RunOptions,
    ) -> Result<(), RunnerError> {
        let flags = options.flags;

        if flags.is_enabled(Stage::Validate) {
            self.validate(service, stages, stat)?;
        }
        if flags.is_enabled(Stage::PreProcess) {
            Self::pre_process(stages, stat).await?;
        }
        if flags.is_enabled(Stage::AggregatePolicies) {
            self.aggregate_policies(stat, options).await?;
        }
        if flags.is_enabled(Stage::Authorize) {
            Self::authorize(stages, stat).await?;
        }
        if flags.is_enabled(Stage::ExecuteLogic) {
            self.execute_logic(stages, stat).await?;
        }
        if flags.is_enabled(Stage::ResolveCapabilities) {
            self.resolve_capabilities(stages, stat, options).await?;
        }
        Ok(())
    }

    fn validate(
        &self,
        service: &str,
        stages: &StageTable,
        stat: &mut RunnerStat,
    ) -> Result<(), RunnerError> {
        let Some(schema) = &stages.validator else {
            return Ok(());
        };
        let issues = self
            .validator
            .validate(schema, &stat.args.input)
            .map_err(|source| RunnerError::Schema {
                service: service.to_string(),
                source,
            })?
            .into_issues();
        stat.is_valid = issues.is_empty();
        if !stat.is_valid {
            debug!(issues = issues.len(), "input failed validation");
        }
        stat.validation_errors = issues;
        Ok(())
    }

    async fn pre_process(stages: &StageTable, stat: &mut RunnerStat) -> Result<(), RunnerError> {
        for (key, pre) in &stages.pre {
            if stat.args.input.contains_key(key) {
                continue;
            }
            let value = pre(stat.args.as_ref())
                .await
                .map_err(|source| RunnerError::stage(Stage::PreProcess, source))?;
            Arc::make_mut(&mut stat.args).input.insert(key.clone(), value);
        }
        Ok(())
    }

    async fn aggregate_policies(
        &self,
        stat: &mut RunnerStat,
        options: &RunOptions,
    ) -> Result<(), RunnerError> {
        let module = &options.scope.module;
        for id in &options.policy_extractors {
            let extractor = self.context.policy_extractor(module, id).ok_or_else(|| {
                RunnerError::UnknownPolicyExtractor {
                    id: id.clone(),
                    module: module.clone(),
                }
            })?;
            let granted = extractor
                .extract(&stat.args)
                .await
                .map_err(|source| RunnerError::stage(Stage::AggregatePolicies, source))?;
            if !granted.is_empty() {
                debug!(extractor = %id, granted = ?granted, "policies granted");
                Arc::make_mut(&mut stat.args).policies.extend(granted);
            }
        }
        Ok(())
    }

    async fn authorize(stages: &StageTable, stat: &mut RunnerStat) -> Result<(), RunnerError> {
        let Some(rule) = &stages.rule else {
            return Ok(());
        };
        if !stat.is_valid {
            return Ok(());
        }
        stat.allowed = false;
        let ctx = RuleContext::new(Arc::clone(&stat.args));
        rule(ctx.clone())
            .await
            .map_err(|source| RunnerError::stage(Stage::Authorize, source))?;
        let decision = ctx.decision();
        stat.allowed = decision.allowed;
        stat.denied = decision.denied;
        stat.denials = decision.denials;
        Ok(())
    }

    async fn execute_logic(
        &self,
        stages: &StageTable,
        stat: &mut RunnerStat,
    ) -> Result<(), RunnerError> {
        if !stat.is_valid {
            let message = stat
                .validation_errors
                .first()
                .map_or("Validation failed", |issue| issue.message.as_str());
            stat.result = ServiceResult::error(message, 400);
            return Ok(());
        }
        if !stat.is_rule_satisfied() {
            let code = if stat.args.is_authenticated { 403 } else { 401 };
            debug!(code, denials = ?stat.denials, "rule not satisfied");
            stat.result = ServiceResult::error(
                if code == 403 {
                    response::FORBIDDEN_MESSAGE
                } else {
                    response::UNAUTHORIZED_MESSAGE
                },
                code,
            );
            return Ok(());
        }
        let ctx = LogicContext::new(Arc::clone(&stat.args), self.authority.clone());
        stat.result = (stages.logic)(ctx)
            .await
            .map_err(|source| RunnerError::stage(Stage::ExecuteLogic, source))?;
        Ok(())
    }

    async fn resolve_capabilities(
        &self,
        stages: &StageTable,
        stat: &mut RunnerStat,
        options: &RunOptions,
    ) -> Result<(), RunnerError> {
        let Some(capabilities) = &stages.capabilities else {
            return Ok(());
        };
        if !stat.result.is_success() {
            return Ok(());
        }
        let ctx = CapabilityContext::new(Arc::clone(&stat.args), Arc::new(stat.result.clone()));
        capabilities(ctx.clone())
            .await
            .map_err(|source| RunnerError::stage(Stage::ResolveCapabilities, source))?;
        let attachments = ctx.take_attachments();
        if attachments.is_empty() {
            return Ok(());
        }
        LinkResolver::new(self, options)
            .resolve(&mut stat.result, attachments, &stat.args)
            .await
    }
}

/// Turns a stage failure into an error result, keeping an earlier code override.
fn absorb_fault(stat: &mut RunnerStat, err: &RunnerError) {
    let code = match stat.result.kind {
        ResultKind::Error => stat.result.err_code.unwrap_or(500),
        ResultKind::Success => 500,
    };
    stat.result = ServiceResult::error(err.to_string(), code);
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("has_authority", &self.authority.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
