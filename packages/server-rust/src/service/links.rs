//! Hypermedia link resolution.
//!
//! For each requested link the resolver looks up the target's route, runs a
//! reachability probe against the target definition (validation and
//! authorization only) and emits a [`HypermediaLink`] when the caller would be
//! allowed through. A probe that fails validation never reaches the rule, so
//! its link is withheld as well. Links are emitted in declaration order; array targets are
//! processed item by item.

use serde_json::Value;
use tracing::debug;
use waymark_core::{path, AliasMode, HypermediaLink, InvocationArgs, ServiceResult};

use super::capabilities::{LinkAttachment, LinkSpec, LinkSpecs, LinkTarget};
use super::operation::RunnerError;
use super::runner::{RunOptions, Runner, StageFlags};

/// Resolves the attachments declared by one capabilities callback.
pub struct LinkResolver<'a> {
    runner: &'a Runner,
    options: &'a RunOptions,
}

impl<'a> LinkResolver<'a> {
    /// A resolver probing in the scope and at the depth of `options`.
    #[must_use]
    pub fn new(runner: &'a Runner, options: &'a RunOptions) -> Self {
        Self { runner, options }
    }

    /// Writes a `links` array onto every attachment target of `result`.
    ///
    /// # Errors
    ///
    /// Fails when a target pointer does not resolve, a link target is not
    /// registered, a probe cannot reach a verdict, or path substitution fails.
    pub async fn resolve(
        &self,
        result: &mut ServiceResult,
        attachments: Vec<LinkAttachment>,
        args: &InvocationArgs,
    ) -> Result<(), RunnerError> {
        for attachment in attachments {
            match &attachment.target {
                LinkTarget::Result => {
                    let item = serde_json::to_value(&*result).unwrap_or(Value::Null);
                    let links = self.links_for(&attachment.specs, &item, args).await?;
                    result.links = Some(links);
                }
                LinkTarget::Data(pointer) => {
                    self.resolve_data(result, pointer, &attachment.specs, args)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn resolve_data(
        &self,
        result: &mut ServiceResult,
        pointer: &str,
        specs: &LinkSpecs,
        args: &InvocationArgs,
    ) -> Result<(), RunnerError> {
        let missing = || RunnerError::LinkTarget {
            pointer: pointer.to_string(),
        };
        let target = result
            .data
            .as_ref()
            .and_then(|data| data.pointer(pointer))
            .ok_or_else(missing)?;

        let items: Vec<Value> = match target {
            Value::Array(items) => items.clone(),
            Value::Object(_) => vec![target.clone()],
            _ => return Err(missing()),
        };
        if items.iter().any(|item| !item.is_object()) {
            return Err(missing());
        }

        let mut resolved = Vec::with_capacity(items.len());
        for item in &items {
            resolved.push(self.links_for(specs, item, args).await?);
        }

        let target = result
            .data
            .as_mut()
            .and_then(|data| data.pointer_mut(pointer))
            .ok_or_else(missing)?;
        match target {
            Value::Array(items) => {
                for (item, links) in items.iter_mut().zip(resolved) {
                    set_links(item, links);
                }
            }
            item => {
                if let Some(links) = resolved.pop() {
                    set_links(item, links);
                }
            }
        }
        Ok(())
    }

    async fn links_for(
        &self,
        specs: &LinkSpecs,
        item: &Value,
        args: &InvocationArgs,
    ) -> Result<Vec<HypermediaLink>, RunnerError> {
        let mut links = Vec::new();
        for spec in specs.expand(item) {
            if let Some(link) = self.link(&spec, args).await? {
                links.push(link);
            }
        }
        Ok(links)
    }

    /// Probes one target; `None` when the caller would be turned away.
    async fn link(
        &self,
        spec: &LinkSpec,
        args: &InvocationArgs,
    ) -> Result<Option<HypermediaLink>, RunnerError> {
        let scope = &self.options.scope;
        let registry = self.runner.registry();
        let unresolved = |reason: String| RunnerError::LinkResolution {
            target: spec.target.clone(),
            reason,
        };

        let route = registry
            .route(&spec.target, scope.alias, &scope.module)
            .ok_or_else(|| {
                unresolved(format!(
                    "no {} route in module `{}`",
                    scope.alias, scope.module
                ))
            })?;
        let definition = registry
            .definition(&spec.target, &route.module)
            .ok_or_else(|| unresolved("route has no registered definition".to_string()))?;

        let depth = self.options.depth + 1;
        let limit = self.runner.config().max_link_depth;
        if depth > limit {
            return Err(RunnerError::LinkDepthExceeded { depth, limit });
        }

        let probe_options = RunOptions {
            flags: StageFlags::probe(),
            policy_extractors: Vec::new(),
            scope: scope.clone(),
            depth,
        };
        let stat = self
            .runner
            .probe(&definition, args.probe(spec.options.input.clone()), probe_options)
            .await
            .map_err(|err| match err {
                exceeded @ RunnerError::LinkDepthExceeded { .. } => exceeded,
                other => unresolved(other.to_string()),
            })?;

        if !stat.is_valid {
            debug!(rel = %spec.rel, target = %spec.target, "link withheld: input rejected");
            return Ok(None);
        }
        if !stat.is_rule_satisfied() {
            debug!(rel = %spec.rel, target = %spec.target, "link withheld");
            return Ok(None);
        }

        let mut href = spec.options.href.clone().unwrap_or(route.path);
        let verb = spec.options.verb.unwrap_or(route.verb);
        let mut input = None;
        if let Some(given) = &spec.options.input {
            href = path::compile(&href, given).map_err(|err| unresolved(err.to_string()))?;
            if scope.alias == AliasMode::Service {
                input = Some(given.clone());
            }
        }

        Ok(Some(HypermediaLink {
            rel: spec.rel.clone(),
            href,
            verb,
            input,
        }))
    }
}

fn set_links(item: &mut Value, links: Vec<HypermediaLink>) {
    if let Value::Object(map) = item {
        map.insert(
            "links".to_string(),
            serde_json::to_value(links).unwrap_or(Value::Array(Vec::new())),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
