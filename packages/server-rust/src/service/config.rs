use waymark_core::DEFAULT_MODULE;

/// Runner-level configuration.
///
/// Controls the default module for unscoped calls, the bound on recursive link
/// probes, and the per-call timeout applied by the service pipeline.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Module used when a call or registration names none.
    pub default_module: String,
    /// Maximum nesting depth of link-reachability probes.
    pub max_link_depth: usize,
    /// Default timeout for a service call in milliseconds.
    pub default_call_timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_module: DEFAULT_MODULE.to_string(),
            max_link_depth: 8,
            default_call_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_config_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.default_module, "default");
        assert_eq!(config.max_link_depth, 8);
        assert_eq!(config.default_call_timeout_ms, 30_000);
    }
}
