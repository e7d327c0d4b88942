use async_trait::async_trait;

use crate::context::InvocationArgs;

/// Derives additional granted policies from an invocation before authorization.
///
/// Registered by reference id in the module context and looked up per call.
/// Returning an empty list grants nothing.
#[async_trait]
pub trait PolicyExtractor: Send + Sync {
    /// Policy names to append to the invocation's grants, in order.
    async fn extract(&self, args: &InvocationArgs) -> anyhow::Result<Vec<String>>;
}

/// Extractor that always grants the same fixed policies.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicies(pub Vec<String>);

#[async_trait]
impl PolicyExtractor for StaticPolicies {
    async fn extract(&self, _args: &InvocationArgs) -> anyhow::Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Grants the principal's roles as policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicies;

#[async_trait]
impl PolicyExtractor for RolePolicies {
    async fn extract(&self, args: &InvocationArgs) -> anyhow::Result<Vec<String>> {
        Ok(args
            .user
            .as_ref()
            .map(|user| user.roles.clone())
            .unwrap_or_default())
    }
}
