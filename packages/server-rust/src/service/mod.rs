//! Service execution framework.
//!
//! This module implements the service pipeline:
//!
//! 1. **Definitions** (`definition`): named bundles of stage callbacks built through `ServiceBuilder`
//! 2. **Registry** (`registry`): definitions and their routes by name, alias and module
//! 3. **Runner** (`runner`): the staged state machine that executes one definition
//! 4. **Links** (`links`): reachability probes that turn capability declarations into hypermedia links
//! 5. **Routing** (`router`): `tower::Service<ServiceCall>` resolving calls against the registry
//! 6. **Middleware** (`middleware`): Tower layers (timeout, metrics) around the router

pub mod capabilities;
pub mod config;
pub mod context;
pub mod definition;
pub mod links;
pub mod logic;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod response;
pub mod router;
pub mod rule;
pub mod runner;

// Re-export key types for convenient access.
pub use capabilities::{
    create_link, CapabilityContext, LinkAttachment, LinkOptions, LinkSpec, LinkSpecs, LinkTarget,
};
pub use config::RunnerConfig;
pub use context::{ModuleContext, POLICY_EXTRACTOR_GROUP};
pub use definition::{ServiceBuilder, ServiceDefinition, StageTable};
pub use links::LinkResolver;
pub use logic::LogicContext;
pub use middleware::build_service_pipeline;
pub use operation::{RunnerError, ServiceCall};
pub use registry::{RouteEntry, ServiceRegistry, ServiceRoute};
pub use router::{ServiceFuture, ServiceRouter};
pub use rule::{RuleContext, RuleDecision};
pub use runner::{RunOptions, Runner, Stage, StageFlags};
