//! Hypermedia capability declarations.
//!
//! The capabilities callback does not touch the result directly. It appends
//! [`LinkAttachment`]s (which part of the result gets links, and which links)
//! and the [`LinkResolver`](super::links::LinkResolver) processes them after the
//! callback returns.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use waymark_core::{InputMap, InvocationArgs, ServiceResult, Verb};

/// Which part of the result receives a `links` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// The result object itself (`result.links`).
    Result,
    /// A JSON pointer into `result.data`. An array target is expanded item by item.
    Data(String),
}

impl LinkTarget {
    /// `result.data` itself.
    #[must_use]
    pub fn data() -> Self {
        Self::Data(String::new())
    }

    /// A JSON pointer (`/items`, `/page/0`) into `result.data`.
    #[must_use]
    pub fn at(pointer: impl Into<String>) -> Self {
        Self::Data(pointer.into())
    }
}

/// Per-link overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkOptions {
    /// Replaces the registry path.
    pub href: Option<String>,
    /// Replaces the registry verb.
    pub verb: Option<Verb>,
    /// Input used for the reachability probe and for path-parameter substitution.
    pub input: Option<InputMap>,
}

impl LinkOptions {
    #[must_use]
    pub fn with_input(input: InputMap) -> Self {
        Self {
            input: Some(input),
            ..Self::default()
        }
    }
}

/// A request for a link with relation `rel` to the service named `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub rel: String,
    pub target: String,
    pub options: LinkOptions,
}

/// Builds a [`LinkSpec`].
#[must_use]
pub fn create_link(rel: impl Into<String>, target: impl Into<String>, options: LinkOptions) -> LinkSpec {
    LinkSpec {
        rel: rel.into(),
        target: target.into(),
        options,
    }
}

type PerItemFn = dyn Fn(&Value) -> Vec<LinkSpec> + Send + Sync;

/// Link specs for an attachment: a fixed list or a function of each item.
#[derive(Clone)]
pub enum LinkSpecs {
    Fixed(Vec<LinkSpec>),
    PerItem(Arc<PerItemFn>),
}

impl LinkSpecs {
    /// Specs computed from each item.
    pub fn per_item<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Vec<LinkSpec> + Send + Sync + 'static,
    {
        Self::PerItem(Arc::new(f))
    }

    /// The specs for `item`, in declaration order.
    #[must_use]
    pub fn expand(&self, item: &Value) -> Vec<LinkSpec> {
        match self {
            Self::Fixed(specs) => specs.clone(),
            Self::PerItem(f) => f(item),
        }
    }
}

impl From<Vec<LinkSpec>> for LinkSpecs {
    fn from(specs: Vec<LinkSpec>) -> Self {
        Self::Fixed(specs)
    }
}

impl fmt::Debug for LinkSpecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(specs) => f.debug_tuple("Fixed").field(specs).finish(),
            Self::PerItem(_) => f.write_str("PerItem(..)"),
        }
    }
}

/// One `attach_links` call.
#[derive(Debug, Clone)]
pub struct LinkAttachment {
    pub target: LinkTarget,
    pub specs: LinkSpecs,
}

/// Handle given to a service's capabilities callback.
#[derive(Debug, Clone)]
pub struct CapabilityContext {
    args: Arc<InvocationArgs>,
    result: Arc<ServiceResult>,
    attachments: Arc<Mutex<Vec<LinkAttachment>>>,
}

impl CapabilityContext {
    #[must_use]
    pub fn new(args: Arc<InvocationArgs>, result: Arc<ServiceResult>) -> Self {
        Self {
            args,
            result,
            attachments: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn args(&self) -> &InvocationArgs {
        &self.args
    }

    /// The success result produced by the logic stage.
    #[must_use]
    pub fn result(&self) -> &ServiceResult {
        &self.result
    }

    /// Requests links for `target`.
    pub fn attach_links(&self, target: LinkTarget, specs: impl Into<LinkSpecs>) {
        self.attachments.lock().push(LinkAttachment {
            target,
            specs: specs.into(),
        });
    }

    /// Same as the free function [`create_link`].
    #[must_use]
    pub fn create_link(
        &self,
        rel: impl Into<String>,
        target: impl Into<String>,
        options: LinkOptions,
    ) -> LinkSpec {
        create_link(rel, target, options)
    }

    /// Attachments in the order they were declared.
    #[must_use]
    pub fn take_attachments(&self) -> Vec<LinkAttachment> {
        std::mem::take(&mut *self.attachments.lock())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn attachments_keep_declaration_order() {
        let ctx = CapabilityContext::new(
            Arc::new(InvocationArgs::default()),
            Arc::new(ServiceResult::default()),
        );
        ctx.attach_links(
            LinkTarget::Result,
            vec![ctx.create_link("self", "get_user", LinkOptions::default())],
        );
        ctx.attach_links(LinkTarget::at("/items"), LinkSpecs::per_item(|_| Vec::new()));

        let attachments = ctx.take_attachments();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].target, LinkTarget::Result);
        assert_eq!(attachments[1].target, LinkTarget::Data("/items".into()));
        assert!(ctx.take_attachments().is_empty());
    }

    #[test]
    fn per_item_specs_see_the_item() {
        let specs = LinkSpecs::per_item(|item| {
            let mut input = InputMap::new();
            input.insert("id".into(), item["id"].clone());
            vec![create_link("self", "get_user", LinkOptions::with_input(input))]
        });
        let expanded = specs.expand(&json!({"id": 7}));
        assert_eq!(expanded.len(), 1);
        assert_eq!(
            expanded[0].options.input.as_ref().and_then(|i| i.get("id")),
            Some(&json!(7))
        );
    }

    #[test]
    fn fixed_specs_ignore_the_item() {
        let specs: LinkSpecs = vec![create_link("list", "list_users", LinkOptions::default())].into();
        assert_eq!(specs.expand(&Value::Null)[0].rel, "list");
        assert_eq!(LinkTarget::data(), LinkTarget::Data(String::new()));
    }
}
