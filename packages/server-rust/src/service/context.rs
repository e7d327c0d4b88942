//! Module-scoped key/value context store.
//!
//! Values live under `(module, group, id)` and are type-erased; lookups downcast
//! to the requested type. Policy extractors are kept in the
//! [`POLICY_EXTRACTOR_GROUP`] group. Written at startup, read during traffic.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use waymark_core::{PolicyExtractor, DEFAULT_MODULE};

/// Group holding [`PolicyExtractor`]s by reference id.
pub const POLICY_EXTRACTOR_GROUP: &str = "policy_extractor";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContextKey {
    module: String,
    group: String,
    id: String,
}

impl ContextKey {
    fn new(module: &str, group: &str, id: &str) -> Self {
        Self {
            module: module.to_string(),
            group: group.to_string(),
            id: id.to_string(),
        }
    }
}

/// Type-erased slot wrapper so trait objects can be stored and downcast.
struct ExtractorSlot(Arc<dyn PolicyExtractor>);

/// Key/value store shared by all modules of a process.
#[derive(Default)]
pub struct ModuleContext {
    values: DashMap<ContextKey, Arc<dyn Any + Send + Sync>>,
}

impl ModuleContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `(module, group, id)`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, module: &str, group: &str, id: &str, value: T) {
        self.values
            .insert(ContextKey::new(module, group, id), Arc::new(value));
    }

    /// Retrieves the value under `(module, group, id)` if it has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, module: &str, group: &str, id: &str) -> Option<Arc<T>> {
        self.values
            .get(&ContextKey::new(module, group, id))
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    /// Like [`get`](Self::get), falling back to the default module.
    pub fn resolve<T: Any + Send + Sync>(&self, module: &str, group: &str, id: &str) -> Option<Arc<T>> {
        self.get(module, group, id).or_else(|| {
            (module != DEFAULT_MODULE)
                .then(|| self.get(DEFAULT_MODULE, group, id))
                .flatten()
        })
    }

    /// Registers a policy extractor under reference id `id`.
    pub fn register_policy_extractor<E>(&self, module: &str, id: &str, extractor: E)
    where
        E: PolicyExtractor + 'static,
    {
        self.set(
            module,
            POLICY_EXTRACTOR_GROUP,
            id,
            ExtractorSlot(Arc::new(extractor)),
        );
    }

    /// Looks up a policy extractor for an invocation in `module`.
    pub fn policy_extractor(&self, module: &str, id: &str) -> Option<Arc<dyn PolicyExtractor>> {
        self.resolve::<ExtractorSlot>(module, POLICY_EXTRACTOR_GROUP, id)
            .map(|slot| Arc::clone(&slot.0))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
