use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::ResolutionCache;
use super::types::QualifiedName;

/// Class-path / symbol-table search. Must be a pure function of `name`.
pub trait NameLookup: Send + Sync {
    fn resolve_name(&self, name: &str) -> Option<QualifiedName>;
}

impl<F> NameLookup for F
where
    F: Fn(&str) -> Option<QualifiedName> + Send + Sync,
{
    fn resolve_name(&self, name: &str) -> Option<QualifiedName> {
        self(name)
    }
}

/// Packages whose members resolve by simple name without an import.
const IMPLICIT_PACKAGES: &[&str] = &["java.lang"];

const JDK_DEFAULTS: &[&str] = &[
    "java.lang.Object",
    "java.lang.String",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Float",
    "java.lang.Double",
    "java.lang.Boolean",
    "java.lang.Character",
    "java.lang.Math",
    "java.lang.System",
    "java.lang.Runnable",
    "java.lang.Thread",
    "java.lang.StringBuilder",
    "java.lang.Exception",
    "java.lang.RuntimeException",
    "java.lang.IllegalStateException",
    "java.lang.IllegalArgumentException",
    "java.lang.UnsupportedOperationException",
    "java.util.List",
    "java.util.ArrayList",
    "java.util.Map",
    "java.util.HashMap",
    "java.util.Set",
    "java.util.HashSet",
    "java.util.Optional",
    "java.util.Objects",
    "java.util.UUID",
    "java.util.function.Function",
    "java.util.function.Supplier",
    "java.util.function.Consumer",
    "java.util.function.BiFunction",
    "java.util.function.BiConsumer",
    "java.time.Instant",
    "java.time.Duration",
];

/// In-memory class path: a set of known fully-qualified names.
#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    classes: BTreeSet<String>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class path pre-populated with commonly used JDK types.
    pub fn with_jdk_defaults() -> Self {
        let mut cp = Self::new();
        cp.extend(JDK_DEFAULTS.iter().copied());
        cp
    }

    pub fn insert(&mut self, qualified: impl Into<String>) {
        self.classes.insert(qualified.into());
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for n in names {
            self.insert(n);
        }
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.classes.contains(qualified)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl NameLookup for ClassPath {
    fn resolve_name(&self, name: &str) -> Option<QualifiedName> {
        if self.classes.contains(name) {
            return Some(QualifiedName::new(name));
        }
        if name.contains('.') {
            return None;
        }
        IMPLICIT_PACKAGES
            .iter()
            .map(|pkg| format!("{pkg}.{name}"))
            .find(|candidate| self.classes.contains(candidate))
            .map(QualifiedName::new)
    }
}

/// Cache-backed front for a [`NameLookup`]. Clones share the same cache.
///
/// Negative results are cached too, so repeated misses for the same name
/// cost one lookup per cache lifetime.
#[derive(Clone)]
pub struct TypeResolver {
    cache: Arc<ResolutionCache<String, Option<QualifiedName>>>,
    lookup: Arc<dyn NameLookup>,
}

impl TypeResolver {
    pub fn new(lookup: Arc<dyn NameLookup>, capacity: usize) -> Self {
        Self { cache: Arc::new(ResolutionCache::new(capacity)), lookup }
    }

    pub fn with_cache(lookup: Arc<dyn NameLookup>, cache: Arc<ResolutionCache<String, Option<QualifiedName>>>) -> Self {
        Self { cache, lookup }
    }

    /// Resolve a simple or qualified name. Missing names are `None`, never an error.
    pub fn resolve(&self, name: &str) -> Option<QualifiedName> {
        self.cache.get_or_compute(name.to_string(), || {
            let found = self.lookup.resolve_name(name);
            tracing::trace!(lookup = name, found = ?found, "class path lookup");
            found
        })
    }

    pub fn cache(&self) -> &ResolutionCache<String, Option<QualifiedName>> {
        &self.cache
    }
}

impl std::fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeResolver").field("cache", &self.cache.stats()).finish_non_exhaustive()
    }
}
