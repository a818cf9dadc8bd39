//! # Handler Registry
//!
//! Maps discovered function names to their loaded handlers. A name whose
//! handler cannot be loaded stays in the table as unresolved so the failure
//! surfaces per request instead of at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use super::descriptor::FunctionDescriptor;
use super::errors::{FunctionError, FunctionResult};
use super::handler::Handler;

/// Loads the handler for a function name
pub trait HandlerResolver: Send + Sync {
    /// `None` when no handler can be loaded for `name`
    fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>>;
}

/// In-process handlers registered by name
#[derive(Default, Clone)]
pub struct StaticResolver {
    handlers: BTreeMap<String, Arc<dyn Handler>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any earlier one with the same name
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Builder form of [`StaticResolver::register`]
    pub fn with<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.register(name, handler);
        self
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl HandlerResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }
}

impl fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticResolver")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Load state of a single function
#[derive(Clone)]
pub enum HandlerSlot {
    Resolved(Arc<dyn Handler>),
    Unresolved,
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerSlot::Resolved(_) => write!(f, "Resolved"),
            HandlerSlot::Unresolved => write!(f, "Unresolved"),
        }
    }
}

/// Immutable table of every discovered function, built once at startup
#[derive(Debug, Default)]
pub struct HandlerTable {
    descriptors: Vec<FunctionDescriptor>,
    slots: BTreeMap<String, HandlerSlot>,
}

impl HandlerTable {
    /// Resolve every name. Names that fail to load are kept as unresolved.
    pub fn build<I, S>(names: I, resolver: &dyn HandlerResolver) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::default();
        for name in names {
            let name = name.as_ref();
            if table.slots.contains_key(name) {
                continue;
            }
            let slot = match resolver.resolve(name) {
                Some(handler) => HandlerSlot::Resolved(handler),
                None => {
                    warn!(
                        event = "handler_unresolved",
                        function = name,
                        "Could not load handler for {}",
                        name
                    );
                    HandlerSlot::Unresolved
                }
            };
            table.descriptors.push(FunctionDescriptor::parse(name));
            table.slots.insert(name.to_string(), slot);
        }
        table
    }

    /// Table holding every handler a [`StaticResolver`] knows about
    pub fn from_static(resolver: &StaticResolver) -> Self {
        Self::build(resolver.names(), resolver)
    }

    /// Handler for `name`, or `HandlerNotFound` if it never loaded
    pub fn resolve(&self, name: &str) -> FunctionResult<Arc<dyn Handler>> {
        match self.slots.get(name) {
            Some(HandlerSlot::Resolved(handler)) => Ok(Arc::clone(handler)),
            _ => Err(FunctionError::HandlerNotFound(name.to_string())),
        }
    }

    pub fn slot(&self, name: &str) -> Option<&HandlerSlot> {
        self.slots.get(name)
    }

    /// Descriptors in discovery order
    pub fn descriptors(&self) -> &[FunctionDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// List function names in `dir`: base names of regular files with the
/// extension stripped, sorted and deduplicated. Sub-directories are ignored.
pub fn discover_function_names(dir: &Path) -> FunctionResult<Vec<String>> {
    let discovery_error = |source: std::io::Error| FunctionError::Discovery {
        path: dir.display().to_string(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(discovery_error)? {
        let entry = entry.map_err(discovery_error)?;
        let file_type = entry.file_type().map_err(discovery_error)?;
        if !file_type.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if stem.is_empty() || stem.starts_with('.') {
            continue;
        }
        names.push(stem.to_string());
    }

    names.sort();
    names.dedup();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::handler::sync_handler_fn;
    use serde_json::json;

    fn resolver() -> StaticResolver {
        StaticResolver::new()
            .with(
                "users_get",
                sync_handler_fn(|_, _, _| Ok(Some(json!({"body": "users"})))),
            )
            .with("notify", sync_handler_fn(|_, _, _| Ok(None)))
    }

    #[test]
    fn test_build_and_resolve() {
        let table = HandlerTable::from_static(&resolver());

        assert_eq!(table.len(), 2);
        assert!(table.resolve("users_get").is_ok());
        assert!(table.resolve("notify").is_ok());
    }

    #[test]
    fn test_unresolved_name_is_deferred() {
        let table = HandlerTable::build(["users_get", "orders_post"], &resolver());

        assert_eq!(table.len(), 2);
        assert!(matches!(table.slot("orders_post"), Some(HandlerSlot::Unresolved)));
        match table.resolve("orders_post") {
            Err(FunctionError::HandlerNotFound(name)) => assert_eq!(name, "orders_post"),
            other => panic!("expected HandlerNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let table = HandlerTable::from_static(&resolver());
        assert!(matches!(
            table.resolve("missing"),
            Err(FunctionError::HandlerNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_names_are_collapsed() {
        let table = HandlerTable::build(["notify", "notify"], &resolver());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_discover_function_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("users_get.js"), "").unwrap();
        fs::write(dir.path().join("notify.ts"), "").unwrap();
        fs::write(dir.path().join("notify.js"), "").unwrap();
        fs::write(dir.path().join("orders_post"), "").unwrap();
        fs::write(dir.path().join(".gitkeep"), "").unwrap();
        fs::create_dir(dir.path().join("shared")).unwrap();

        let names = discover_function_names(dir.path()).unwrap();
        assert_eq!(names, vec!["notify", "orders_post", "users_get"]);
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_function_names(&dir.path().join("lambdas"));
        assert!(matches!(result, Err(FunctionError::Discovery { .. })));
    }

    #[test]
    fn test_discover_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_function_names(dir.path()).unwrap().is_empty());
    }
}
