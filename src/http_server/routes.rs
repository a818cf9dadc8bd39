//! # Route Table
//!
//! Compiled from the function descriptors once at startup. Each path can
//! carry any number of methods, including tokens that are not standard
//! HTTP verbs, so methods are keyed by their upper-cased name.

use std::collections::BTreeMap;

use matchit::Router;
use percent_encoding::percent_decode_str;

use crate::functions::{FunctionDescriptor, FunctionError, FunctionResult};

/// Method of the synthesized CORS preflight route
pub const PREFLIGHT_METHOD: &str = "OPTIONS";

/// What a route dispatches to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Response is the handler's result
    Sync(FunctionDescriptor),
    /// Immediate 202, handler runs detached
    Async(FunctionDescriptor),
    /// CORS preflight answered by the server itself
    Preflight,
}

/// A registered route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub target: RouteTarget,
}

impl RouteEntry {
    /// `METHOD - path`, as shown in listings
    pub fn label(&self) -> String {
        format!("{} - {}", self.method, self.path)
    }
}

/// Outcome of matching a request to the table
#[derive(Debug, Clone)]
pub enum RouteMatch<'a> {
    /// No route for this method and path
    NotFound,
    /// Path and method matched a route
    Matched {
        entry: &'a RouteEntry,
        path_parameters: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, Default)]
struct PathRoutes {
    /// Method name to index into the entry list
    by_method: BTreeMap<String, usize>,
}

/// Compiled route matcher
#[derive(Debug, Clone)]
pub struct RouteTable {
    router: Router<PathRoutes>,
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compile routes for every descriptor under `/{stage}/`.
    ///
    /// Every path with at least one sync route also gets an `OPTIONS`
    /// preflight route. Two routes with the same method and path, or a path
    /// the matcher rejects, fail the whole build.
    pub fn build(descriptors: &[FunctionDescriptor], stage: &str) -> FunctionResult<Self> {
        let mut by_path: BTreeMap<String, PathRoutes> = BTreeMap::new();
        let mut entries: Vec<RouteEntry> = Vec::new();

        for descriptor in descriptors {
            let path = descriptor.route_path(stage);
            let method = descriptor.route_method().to_string();
            let target = if descriptor.is_async() {
                RouteTarget::Async(descriptor.clone())
            } else {
                RouteTarget::Sync(descriptor.clone())
            };
            add_route(&mut by_path, &mut entries, method, path, target)?;
        }

        let preflight_paths: Vec<String> = by_path
            .iter()
            .filter(|(_, routes)| {
                routes
                    .by_method
                    .values()
                    .any(|&index| matches!(entries[index].target, RouteTarget::Sync(_)))
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in preflight_paths {
            add_route(
                &mut by_path,
                &mut entries,
                PREFLIGHT_METHOD.to_string(),
                path,
                RouteTarget::Preflight,
            )?;
        }

        let mut router = Router::new();
        for (path, routes) in by_path {
            router
                .insert(path.clone(), routes)
                .map_err(|e| FunctionError::InvalidRoute {
                    path,
                    reason: e.to_string(),
                })?;
        }

        Ok(Self { router, entries })
    }

    /// Match a `(method, path)` pair. `HEAD` falls back to a `GET` route
    /// when the path has no `HEAD` route of its own.
    pub fn match_request(&self, method: &str, path: &str) -> RouteMatch<'_> {
        let Ok(matched) = self.router.at(path) else {
            return RouteMatch::NotFound;
        };

        let method = method.to_uppercase();
        let index = matched.value.by_method.get(&method).or_else(|| {
            if method == "HEAD" {
                matched.value.by_method.get("GET")
            } else {
                None
            }
        });
        let Some(&index) = index else {
            return RouteMatch::NotFound;
        };

        let path_parameters = matched
            .params
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    percent_decode_str(value).decode_utf8_lossy().into_owned(),
                )
            })
            .collect();

        RouteMatch::Matched {
            entry: &self.entries[index],
            path_parameters,
        }
    }

    /// Every route in registration order
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Route labels sorted by path, then method
    pub fn listing(&self) -> Vec<String> {
        let mut entries: Vec<&RouteEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));
        entries.into_iter().map(RouteEntry::label).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn add_route(
    by_path: &mut BTreeMap<String, PathRoutes>,
    entries: &mut Vec<RouteEntry>,
    method: String,
    path: String,
    target: RouteTarget,
) -> FunctionResult<()> {
    let routes = by_path.entry(path.clone()).or_default();
    if routes.by_method.contains_key(&method) {
        return Err(FunctionError::RouteConflict { method, path });
    }
    routes.by_method.insert(method.clone(), entries.len());
    entries.push(RouteEntry {
        method,
        path,
        target,
    });
    Ok(())
}
