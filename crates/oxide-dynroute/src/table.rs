//! The route table: per-method partitions of exact and parameterized routes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Result, RouterError};
use crate::handler::{retain_except, Handler, Middleware, Renderer};
use crate::path::{is_parameterized, match_route, normalize_path};
use crate::request::PathParams;

/// A single registered route.
#[derive(Clone)]
pub struct Route {
    /// Uppercase HTTP method.
    pub method: String,
    /// Path pattern as registered.
    pub path: String,
    /// Terminal handler.
    pub handler: Handler,
    /// Route-specific middleware, in execution order.
    pub middlewares: Vec<Middleware>,
    /// Optional renderer used by [`Context::render`](crate::Context::render).
    pub renderer: Option<Arc<dyn Renderer>>,
}

impl Route {
    pub fn new(
        method: impl AsRef<str>,
        path: impl Into<String>,
        handler: Handler,
        middlewares: Vec<Middleware>,
    ) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.into(),
            handler,
            middlewares,
            renderer: None,
        }
    }
}

/// Routes registered for one HTTP method.
#[derive(Default, Clone)]
struct MethodRoutes {
    /// Literal routes keyed by normalized path.
    exact: HashMap<String, Route>,
    /// Parameterized routes, tried in registration order.
    params: Vec<Route>,
}

impl MethodRoutes {
    fn insert(&mut self, route: Route) {
        if is_parameterized(&route.path) {
            match self.params.iter_mut().find(|r| r.path == route.path) {
                Some(existing) => *existing = route,
                None => self.params.push(route),
            }
        } else {
            self.exact.insert(normalize_path(&route.path), route);
        }
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Route> {
        if let Some(route) = self.exact.get_mut(&normalize_path(path)) {
            return Some(route);
        }
        self.params.iter_mut().find(|r| r.path == path)
    }

    fn take(&mut self, path: &str) -> Option<Route> {
        if let Some(route) = self.exact.remove(&normalize_path(path)) {
            return Some(route);
        }
        let pos = self.params.iter().position(|r| r.path == path)?;
        Some(self.params.remove(pos))
    }

    fn find(&self, path: &str) -> Option<(&Route, PathParams)> {
        if let Some(route) = self.exact.get(&normalize_path(path)) {
            return Some((route, PathParams::new()));
        }
        self.params
            .iter()
            .find_map(|r| match_route(&r.path, path).map(|params| (r, params)))
    }

    fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.params.is_empty()
    }
}

/// Per-method partition of every dynamic route.
///
/// Literal paths live in a hash map; paths containing `:` or `*` live in an
/// ordered list matched front to back, so for overlapping patterns the first
/// registered one wins. A route is filed in exactly one of the two.
#[derive(Default, Clone)]
pub struct RouteTable {
    methods: HashMap<String, MethodRoutes>,
}

fn not_found(method: &str, path: &str) -> RouterError {
    RouterError::RouteNotFound {
        method: method.to_string(),
        path: path.to_string(),
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a route; an existing route with the same method and path is
    /// replaced.
    pub fn add(&mut self, route: Route) {
        info!(method = %route.method, path = %route.path, "Added dynamic route");
        self.methods
            .entry(route.method.clone())
            .or_default()
            .insert(route);
    }

    /// Looks up a route by its registered path (not by matching).
    pub fn get_mut(&mut self, method: &str, path: &str) -> Result<&mut Route> {
        let method = method.to_ascii_uppercase();
        match self.methods.get_mut(&method).and_then(|m| m.get_mut(path)) {
            Some(route) => Ok(route),
            None => Err(not_found(&method, path)),
        }
    }

    /// Resolves a concrete request path: exact first, then parameterized.
    pub fn find(&self, method: &str, path: &str) -> Option<(&Route, PathParams)> {
        self.methods.get(method)?.find(path)
    }

    pub fn update_handler(&mut self, method: &str, path: &str, handler: Handler) -> Result<()> {
        match self.get_mut(method, path) {
            Ok(route) => {
                route.handler = handler;
                info!(method = %route.method, path, "Updated dynamic route handler");
                Ok(())
            }
            Err(err) => {
                warn!(method, path, "Route not found for update");
                Err(err)
            }
        }
    }

    /// Moves a route to a new path, refiling it by the new path's shape.
    pub fn rename(&mut self, method: &str, old_path: &str, new_path: &str) -> Result<()> {
        let method = method.to_ascii_uppercase();
        let Some(mut route) = self.take(&method, old_path) else {
            warn!(method = %method, old_path, "Route not found for rename");
            return Err(not_found(&method, old_path));
        };
        route.path = new_path.to_string();
        info!(method = %method, old_path, new_path, "Renamed route");
        self.methods.entry(method).or_default().insert(route);
        Ok(())
    }

    pub fn add_middleware(
        &mut self,
        method: &str,
        path: &str,
        middlewares: &[Middleware],
    ) -> Result<()> {
        match self.get_mut(method, path) {
            Ok(route) => {
                route.middlewares.extend_from_slice(middlewares);
                info!(
                    method = %route.method,
                    path,
                    count = middlewares.len(),
                    "Added middleware to route"
                );
                Ok(())
            }
            Err(err) => {
                warn!(method, path, "Route not found for adding middleware");
                Err(err)
            }
        }
    }

    pub fn remove_middleware(
        &mut self,
        method: &str,
        path: &str,
        middlewares: &[Middleware],
    ) -> Result<()> {
        match self.get_mut(method, path) {
            Ok(route) => {
                retain_except(&mut route.middlewares, middlewares);
                info!(method = %route.method, path, "Removed middleware from route");
                Ok(())
            }
            Err(err) => {
                warn!(method, path, "Route not found for removing middleware");
                Err(err)
            }
        }
    }

    pub fn set_renderer(
        &mut self,
        method: &str,
        path: &str,
        renderer: Arc<dyn Renderer>,
    ) -> Result<()> {
        match self.get_mut(method, path) {
            Ok(route) => {
                route.renderer = Some(renderer);
                info!(method = %route.method, path, "Set custom renderer for route");
                Ok(())
            }
            Err(err) => {
                warn!(method, path, "Route not found for setting renderer");
                Err(err)
            }
        }
    }

    /// Unfiles a route without logging; empty partitions are dropped.
    pub(crate) fn take(&mut self, method: &str, path: &str) -> Option<Route> {
        let method = method.to_ascii_uppercase();
        let partition = self.methods.get_mut(&method)?;
        let route = partition.take(path)?;
        if partition.is_empty() {
            self.methods.remove(&method);
        }
        Some(route)
    }

    /// Removes a route and returns it.
    pub fn remove(&mut self, method: &str, path: &str) -> Result<Route> {
        match self.take(method, path) {
            Some(route) => {
                info!(method = %route.method, path, "Removed dynamic route");
                Ok(route)
            }
            None => {
                warn!(method, path, "Route not found for removal");
                Err(not_found(&method.to_ascii_uppercase(), path))
            }
        }
    }

    /// Returns `"METHOD path"` for every route, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut routes: Vec<String> = self
            .methods
            .iter()
            .flat_map(|(method, partition)| {
                partition
                    .exact
                    .values()
                    .chain(partition.params.iter())
                    .map(move |r| format!("{method} {}", r.path))
            })
            .collect();
        routes.sort();
        routes
    }

    pub fn len(&self) -> usize {
        self.methods
            .values()
            .map(|m| m.exact.len() + m.params.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn clear(&mut self) {
        self.methods.clear();
        info!("Cleared all dynamic routes");
    }
}
