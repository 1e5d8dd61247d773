//! Route groups.
//!
//! A group is a registration-time view over a [`Router`]: it prepends its
//! accumulated prefix to every child path and its accumulated middleware to
//! every child chain, then files the flattened route in the router's table.
//! Changing a group's prefix or middleware re-files every route of the group
//! and of all its sub-groups while holding the table's exclusive lock, so a
//! concurrent request sees either the old or the new layout, never a mix.
//!
//! Lock order is always the router's table lock first, then group nodes from
//! parent to child.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::StaticConfig;
use crate::error::{Result, RouterError};
use crate::handler::{retain_except, Handler, Middleware};
use crate::router::Router;
use crate::table::{Route, RouteTable};

/// A route registered through a group.
#[derive(Clone)]
pub struct GroupRoute {
    pub method: String,
    /// Path relative to the group prefix.
    pub rel_path: String,
    /// Prefix plus relative path, as filed in the table.
    pub effective_path: String,
    middlewares: Vec<Middleware>,
}

struct GroupNode {
    /// Prefix accumulated from ancestor groups.
    base_prefix: String,
    /// Middleware accumulated from ancestor groups.
    base_middlewares: Vec<Middleware>,
    prefix: String,
    middlewares: Vec<Middleware>,
    routes: Vec<GroupRoute>,
    children: Vec<Arc<Mutex<GroupNode>>>,
}

impl GroupNode {
    fn full_prefix(&self) -> String {
        format!("{}{}", self.base_prefix, self.prefix)
    }

    fn full_middlewares(&self) -> Vec<Middleware> {
        let mut all = self.base_middlewares.clone();
        all.extend_from_slice(&self.middlewares);
        all
    }

    /// Re-derives every route of this node and its descendants and refiles
    /// them in `table`.
    ///
    /// Every affected route is unfiled before any is filed again, so a new
    /// path that equals a sibling's old path cannot clobber the sibling.
    fn cascade(&mut self, table: &mut RouteTable) {
        let mut moved = Vec::new();
        self.detach(table, &mut moved);
        for route in moved {
            table.add(route);
        }
    }

    /// Unfiles this node's routes and those of its descendants, rewriting
    /// each one's path and middleware into `moved`.
    ///
    /// The filed route keeps its current handler and renderer, so updates
    /// made through the router survive. A route the router no longer holds
    /// under its group path was removed or renamed there; the group forgets
    /// it.
    fn detach(&mut self, table: &mut RouteTable, moved: &mut Vec<Route>) {
        let prefix = self.full_prefix();
        let middlewares = self.full_middlewares();
        self.routes.retain_mut(|route| {
            let Some(mut filed) = table.take(&route.method, &route.effective_path) else {
                warn!(
                    method = %route.method,
                    path = %route.effective_path,
                    "Group route no longer registered, dropping it"
                );
                return false;
            };
            let effective_path = format!("{prefix}{}", route.rel_path);
            let mut chain = middlewares.clone();
            chain.extend_from_slice(&route.middlewares);
            filed.path.clone_from(&effective_path);
            filed.middlewares = chain;
            route.effective_path = effective_path;
            moved.push(filed);
            true
        });
        for child in &self.children {
            let mut child = child.lock();
            child.base_prefix.clone_from(&prefix);
            child.base_middlewares.clone_from(&middlewares);
            child.detach(table, moved);
        }
    }
}

/// A handle on a group of routes sharing a prefix and middleware.
///
/// Handles are cheap to clone; clones refer to the same group.
#[derive(Clone)]
pub struct Group<'r> {
    router: &'r Router,
    node: Arc<Mutex<GroupNode>>,
}

impl<'r> Group<'r> {
    pub(crate) fn root(router: &'r Router, prefix: &str, middlewares: Vec<Middleware>) -> Self {
        Self {
            router,
            node: Arc::new(Mutex::new(GroupNode {
                base_prefix: String::new(),
                base_middlewares: Vec::new(),
                prefix: prefix.to_string(),
                middlewares,
                routes: Vec::new(),
                children: Vec::new(),
            })),
        }
    }

    /// Creates a sub-group nested under this one.
    ///
    /// The sub-group inherits this group's prefix and middleware, and keeps
    /// following them when they change.
    #[must_use]
    pub fn group(&self, prefix: &str, middlewares: Vec<Middleware>) -> Self {
        let mut parent = self.node.lock();
        let child = Arc::new(Mutex::new(GroupNode {
            base_prefix: parent.full_prefix(),
            base_middlewares: parent.full_middlewares(),
            prefix: prefix.to_string(),
            middlewares,
            routes: Vec::new(),
            children: Vec::new(),
        }));
        parent.children.push(Arc::clone(&child));
        Self {
            router: self.router,
            node: child,
        }
    }

    /// Full prefix of this group, including ancestors.
    pub fn prefix(&self) -> String {
        self.node.lock().full_prefix()
    }

    /// `"METHOD effective_path"` for each route registered on this group.
    pub fn routes(&self) -> Vec<String> {
        self.node
            .lock()
            .routes
            .iter()
            .map(|r| format!("{} {}", r.method, r.effective_path))
            .collect()
    }

    /// Registers a route under this group.
    pub fn add_route(
        &self,
        method: &str,
        rel_path: &str,
        handler: Handler,
        middlewares: Vec<Middleware>,
    ) {
        let mut state = self.router.write();
        let mut node = self.node.lock();
        let method = method.to_ascii_uppercase();
        let effective_path = format!("{}{rel_path}", node.full_prefix());

        let mut chain = node.full_middlewares();
        chain.extend_from_slice(&middlewares);
        state
            .table
            .add(Route::new(&method, &effective_path, handler, chain));

        let route = GroupRoute {
            method,
            rel_path: rel_path.to_string(),
            effective_path,
            middlewares,
        };
        match node
            .routes
            .iter_mut()
            .find(|r| r.method == route.method && r.rel_path == route.rel_path)
        {
            Some(existing) => *existing = route,
            None => node.routes.push(route),
        }
    }

    pub fn get(&self, rel_path: &str, handler: Handler, middlewares: Vec<Middleware>) {
        self.add_route("GET", rel_path, handler, middlewares);
    }

    pub fn post(&self, rel_path: &str, handler: Handler, middlewares: Vec<Middleware>) {
        self.add_route("POST", rel_path, handler, middlewares);
    }

    pub fn put(&self, rel_path: &str, handler: Handler, middlewares: Vec<Middleware>) {
        self.add_route("PUT", rel_path, handler, middlewares);
    }

    pub fn delete(&self, rel_path: &str, handler: Handler, middlewares: Vec<Middleware>) {
        self.add_route("DELETE", rel_path, handler, middlewares);
    }

    pub fn patch(&self, rel_path: &str, handler: Handler, middlewares: Vec<Middleware>) {
        self.add_route("PATCH", rel_path, handler, middlewares);
    }

    pub fn options(&self, rel_path: &str, handler: Handler, middlewares: Vec<Middleware>) {
        self.add_route("OPTIONS", rel_path, handler, middlewares);
    }

    pub fn head(&self, rel_path: &str, handler: Handler, middlewares: Vec<Middleware>) {
        self.add_route("HEAD", rel_path, handler, middlewares);
    }

    /// Registers a static route below this group's prefix.
    ///
    /// The prefix is resolved once; later prefix changes do not move it.
    pub fn static_files(
        &self,
        prefix: &str,
        directory: impl Into<std::path::PathBuf>,
        config: StaticConfig,
    ) {
        let full = format!("{}{prefix}", self.prefix());
        self.router.static_files(&full, directory, config);
    }

    /// Renames this group's own prefix segment and moves every route below
    /// it, including those of sub-groups.
    pub fn change_prefix(&self, new_prefix: &str) {
        let mut state = self.router.write();
        let mut node = self.node.lock();
        if node.prefix == new_prefix {
            return;
        }
        let old_prefix = std::mem::replace(&mut node.prefix, new_prefix.to_string());
        node.cascade(&mut state.table);
        info!(old_prefix = %old_prefix, new_prefix, "Group prefix changed");
    }

    /// Replaces this group's own middleware and re-registers every route
    /// below it with the new flattened chain.
    pub fn update_middlewares(&self, middlewares: Vec<Middleware>) {
        self.rewrite_middlewares(|current| *current = middlewares);
    }

    /// Appends middleware to this group.
    pub fn add_middleware(&self, middlewares: &[Middleware]) {
        self.rewrite_middlewares(|current| current.extend_from_slice(middlewares));
    }

    /// Removes middleware from this group by identity.
    pub fn remove_middleware(&self, middlewares: &[Middleware]) {
        self.rewrite_middlewares(|current| retain_except(current, middlewares));
    }

    fn rewrite_middlewares(&self, edit: impl FnOnce(&mut Vec<Middleware>)) {
        let mut state = self.router.write();
        let mut node = self.node.lock();
        edit(&mut node.middlewares);
        node.cascade(&mut state.table);
        info!(prefix = %node.full_prefix(), "Group middlewares updated");
    }

    /// Removes every route registered on this group under `rel_path`,
    /// whatever its method.
    pub fn remove_route(&self, rel_path: &str) -> Result<()> {
        let mut state = self.router.write();
        let mut node = self.node.lock();
        let before = node.routes.len();
        let mut removed = Vec::new();
        node.routes.retain(|r| {
            let hit = r.rel_path == rel_path;
            if hit {
                removed.push((r.method.clone(), r.effective_path.clone()));
            }
            !hit
        });
        if node.routes.len() == before {
            warn!(rel_path, "Group route not found for removal");
            return Err(RouterError::GroupRouteNotFound {
                rel_path: rel_path.to_string(),
            });
        }
        for (method, path) in removed {
            // The router may already have dropped it; the group still forgets it.
            let _ = state.table.remove(&method, &path);
            info!(method = %method, rel_path, "Removed group route");
        }
        Ok(())
    }
}
