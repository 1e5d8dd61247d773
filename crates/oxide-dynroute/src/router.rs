//! Main router implementation.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use crate::compress::{compress_response, Level};
use crate::config::{RouterConfig, StaticConfig};
use crate::context::Context;
use crate::error::{Result, RouterError};
use crate::group::Group;
use crate::handler::{retain_except, Handler, Middleware, Renderer};
use crate::request::{PathParams, Request};
use crate::response::Response;
use crate::static_files::{self, StaticCache, StaticRoute};
use crate::table::{Route, RouteTable};

/// Turns a failed dispatch into the response sent to the client.
pub type ErrorHandler = Arc<dyn Fn(&RouterError) -> Response + Send + Sync>;

/// The outcome of resolving a method and path without running anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub method: String,
    /// The registered pattern that matched.
    pub pattern: String,
    pub params: PathParams,
}

/// Shared mutable state, guarded by one lock per router.
pub(crate) struct RouterState {
    pub(crate) table: RouteTable,
    global: Vec<Middleware>,
    statics: Vec<Arc<StaticRoute>>,
    not_found: Option<Handler>,
    error_handler: ErrorHandler,
}

/// What dispatch needs once the lock is released.
enum Resolved {
    Route {
        chain: Vec<Handler>,
        params: PathParams,
        renderer: Option<Arc<dyn Renderer>>,
    },
    Fallback {
        statics: Vec<Arc<StaticRoute>>,
        not_found: Option<Handler>,
    },
}

/// A dynamic HTTP router whose routes and middleware can change while it is
/// serving requests.
///
/// Every mutation takes the exclusive lock; dispatch takes the shared lock
/// only long enough to snapshot the matched chain, so handlers never run
/// under the lock. Mutations on a missing target log a warning and return
/// [`RouterError::RouteNotFound`] without touching the table.
pub struct Router {
    state: RwLock<RouterState>,
    cache: StaticCache,
    config: RouterConfig,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates an empty router with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            state: RwLock::new(RouterState {
                table: RouteTable::new(),
                global: Vec::new(),
                statics: Vec::new(),
                not_found: None,
                error_handler: Arc::new(default_error_handler),
            }),
            cache: StaticCache::new(config.cache_ttl()),
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RouterState> {
        self.state.write()
    }

    /// Registers a route. A route with the same method and path is replaced.
    pub fn add_route(
        &self,
        method: &str,
        path: &str,
        handler: Handler,
        middlewares: Vec<Middleware>,
    ) {
        self.write()
            .table
            .add(Route::new(method, path, handler, middlewares));
    }

    pub fn get(&self, path: &str, handler: Handler) -> &Self {
        self.add_route("GET", path, handler, Vec::new());
        self
    }

    pub fn post(&self, path: &str, handler: Handler) -> &Self {
        self.add_route("POST", path, handler, Vec::new());
        self
    }

    pub fn put(&self, path: &str, handler: Handler) -> &Self {
        self.add_route("PUT", path, handler, Vec::new());
        self
    }

    pub fn patch(&self, path: &str, handler: Handler) -> &Self {
        self.add_route("PATCH", path, handler, Vec::new());
        self
    }

    pub fn delete(&self, path: &str, handler: Handler) -> &Self {
        self.add_route("DELETE", path, handler, Vec::new());
        self
    }

    /// Replaces the handler of a registered route, keeping its middleware.
    pub fn update_route(&self, method: &str, path: &str, handler: Handler) -> Result<()> {
        self.write().table.update_handler(method, path, handler)
    }

    /// Moves a route to a new path.
    pub fn rename_route(&self, method: &str, old_path: &str, new_path: &str) -> Result<()> {
        self.write().table.rename(method, old_path, new_path)
    }

    /// Appends middleware to a registered route.
    pub fn add_middleware(
        &self,
        method: &str,
        path: &str,
        middlewares: &[Middleware],
    ) -> Result<()> {
        self.write().table.add_middleware(method, path, middlewares)
    }

    /// Removes middleware from a route by identity.
    pub fn remove_middleware(
        &self,
        method: &str,
        path: &str,
        middlewares: &[Middleware],
    ) -> Result<()> {
        self.write()
            .table
            .remove_middleware(method, path, middlewares)
    }

    pub fn remove_route(&self, method: &str, path: &str) -> Result<()> {
        self.write().table.remove(method, path).map(|_| ())
    }

    /// Attaches a renderer used by [`Context::render`] on this route.
    pub fn set_renderer(
        &self,
        method: &str,
        path: &str,
        renderer: Arc<dyn Renderer>,
    ) -> Result<()> {
        self.write().table.set_renderer(method, path, renderer)
    }

    pub fn set_not_found_handler(&self, handler: Handler) {
        self.write().not_found = Some(handler);
        info!("Custom not-found handler set");
    }

    /// Replaces the handler [`Router::handle`] uses for failed dispatches.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&RouterError) -> Response + Send + Sync + 'static,
    {
        self.write().error_handler = Arc::new(handler);
    }

    /// Appends global middleware, run before every route's own middleware.
    pub fn use_middleware(&self, middlewares: impl IntoIterator<Item = Middleware>) {
        let mut state = self.write();
        let before = state.global.len();
        state.global.extend(middlewares);
        info!(
            count = state.global.len() - before,
            "Added global middleware"
        );
    }

    /// Removes global middleware by identity.
    pub fn remove_global_middleware(&self, middlewares: &[Middleware]) {
        let mut state = self.write();
        let before = state.global.len();
        retain_except(&mut state.global, middlewares);
        info!(
            count = before - state.global.len(),
            "Removed global middleware"
        );
    }

    /// Creates a route group rooted at `prefix`.
    pub fn group(&self, prefix: &str, middlewares: Vec<Middleware>) -> Group<'_> {
        Group::root(self, prefix, middlewares)
    }

    /// Serves files under `directory` for requests below `prefix`.
    pub fn static_files(
        &self,
        prefix: &str,
        directory: impl Into<std::path::PathBuf>,
        config: StaticConfig,
    ) {
        let route = StaticRoute::new(prefix, directory, config);
        info!(
            prefix = %route.prefix,
            directory = %route.directory.display(),
            "Added static route"
        );
        self.write().statics.push(Arc::new(route));
    }

    /// Returns `"METHOD path"` for every dynamic route.
    pub fn list_routes(&self) -> Vec<String> {
        self.state.read().table.list()
    }

    /// Drops every dynamic route at once.
    pub fn clear_routes(&self) {
        self.write().table.clear();
    }

    /// Resolves a method and path against the table without dispatching.
    pub fn match_route(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let method = method.to_ascii_uppercase();
        let state = self.state.read();
        let (route, params) = state.table.find(&method, path)?;
        Some(RouteMatch {
            method,
            pattern: route.path.clone(),
            params,
        })
    }

    /// Evicts one resolved file path from the static cache.
    pub fn invalidate_static_cache(&self, file: impl AsRef<Path>) -> bool {
        let removed = self.cache.invalidate(file.as_ref());
        info!(file = %file.as_ref().display(), removed, "Invalidated static cache");
        removed
    }

    pub fn clear_static_cache(&self) {
        self.cache.clear();
    }

    fn resolve(&self, method: &str, path: &str) -> Resolved {
        let state = self.state.read();
        match state.table.find(method, path) {
            Some((route, params)) => {
                let mut chain =
                    Vec::with_capacity(state.global.len() + route.middlewares.len() + 1);
                chain.extend(state.global.iter().map(|mw| Arc::clone(mw.handler())));
                chain.extend(route.middlewares.iter().map(|mw| Arc::clone(mw.handler())));
                chain.push(Arc::clone(&route.handler));
                Resolved::Route {
                    chain,
                    params,
                    renderer: route.renderer.clone(),
                }
            }
            None => Resolved::Fallback {
                statics: state.statics.clone(),
                not_found: state.not_found.clone(),
            },
        }
    }

    /// Dispatch entry point for the host server.
    ///
    /// Runs the matched route's chain (global middleware, route middleware,
    /// handler) and compresses the body if the client accepts it. Unmatched
    /// requests fall through to static routes, then to the not-found handler,
    /// then to a plain 404.
    pub async fn dispatch(&self, ctx: &mut Context) -> Result<()> {
        let method = ctx.request.method.as_str();
        match self.resolve(method, &ctx.request.path) {
            Resolved::Route {
                chain,
                params,
                renderer,
            } => {
                ctx.params = params;
                ctx.set_renderer(renderer);
                ctx.set_chain(chain);
                ctx.next()
                    .await
                    .map_err(|err| RouterError::Dispatch(Box::new(err)))?;
                if self.config.compress_responses {
                    compress_response(
                        &mut ctx.response,
                        ctx.request.get_header("Accept-Encoding"),
                        Level::default(),
                        self.config.min_compress_size,
                    );
                }
                Ok(())
            }
            Resolved::Fallback { statics, not_found } => {
                for route in &statics {
                    if let Some(response) =
                        static_files::serve(route, &self.cache, &ctx.request).await
                    {
                        ctx.response = response;
                        return Ok(());
                    }
                }
                if let Some(handler) = not_found {
                    ctx.set_chain(Vec::new());
                    return handler(ctx).await;
                }
                debug!(method, path = %ctx.request.path, "No route matched");
                ctx.response = Response::plain(404, self.config.not_found_message.clone());
                Ok(())
            }
        }
    }

    /// Dispatches a request and converts any error through the error handler.
    pub async fn handle(&self, request: Request) -> Response {
        let mut ctx = Context::new(request);
        match self.dispatch(&mut ctx).await {
            Ok(()) => ctx.response,
            Err(err) => {
                let handler = Arc::clone(&self.state.read().error_handler);
                handler(&err)
            }
        }
    }
}

/// Renders `{"error": ..., "status": ...}` with the error's status code.
pub fn default_error_handler(err: &RouterError) -> Response {
    let status = err.status_code();
    if status >= 500 {
        error!(error = %err, status, "Request failed");
    } else {
        warn!(error = %err, status, "Request rejected");
    }
    Response::json(&serde_json::json!({
        "error": err.root_cause().to_string(),
        "status": status,
    }))
    .status(status)
}
