//! # oxide-dynroute
//!
//! An HTTP router whose routes can be changed while requests are in flight.
//!
//! This crate provides:
//! - Path patterns with `:name` parameters and `*name` wildcards
//! - A per-method route table guarded by a single reader/writer lock
//! - Ordered middleware chains with identity-based removal
//! - Route groups whose prefix and middleware can change at runtime
//! - Static file routes with caching, byte ranges and directory listings
//! - Gzip and Brotli response compression
//! - Bundled middleware: request ids, access logs, health checks, early-data guard
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_dynroute::{handler, Context, Request, Router};
//!
//! let router = Router::new();
//! router.get("/hello", handler(|ctx| Box::pin(async move {
//!     ctx.text("Hello, World!");
//!     Ok(())
//! })));
//!
//! let response = router.handle(Request::get("/hello")).await;
//! assert_eq!(response.status, 200);
//!
//! // Routes can be swapped while the router is serving.
//! router.rename_route("GET", "/hello", "/hi")?;
//! ```
//!
//! ## Path Parameters
//!
//! ```
//! use oxide_dynroute::match_route;
//!
//! let params = match_route("/users/:id/files/*path", "/users/42/files/a/b.txt").unwrap();
//! assert_eq!(params.get("id"), Some("42"));
//! assert_eq!(params.get("path"), Some("a/b.txt"));
//! ```
//!
//! ## Middleware
//!
//! Middleware is a handler that calls [`Context::next`] to continue:
//!
//! ```ignore
//! use oxide_dynroute::{request_id, Middleware};
//!
//! let timing = Middleware::new(|ctx| Box::pin(async move {
//!     ctx.next().await?;
//!     ctx.set_header("X-Served-By", "oxide");
//!     Ok(())
//! }));
//! router.use_middleware([request_id("X-Request-ID"), timing.clone()]);
//!
//! // Later: remove it by identity.
//! router.remove_global_middleware(&[timing]);
//! ```
//!
//! ## Route Groups
//!
//! ```ignore
//! let api = router.group("/api", vec![auth.clone()]);
//! let users = api.group("/users", Vec::new());
//! users.get("/:id", handler(get_user), Vec::new());
//!
//! // Every route below `api` moves to /v2/...
//! api.change_prefix("/v2");
//! ```

mod compress;
mod config;
mod context;
mod error;
mod group;
mod handler;
mod middleware;
mod path;
mod request;
mod response;
mod router;
mod static_files;
mod table;

pub use compress::{compress, compress_response, negotiate, Encoding, Level};
pub use config::{RouterConfig, StaticConfig};
pub use context::Context;
pub use error::{BoxError, Result, RouterError};
pub use group::{Group, GroupRoute};
pub use handler::{handler, BoxFuture, Handler, Middleware, MiddlewareId, Renderer};
pub use middleware::{
    early_data, health_check, is_early_data, request_id, request_logger, skip, EarlyDataConfig,
    HealthCheckConfig, Predicate, EARLY_DATA_KEY, REQUEST_ID_KEY,
};
pub use path::{is_parameterized, match_route, normalize_path};
pub use request::{Method, PathParams, Request};
pub use response::Response;
pub use router::{default_error_handler, ErrorHandler, RouteMatch, Router};
pub use static_files::{StaticCache, StaticRoute};
pub use table::{Route, RouteTable};
