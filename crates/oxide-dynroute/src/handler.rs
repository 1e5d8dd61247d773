//! Handler, middleware and renderer types.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

/// A boxed future for async handler execution.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request handler: terminal route handlers and middleware share this shape.
///
/// Middleware advances the chain with [`Context::next`]; returning without
/// calling it short-circuits the rest of the chain.
pub type Handler = Arc<dyn Fn(&mut Context) -> BoxFuture<'_, Result<()>> + Send + Sync>;

/// Wraps a function or closure into a [`Handler`].
///
/// ```ignore
/// let hello = handler(|ctx| Box::pin(async move {
///     ctx.text("hello");
///     Ok(())
/// }));
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

static NEXT_MIDDLEWARE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a registered middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MiddlewareId(u64);

impl MiddlewareId {
    fn next() -> Self {
        Self(NEXT_MIDDLEWARE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MiddlewareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mw#{}", self.0)
    }
}

/// A handler tagged with a stable identity.
///
/// The id is assigned once at construction and shared by every clone, so a
/// middleware can be removed by passing back the same value (or a clone) that
/// was registered.
#[derive(Clone)]
pub struct Middleware {
    id: MiddlewareId,
    handler: Handler,
}

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self::from_handler(Arc::new(f))
    }

    /// Tags an existing handler with a fresh id.
    pub fn from_handler(handler: Handler) -> Self {
        Self {
            id: MiddlewareId::next(),
            handler,
        }
    }

    pub fn id(&self) -> MiddlewareId {
        self.id
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").field("id", &self.id).finish()
    }
}

/// Removes every middleware whose id appears in `remove`, keeping the
/// relative order of the rest.
pub(crate) fn retain_except(list: &mut Vec<Middleware>, remove: &[Middleware]) {
    list.retain(|mw| !remove.iter().any(|r| r.id == mw.id));
}

/// An alternate rendering backend attached to a single route.
pub trait Renderer: Send + Sync {
    /// Renders `template` with `data` into an HTML document.
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String>;
}
