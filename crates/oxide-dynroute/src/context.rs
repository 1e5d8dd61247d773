//! Request-scoped state threaded through the middleware chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;

use crate::error::{Result, RouterError};
use crate::handler::{BoxFuture, Handler, Renderer};
use crate::request::{PathParams, Request};
use crate::response::Response;

/// Everything one in-flight request owns: the request, the response being
/// built, the matched parameters and the resolved handler chain with its
/// cursor. A `Context` is never shared between requests.
pub struct Context {
    pub request: Request,
    pub response: Response,
    pub params: PathParams,
    /// Free-form values middleware hands to later handlers.
    pub locals: HashMap<String, String>,
    renderer: Option<Arc<dyn Renderer>>,
    chain: Vec<Handler>,
    cursor: usize,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::ok(),
            params: PathParams::new(),
            locals: HashMap::new(),
            renderer: None,
            chain: Vec::new(),
            cursor: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses a cancellation flag owned by the host server.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Invokes the next handler in the chain.
    ///
    /// A no-op once the chain is exhausted. Errors are wrapped with the
    /// position of the failing handler.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            let Some(handler) = self.chain.get(self.cursor).cloned() else {
                return Ok(());
            };
            let index = self.cursor;
            self.cursor += 1;
            handler(self).await.map_err(|source| RouterError::Chain {
                index,
                source: Box::new(source),
            })
        }
        .boxed()
    }

    /// Installs a fresh chain and rewinds the cursor.
    pub(crate) fn set_chain(&mut self, chain: Vec<Handler>) {
        self.chain = chain;
        self.cursor = 0;
    }

    pub(crate) fn set_renderer(&mut self, renderer: Option<Arc<dyn Renderer>>) {
        self.renderer = renderer;
    }

    /// Number of handlers already started in this chain.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Gets a path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns the flag the host can set to cancel this request.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        self.response.status = status;
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.response.set_header(key, value);
        self
    }

    /// Writes a plain text body.
    pub fn text(&mut self, body: impl Into<String>) {
        let body: String = body.into();
        self.response
            .set_header("Content-Type", "text/plain; charset=utf-8");
        self.response.body = body.into_bytes();
    }

    /// Writes an HTML body.
    pub fn html(&mut self, body: impl Into<String>) {
        let body: String = body.into();
        self.response
            .set_header("Content-Type", "text/html; charset=utf-8");
        self.response.body = body.into_bytes();
    }

    /// Writes a JSON body.
    pub fn json<T: serde::Serialize>(&mut self, data: &T) -> Result<()> {
        let body = serde_json::to_vec(data)
            .map_err(|e| RouterError::Handler(Box::new(e)))?;
        self.response.set_header("Content-Type", "application/json");
        self.response.body = body;
        Ok(())
    }

    /// Renders a template through the route's renderer.
    pub fn render(&mut self, template: &str, data: &serde_json::Value) -> Result<()> {
        let renderer = self.renderer.clone().ok_or(RouterError::NoRenderer)?;
        let body = renderer.render(template, data)?;
        self.html(body);
        Ok(())
    }
}
