#![allow(dead_code)]

use std::sync::Arc;

use oxide_dynroute::{handler, Handler, Middleware, Request, Response, Router};
use parking_lot::Mutex;

/// A handler that answers with a fixed text body.
pub fn text(body: &'static str) -> Handler {
    handler(move |ctx| {
        Box::pin(async move {
            ctx.text(body);
            Ok(())
        })
    })
}

/// Records the order in which marking middleware runs.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Middleware that records `name` and continues the chain.
    pub fn mark(&self, name: &'static str) -> Middleware {
        let log = Arc::clone(&self.0);
        Middleware::new(move |ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().push(name.to_string());
                ctx.next().await
            })
        })
    }

    /// Handler that records `name` and answers with it as the body.
    pub fn handler(&self, name: &'static str) -> Handler {
        let log = Arc::clone(&self.0);
        handler(move |ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().push(name.to_string());
                ctx.text(name);
                Ok(())
            })
        })
    }

    /// Drains everything recorded so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

pub async fn get(router: &Router, path: &str) -> Response {
    router.handle(Request::get(path)).await
}

pub fn body(response: &Response) -> String {
    response
        .body_string()
        .unwrap_or_else(|| panic!("Non UTF-8 body: {:?}", response.body))
}
