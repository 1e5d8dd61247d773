//! Bundled middleware.
//!
//! Every constructor returns a [`Middleware`] with its own identity, ready for
//! [`Router::use_middleware`](crate::Router::use_middleware) or a route/group
//! middleware list. Keep the returned value around to remove it later.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::error::RouterError;
use crate::handler::Middleware;
use crate::request::Method;

/// Key under which [`request_id`] stores the id in [`Context::locals`].
pub const REQUEST_ID_KEY: &str = "request_id";

/// Key under which [`early_data`] marks a request it let through.
pub const EARLY_DATA_KEY: &str = "earlydata_allowed";

/// A yes/no question asked about the current request.
pub type Predicate = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Logs one line per request after the rest of the chain has run.
pub fn request_logger() -> Middleware {
    Middleware::new(|ctx| {
        Box::pin(async move {
            let start = Instant::now();
            let result = ctx.next().await;
            let status = match &result {
                Ok(()) => ctx.response.status,
                Err(err) => err.status_code(),
            };
            let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
            info!(
                method = %ctx.request.method,
                path = %ctx.request.path,
                status,
                elapsed_us,
                "request"
            );
            result
        })
    })
}

/// Propagates or generates a request id.
///
/// The incoming `header` value is reused when present, otherwise a UUID v4 is
/// generated. The id is echoed on the response and stored in
/// `ctx.locals[REQUEST_ID_KEY]`.
pub fn request_id(header: &'static str) -> Middleware {
    Middleware::new(move |ctx| {
        Box::pin(async move {
            let id = ctx
                .request
                .get_header(header)
                .filter(|v| !v.is_empty())
                .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
            ctx.set_header(header, id.clone());
            ctx.locals.insert(REQUEST_ID_KEY.to_string(), id);
            ctx.next().await
        })
    })
}

/// Endpoints and checks for [`health_check`].
#[derive(Clone)]
pub struct HealthCheckConfig {
    pub liveness_endpoint: String,
    pub readiness_endpoint: String,
    pub liveness_check: Option<Predicate>,
    pub readiness_check: Option<Predicate>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        let always: Predicate = Arc::new(|_| true);
        Self {
            liveness_endpoint: "/livez".to_string(),
            readiness_endpoint: "/readyz".to_string(),
            liveness_check: Some(Arc::clone(&always)),
            readiness_check: Some(always),
        }
    }
}

impl HealthCheckConfig {
    #[must_use]
    pub fn liveness(mut self, check: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        self.liveness_check = Some(Arc::new(check));
        self
    }

    #[must_use]
    pub fn readiness(mut self, check: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        self.readiness_check = Some(Arc::new(check));
        self
    }
}

/// Answers `GET` on the liveness and readiness endpoints with 200 or 503.
///
/// Other requests, and endpoints without a check, continue down the chain.
/// Used globally, it only sees paths that match a registered route.
pub fn health_check(config: HealthCheckConfig) -> Middleware {
    let config = Arc::new(config);
    Middleware::new(move |ctx| {
        let config = Arc::clone(&config);
        Box::pin(async move {
            if ctx.request.method != Method::Get {
                return ctx.next().await;
            }
            let path = ctx.request.path.trim_end_matches('/');
            let check = if path == config.readiness_endpoint {
                config.readiness_check.clone()
            } else if path == config.liveness_endpoint {
                config.liveness_check.clone()
            } else {
                None
            };
            match check {
                Some(check) => {
                    let status = if check(&*ctx) { 200 } else { 503 };
                    ctx.status(status);
                    ctx.response.body.clear();
                    Ok(())
                }
                None => ctx.next().await,
            }
        })
    })
}

/// Runs `inner` unless `exclude` holds for the request, in which case the
/// chain simply continues.
pub fn skip(
    inner: &Middleware,
    exclude: impl Fn(&Context) -> bool + Send + Sync + 'static,
) -> Middleware {
    let handler = Arc::clone(inner.handler());
    Middleware::new(move |ctx| {
        if exclude(&*ctx) {
            ctx.next()
        } else {
            handler(ctx)
        }
    })
}

/// Settings for [`early_data`].
#[derive(Clone)]
pub struct EarlyDataConfig {
    /// Skips the middleware entirely when it returns true.
    pub skip: Option<Predicate>,
    /// Whether the request was sent as TLS 1.3 early data.
    pub is_early_data: Predicate,
    /// Whether an early-data request may be processed.
    pub allow_early_data: Predicate,
    /// Whether the hop that reported early data can be believed.
    pub trusted_proxy: Predicate,
    /// Status returned for rejected requests.
    pub error_status: u16,
}

impl Default for EarlyDataConfig {
    fn default() -> Self {
        Self {
            skip: None,
            is_early_data: Arc::new(|ctx: &Context| {
                ctx.request.get_header("Early-Data") == Some("1")
            }),
            allow_early_data: Arc::new(|ctx: &Context| {
                matches!(
                    ctx.request.method,
                    Method::Get | Method::Head | Method::Options | Method::Trace
                )
            }),
            trusted_proxy: Arc::new(|_| true),
            error_status: 425,
        }
    }
}

impl EarlyDataConfig {
    #[must_use]
    pub fn skip(mut self, when: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        self.skip = Some(Arc::new(when));
        self
    }

    #[must_use]
    pub fn allow(mut self, when: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        self.allow_early_data = Arc::new(when);
        self
    }

    #[must_use]
    pub fn trusted_proxy(
        mut self,
        when: impl Fn(&Context) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.trusted_proxy = Arc::new(when);
        self
    }
}

/// Guards against replayed TLS 1.3 early data.
///
/// Requests from an untrusted proxy fail with `error_status`. Early-data
/// requests that are allowed continue with `ctx.locals[EARLY_DATA_KEY]` set
/// to `"true"`; the rest fail with `error_status` (425 by default). Regular
/// requests pass through untouched.
pub fn early_data(config: EarlyDataConfig) -> Middleware {
    let config = Arc::new(config);
    Middleware::new(move |ctx| {
        let config = Arc::clone(&config);
        Box::pin(async move {
            if config.skip.as_ref().is_some_and(|skip| skip(&*ctx)) {
                return ctx.next().await;
            }
            if !(config.trusted_proxy)(&*ctx) {
                return Err(RouterError::status(config.error_status, "Too Early"));
            }
            if !(config.is_early_data)(&*ctx) {
                return ctx.next().await;
            }
            if !(config.allow_early_data)(&*ctx) {
                return Err(RouterError::status(config.error_status, "Too Early"));
            }
            ctx.locals
                .insert(EARLY_DATA_KEY.to_string(), "true".to_string());
            ctx.next().await
        })
    })
}

/// Reports whether [`early_data`] let this request through as early data.
pub fn is_early_data(ctx: &Context) -> bool {
    ctx.locals.get(EARLY_DATA_KEY).is_some_and(|v| v == "true")
}
