//! Tests for middleware ordering, removal and the bundled middleware.

mod common;
use common::*;

use oxide_dynroute::{
    early_data, handler, health_check, is_early_data, request_id, request_logger, skip, Context,
    EarlyDataConfig, HealthCheckConfig, Middleware, Request, Router, RouterError, REQUEST_ID_KEY,
};

#[tokio::test]
async fn global_runs_before_route_middleware() {
    let rec = Recorder::new();
    let router = Router::new();
    router.use_middleware([rec.mark("A")]);
    router.add_route("GET", "/x", text("H"), vec![rec.mark("B")]);

    let res = get(&router, "/x").await;
    assert_eq!(body(&res), "H");
    assert_eq!(rec.take(), vec!["A", "B"]);
}

#[tokio::test]
async fn globals_run_in_registration_order_then_handler() {
    let rec = Recorder::new();
    let router = Router::new();
    router.use_middleware([rec.mark("A")]);
    router.use_middleware([rec.mark("B")]);
    router.get("/x", rec.handler("H"));

    let res = get(&router, "/x").await;
    assert_eq!(body(&res), "H");
    assert_eq!(rec.take(), vec!["A", "B", "H"]);
}

#[tokio::test]
async fn removal_keeps_remaining_order() {
    let rec = Recorder::new();
    let (a, b, c) = (rec.mark("a"), rec.mark("b"), rec.mark("c"));
    let router = Router::new();
    router.add_route("GET", "/x", text("ok"), vec![a, b.clone(), c]);

    router.remove_middleware("GET", "/x", &[b]).unwrap();
    get(&router, "/x").await;
    assert_eq!(rec.take(), vec!["a", "c"]);
}

#[tokio::test]
async fn added_route_middleware_appends() {
    let rec = Recorder::new();
    let router = Router::new();
    router.add_route("GET", "/x", text("ok"), vec![rec.mark("first")]);
    router
        .add_middleware("GET", "/x", &[rec.mark("second")])
        .unwrap();

    get(&router, "/x").await;
    assert_eq!(rec.take(), vec!["first", "second"]);
}

#[tokio::test]
async fn global_removal_by_identity() {
    let rec = Recorder::new();
    let keep = rec.mark("keep");
    let dropped = rec.mark("dropped");
    let router = Router::new();
    router.use_middleware([keep, dropped.clone()]);
    router.get("/x", text("ok"));

    router.remove_global_middleware(&[dropped]);
    get(&router, "/x").await;
    assert_eq!(rec.take(), vec!["keep"]);
}

#[tokio::test]
async fn short_circuit_skips_handler() {
    let rec = Recorder::new();
    let deny = Middleware::new(|ctx| {
        Box::pin(async move {
            ctx.status(401).text("denied");
            Ok(())
        })
    });
    let router = Router::new();
    let after = rec.mark("after");
    router.add_route("GET", "/x", rec.handler("H"), vec![deny, after]);

    let res = get(&router, "/x").await;
    assert_eq!(res.status, 401);
    assert_eq!(body(&res), "denied");
    assert!(rec.take().is_empty());
}

#[tokio::test]
async fn post_processing_after_next() {
    let wrap = Middleware::new(|ctx| {
        Box::pin(async move {
            ctx.next().await?;
            let inner = ctx.response.body_string().unwrap_or_default();
            ctx.text(format!("[{inner}]"));
            Ok(())
        })
    });
    let router = Router::new();
    router.add_route("GET", "/x", text("body"), vec![wrap]);

    assert_eq!(body(&get(&router, "/x").await), "[body]");
}

#[tokio::test]
async fn chain_error_reports_failing_index() {
    let rec = Recorder::new();
    let fail = Middleware::new(|_ctx| {
        Box::pin(async move {
            Err::<(), _>(RouterError::status(403, "nope"))
        })
    });
    let router = Router::new();
    router.use_middleware([rec.mark("g")]);
    router.add_route("GET", "/x", text("ok"), vec![fail]);

    let mut ctx = Context::new(Request::get("/x"));
    let err = router.dispatch(&mut ctx).await.unwrap_err();
    assert!(err.to_string().contains("middleware[1] error: nope"));
    assert_eq!(err.status_code(), 403);

    let res = get(&router, "/x").await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let router = Router::new();
    router.use_middleware([request_id("X-Request-ID")]);
    let echo = handler(|ctx| {
        Box::pin(async move {
            let id = ctx.locals.get(REQUEST_ID_KEY).cloned().unwrap_or_default();
            ctx.text(id);
            Ok(())
        })
    });
    router.get("/id", echo);

    let res = router
        .handle(Request::get("/id").header("X-Request-ID", "req-1"))
        .await;
    assert_eq!(body(&res), "req-1");
    assert_eq!(res.get_header("x-request-id"), Some("req-1"));

    let res = get(&router, "/id").await;
    let generated = body(&res);
    assert_eq!(generated.len(), 36);
    assert_eq!(res.get_header("X-Request-ID"), Some(generated.as_str()));
}

#[tokio::test]
async fn health_check_answers_before_routes() {
    let router = Router::new();
    router.use_middleware([
        health_check(HealthCheckConfig::default().readiness(|_| false)),
        request_logger(),
    ]);
    // Global middleware only sees matched routes.
    router
        .get("/livez", text("shadowed"))
        .get("/readyz", text("shadowed"));
    router.get("/other", text("other"));

    let res = get(&router, "/livez").await;
    assert_eq!(res.status, 200);
    assert!(res.body.is_empty());
    assert_eq!(get(&router, "/readyz").await.status, 503);
    assert_eq!(body(&get(&router, "/other").await), "other");

    // Only GET is answered.
    let res = router.handle(Request::post("/livez")).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn skip_bypasses_for_matching_requests() {
    let rec = Recorder::new();
    let router = Router::new();
    let is_public = |ctx: &Context| ctx.request.path.starts_with("/public");
    router.use_middleware([skip(&rec.mark("auth"), is_public)]);
    router
        .get("/public/x", text("p"))
        .get("/private", text("q"));

    assert_eq!(body(&get(&router, "/public/x").await), "p");
    assert!(rec.take().is_empty());

    assert_eq!(body(&get(&router, "/private").await), "q");
    assert_eq!(rec.take(), vec!["auth"]);
}

#[tokio::test]
async fn early_data_rejects_unsafe_replays() {
    let router = Router::new();
    router.use_middleware([early_data(EarlyDataConfig::default())]);
    let report = handler(|ctx| {
        Box::pin(async move {
            let early = is_early_data(ctx);
            ctx.text(early.to_string());
            Ok(())
        })
    });
    router.get("/x", report).post("/x", text("stored"));

    let res = router
        .handle(Request::get("/x").header("Early-Data", "1"))
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(body(&res), "true");

    let res = router
        .handle(Request::post("/x").header("Early-Data", "1"))
        .await;
    assert_eq!(res.status, 425);

    let res = router.handle(Request::post("/x")).await;
    assert_eq!(body(&res), "stored");
    assert_eq!(body(&get(&router, "/x").await), "false");
}

#[tokio::test]
async fn early_data_from_untrusted_proxy_is_rejected() {
    let router = Router::new();
    let from_edge = |ctx: &Context| ctx.request.get_header("X-Proxy") == Some("edge");
    let config = EarlyDataConfig::default().trusted_proxy(from_edge);
    router.use_middleware([early_data(config)]);
    router.get("/x", text("ok"));

    assert_eq!(get(&router, "/x").await.status, 425);
    let res = router
        .handle(Request::get("/x").header("X-Proxy", "edge"))
        .await;
    assert_eq!(body(&res), "ok");
}
