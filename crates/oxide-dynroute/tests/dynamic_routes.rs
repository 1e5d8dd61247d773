//! Tests for adding, updating, renaming and removing routes at runtime.

mod common;
use common::*;

use std::sync::Arc;

use oxide_dynroute::{
    handler, Renderer, Request, Response, Result, Router, RouterConfig, RouterError,
};

#[tokio::test]
async fn update_route_swaps_handler() {
    let router = Router::new();
    router.get("/hello", text("v1"));
    assert_eq!(body(&get(&router, "/hello").await), "v1");

    router.update_route("GET", "/hello", text("v2")).unwrap();
    assert_eq!(body(&get(&router, "/hello").await), "v2");

    // Applying the same update twice leaves the same observable state.
    router.update_route("GET", "/hello", text("v2")).unwrap();
    assert_eq!(body(&get(&router, "/hello").await), "v2");
    assert_eq!(router.list_routes(), vec!["GET /hello"]);
}

#[tokio::test]
async fn update_keeps_route_middleware() {
    let rec = Recorder::new();
    let router = Router::new();
    router.add_route("GET", "/a", text("v1"), vec![rec.mark("m")]);
    router.update_route("get", "/a", text("v2")).unwrap();

    assert_eq!(body(&get(&router, "/a").await), "v2");
    assert_eq!(rec.take(), vec!["m"]);
}

#[tokio::test]
async fn rename_route_moves_path() {
    let router = Router::new();
    router.get("/hello", text("hi"));
    router.rename_route("GET", "/hello", "/hi").unwrap();

    assert_eq!(get(&router, "/hello").await.status, 404);
    let res = get(&router, "/hi").await;
    assert_eq!(res.status, 200);
    assert_eq!(body(&res), "hi");
}

#[tokio::test]
async fn rename_into_parameterized_pattern() {
    let router = Router::new();
    router.get("/user", text("user"));
    router.rename_route("GET", "/user", "/user/:id").unwrap();

    let m = router.match_route("GET", "/user/5").unwrap();
    assert_eq!(m.pattern, "/user/:id");
    assert_eq!(m.params.get("id"), Some("5"));
    assert!(router.match_route("GET", "/user").is_none());
}

#[tokio::test]
async fn remove_route_then_404() {
    let router = Router::new();
    router.get("/gone", text("x"));
    router.remove_route("GET", "/gone").unwrap();

    let res = get(&router, "/gone").await;
    assert_eq!(res.status, 404);
    assert_eq!(body(&res), "Not Found");
}

#[test]
fn mutations_on_missing_routes_fail() {
    let router = Router::new();
    for result in [
        router.update_route("GET", "/missing", text("x")),
        router.rename_route("GET", "/missing", "/other"),
        router.remove_route("GET", "/missing"),
        router.add_middleware("GET", "/missing", &[]),
        router.remove_middleware("GET", "/missing", &[]),
    ] {
        assert!(matches!(result, Err(RouterError::RouteNotFound { .. })));
    }
    assert!(router.list_routes().is_empty());
}

#[tokio::test]
async fn method_partitions_are_independent() {
    let router = Router::new();
    router
        .get("/items", text("list"))
        .post("/items", text("create"));

    let res = router.handle(Request::post("/items")).await;
    assert_eq!(body(&res), "create");
    assert_eq!(body(&get(&router, "/items").await), "list");

    let res = router.handle(Request::delete("/items")).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn clear_routes_drops_everything() {
    let router = Router::new();
    router.get("/a", text("a")).get("/b/:id", text("b"));
    router.clear_routes();

    assert!(router.list_routes().is_empty());
    assert_eq!(get(&router, "/a").await.status, 404);
    assert_eq!(get(&router, "/b/1").await.status, 404);
}

#[tokio::test]
async fn custom_not_found_handler() {
    let router = Router::with_config(RouterConfig::new().not_found_message("nothing here"));
    assert_eq!(body(&get(&router, "/x").await), "nothing here");

    router.set_not_found_handler(handler(|ctx| {
        Box::pin(async move {
            let message = format!("no route for {}", ctx.request.path);
            ctx.status(404).text(message);
            Ok(())
        })
    }));
    let res = get(&router, "/x").await;
    assert_eq!(res.status, 404);
    assert_eq!(body(&res), "no route for /x");
}

struct Upper;

impl Renderer for Upper {
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String> {
        let name = data["name"].as_str().unwrap_or("");
        Ok(format!("<p>{}:{name}</p>", template.to_uppercase()))
    }
}

#[tokio::test]
async fn renderer_is_route_scoped() {
    let router = Router::new();
    let page = handler(|ctx| {
        Box::pin(async move {
            ctx.render("greet", &serde_json::json!({ "name": "ada" }))
        })
    });
    router.get("/page", Arc::clone(&page)).get("/bare", page);
    router
        .set_renderer("GET", "/page", Arc::new(Upper))
        .unwrap();

    let res = get(&router, "/page").await;
    assert_eq!(res.status, 200);
    assert_eq!(body(&res), "<p>GREET:ada</p>");
    assert_eq!(
        res.get_header("content-type"),
        Some("text/html; charset=utf-8")
    );

    // No renderer attached: the handler error goes through the error handler.
    let res = get(&router, "/bare").await;
    assert_eq!(res.status, 500);
}

#[tokio::test]
async fn custom_error_handler() {
    let router = Router::new();
    let fail = handler(|_ctx| {
        Box::pin(async move {
            Err::<(), _>(RouterError::status(418, "teapot"))
        })
    });
    router.get("/fail", fail);
    router.set_error_handler(|err| {
        let message = err.root_cause().to_string();
        Response::plain(err.status_code(), message)
    });

    let res = get(&router, "/fail").await;
    assert_eq!(res.status, 418);
    assert_eq!(body(&res), "teapot");
}
