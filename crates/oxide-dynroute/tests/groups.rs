//! Tests for route groups reconfigured at runtime.

mod common;
use common::*;

use oxide_dynroute::{handler, Router};

#[tokio::test]
async fn change_prefix_moves_routes() {
    let router = Router::new();
    let api = router.group("/api", Vec::new());
    api.get("/users", text("users"), Vec::new());

    assert_eq!(body(&get(&router, "/api/users").await), "users");

    api.change_prefix("/v2");
    assert_eq!(get(&router, "/api/users").await.status, 404);
    assert_eq!(body(&get(&router, "/v2/users").await), "users");
}

#[tokio::test]
async fn nested_group_chain_order() {
    let rec = Recorder::new();
    let router = Router::new();
    router.use_middleware([rec.mark("global")]);
    let api = router.group("/api", vec![rec.mark("api")]);
    let admin = api.group("/admin", vec![rec.mark("admin")]);
    admin.get("/stats", text("stats"), vec![rec.mark("route")]);

    assert_eq!(body(&get(&router, "/api/admin/stats").await), "stats");
    assert_eq!(rec.take(), vec!["global", "api", "admin", "route"]);
}

#[tokio::test]
async fn parent_middleware_update_reaches_subgroups() {
    let rec = Recorder::new();
    let router = Router::new();
    let api = router.group("/api", vec![rec.mark("old")]);
    let items = api.group("/items", Vec::new());
    items.get("/:id", text("item"), Vec::new());

    api.update_middlewares(vec![rec.mark("new")]);
    assert_eq!(body(&get(&router, "/api/items/3").await), "item");
    assert_eq!(rec.take(), vec!["new"]);
}

#[tokio::test]
async fn nested_prefix_change_and_params() {
    let router = Router::new();
    let api = router.group("/api", Vec::new());
    let users = api.group("/users", Vec::new());
    let show = handler(|ctx| {
        Box::pin(async move {
            let id = ctx.param("id").unwrap_or_default().to_string();
            ctx.text(id);
            Ok(())
        })
    });
    users.get("/:id", show, Vec::new());

    users.change_prefix("/people");
    assert_eq!(body(&get(&router, "/api/people/7").await), "7");
    api.change_prefix("/v3");
    assert_eq!(body(&get(&router, "/v3/people/8").await), "8");
    assert_eq!(router.list_routes(), vec!["GET /v3/people/:id"]);
}

#[tokio::test]
async fn group_remove_route() {
    let router = Router::new();
    let api = router.group("/api", Vec::new());
    api.get("/a", text("a"), Vec::new());
    api.get("/b", text("b"), Vec::new());

    api.remove_route("/a").unwrap();
    assert_eq!(get(&router, "/api/a").await.status, 404);
    assert_eq!(body(&get(&router, "/api/b").await), "b");

    // The removed route stays gone after a prefix change.
    api.change_prefix("/x");
    assert_eq!(router.list_routes(), vec!["GET /x/b"]);
}

#[tokio::test]
async fn middleware_survives_prefix_change() {
    let rec = Recorder::new();
    let router = Router::new();
    let api = router.group("/api", vec![rec.mark("G")]);
    api.get("/x", rec.handler("H"), vec![rec.mark("R")]);

    assert_eq!(body(&get(&router, "/api/x").await), "H");
    assert_eq!(rec.take(), vec!["G", "R", "H"]);

    api.change_prefix("/v2");
    assert_eq!(get(&router, "/api/x").await.status, 404);
    assert!(rec.take().is_empty());
    assert_eq!(body(&get(&router, "/v2/x").await), "H");
    assert_eq!(rec.take(), vec!["G", "R", "H"]);

    // Middleware added afterwards lands between the group and route lists.
    api.add_middleware(&[rec.mark("G2")]);
    get(&router, "/v2/x").await;
    assert_eq!(rec.take(), vec!["G", "G2", "R", "H"]);
}

#[tokio::test]
async fn subgroup_middleware_survives_parent_prefix_change() {
    let rec = Recorder::new();
    let router = Router::new();
    router.use_middleware([rec.mark("global")]);
    let api = router.group("/api", vec![rec.mark("api")]);
    let admin = api.group("/admin", vec![rec.mark("admin")]);
    admin.get("/stats", rec.handler("H"), vec![rec.mark("route")]);

    api.change_prefix("/v2");
    assert_eq!(body(&get(&router, "/v2/admin/stats").await), "H");
    assert_eq!(rec.take(), vec!["global", "api", "admin", "route", "H"]);

    admin.change_prefix("/ops");
    assert_eq!(body(&get(&router, "/v2/ops/stats").await), "H");
    assert_eq!(rec.take(), vec!["global", "api", "admin", "route", "H"]);
}
