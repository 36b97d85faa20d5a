use axum::http::StatusCode;
use routing_core::RouteStore;
use routing_types::Route;
use serde_json::json;

use crate::test_helpers::test_app;

#[tokio::test]
async fn test_list_routes_empty() {
    let app = test_app();

    let response = app.server.get("/routing/v1/routes").await;

    response.assert_status_ok();
    let routes: Vec<Route> = response.json();
    assert!(routes.is_empty());
}

#[tokio::test]
async fn test_upsert_then_list() {
    let app = test_app();

    let response = app
        .server
        .post("/routing/v1/routes")
        .json(&json!([
            {"route": "api.example.com", "port": 8080, "ip": "10.0.0.1", "ttl": 30, "log_guid": "lg-1"},
            {"route": "www.example.com", "port": 8081, "ip": "10.0.0.2"}
        ]))
        .await;
    response.assert_status(StatusCode::CREATED);

    let mut routes: Vec<Route> = app.server.get("/routing/v1/routes").await.json();
    routes.sort_by(|a, b| a.route.cmp(&b.route));

    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0].log_guid, "lg-1");
    assert_eq!(routes[0].ttl, Some(30));
    assert!(routes[0].expires_at.is_some());
    assert_eq!(routes[1].ttl, Some(120), "missing ttl defaults to the registry maximum");
}

#[tokio::test]
async fn test_invalid_batch_saves_nothing() {
    let app = test_app();

    let response = app
        .server
        .post("/routing/v1/routes")
        .json(&json!([
            {"route": "api.example.com", "port": 8080, "ip": "10.0.0.1", "ttl": 30},
            {"route": "", "port": 8080, "ip": "10.0.0.1", "ttl": 30}
        ]))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "RouteInvalidError");
    assert!(body["message"].as_str().unwrap().contains("route must not be empty"));
    assert!(app.store.read_routes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_process_request_error() {
    let app = test_app();

    let response = app
        .server
        .post("/routing/v1/routes")
        .json(&json!({"route": "not-an-array"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "ProcessRequestError");
}

#[tokio::test]
async fn test_delete_ignores_missing_routes() {
    let app = test_app();
    app.store.save_route(Route::new("api.example.com", 8080, "10.0.0.1", 30)).await.unwrap();

    let response = app
        .server
        .delete("/routing/v1/routes")
        .json(&json!([
            {"route": "api.example.com", "port": 8080, "ip": "10.0.0.1"},
            {"route": "gone.example.com", "port": 8080, "ip": "10.0.0.9"}
        ]))
        .await;

    response.assert_status(StatusCode::NO_CONTENT);
    assert!(app.store.read_routes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health() {
    let app = test_app();

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}
