//! End-to-end tests over a real TCP listener.

use std::sync::Arc;

use axum::http::StatusCode;
use route_dispatch::config::AppConfig;
use route_dispatch::validation::{FieldKind, RouteValidation, Shape};
use route_dispatch::{App, DispatchError, Request, RouteDefinition, Toolkit};
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_serves_over_tcp() {
    let server = App::new(AppConfig::default())
        .route(RouteDefinition::get("/whereami", |_r: Arc<Request>, toolkit: Toolkit| async move {
            let addr = toolkit.context().address().map(|a| a.to_string());
            Ok::<_, DispatchError>(json!({ "address": addr }))
        }))
        .route(
            RouteDefinition::post("/orders/:id", |request: Arc<Request>, toolkit: Toolkit| async move {
                toolkit.set_status(StatusCode::CREATED);
                toolkit.set_header("x-order", &request.params()["id"].to_string())?;
                Ok::<_, DispatchError>(json!({ "id": request.params()["id"], "item": request.payload()["item"] }))
            })
            .validate(
                RouteValidation::new()
                    .params(Shape::new().required("id", FieldKind::Integer))
                    .payload(Shape::new().required("item", FieldKind::String)),
            ),
        )
        .build()
        .unwrap();

    let (addr, shutdown) = common::start_server(server).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let response = client.get(format!("{}/whereami", base)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["address"], json!(addr.to_string()));

    let response = client
        .post(format!("{}/orders/12", base))
        .json(&json!({"item": "book"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(response.headers()["x-order"], "12");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": 12, "item": "book"}));

    let response = client
        .post(format!("{}/orders/twelve", base))
        .json(&json!({"item": "book"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "ValidationError");

    shutdown.send(()).unwrap();
}
