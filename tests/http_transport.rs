//! `HttpTransport` against a local mock server.

use mockito::Matcher;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use rest_api_kit::transport::{
    HttpTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
use rest_api_kit::{Endpoint, Method, RequestError, RestBase};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn transport() -> HttpTransport {
    HttpTransport::new()
        .unwrap()
        .with_timeout(Duration::from_secs(5))
        .with_retries(0)
        .with_retry_delay(Duration::from_millis(1))
}

fn request(method: Method, url: String, body: Option<Value>) -> TransportRequest {
    TransportRequest {
        method,
        url,
        headers: HeaderMap::new(),
        body,
    }
}

#[tokio::test]
async fn test_json_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/1")
        .match_header("content-type", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":1,"name":"Ada"}"#)
        .create_async()
        .await;

    let response = transport()
        .send(request(Method::Get, format!("{}/users/1", server.url()), None))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(response.is_success());
    assert_eq!(response.data(), &json!({"id": 1, "name": "Ada"}));
    assert_eq!(response.status(), Some(200));
    match response {
        TransportResponse::Success { duration_ms, .. } => assert!(duration_ms.is_some()),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn test_text_body_is_kept_as_string() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("ok")
        .create_async()
        .await;

    let response = transport()
        .send(request(Method::Get, format!("{}/health", server.url()), None))
        .await
        .unwrap();
    assert_eq!(response.data(), &json!("ok"));
}

#[tokio::test]
async fn test_error_status_parses_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"not here"}"#)
        .create_async()
        .await;

    let response = transport()
        .send(request(Method::Get, format!("{}/missing", server.url()), None))
        .await
        .unwrap();
    assert_eq!(
        response,
        TransportResponse::Error {
            data: json!({"message": "not here"}),
            status: Some(404),
            info: Some(json!({"statusText": "Not Found"})),
        }
    );
}

#[tokio::test]
async fn test_error_status_without_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/todos/9")
        .with_status(403)
        .create_async()
        .await;

    let response = transport()
        .send(request(Method::Delete, format!("{}/todos/9", server.url()), None))
        .await
        .unwrap();
    assert!(!response.is_success());
    assert_eq!(
        response.data(),
        &json!("Request failed with status: 403 Forbidden")
    );
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let response = transport()
        .with_retries(2)
        .send(request(Method::Get, format!("{}/flaky", server.url()), None))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status(), Some(503));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/nope")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    transport()
        .with_retries(3)
        .send(request(Method::Get, format!("{}/nope", server.url()), None))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_body_and_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/todos")
        .match_header("content-type", "application/vnd.api+json")
        .match_body(Matcher::Json(json!({"title": "write tests"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":7}"#)
        .create_async()
        .await;

    let mut req = request(
        Method::Post,
        format!("{}/todos", server.url()),
        Some(json!({"title": "write tests"})),
    );
    req.headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));

    let response = transport().send(req).await.unwrap();
    mock.assert_async().await;
    assert_eq!(response.data(), &json!({"id": 7}));
}

#[tokio::test]
async fn test_get_never_sends_a_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/search")
        .match_body("")
        .with_status(204)
        .create_async()
        .await;

    let response = transport()
        .send(request(
            Method::Get,
            format!("{}/search", server.url()),
            Some(json!({"q": "ignored"})),
        ))
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(response.data(), &Value::Null);
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_error() {
    let err = transport()
        .send(request(Method::Get, "http://127.0.0.1:1/".to_string(), None))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Http(_)));
    assert_eq!(err.user_message(), "Network error");
}

#[tokio::test]
async fn test_executor_over_http() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/todos")
        .match_body(Matcher::Json(json!({"title": "t"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":1,"title":"t"}"#)
        .create_async()
        .await;
    let _reject = server
        .mock("GET", "/todos/2")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"boom"}"#)
        .create_async()
        .await;

    let api = RestBase::builder()
        .base_url(server.url())
        .transport(Arc::new(transport()))
        .build()
        .unwrap();
    let endpoints = api
        .create_endpoints([
            ("addTodo", Endpoint::post("/todos").save_to_cache(true)),
            ("getTodo", Endpoint::get("/todos/:id")),
        ])
        .unwrap();

    let state = endpoints
        .executor("addTodo")
        .unwrap()
        .trigger(Some(json!({"title": "t"})), None)
        .await;
    create.assert_async().await;
    assert!(state.is_success);
    assert_eq!(state.data, Some(json!({"id": 1, "title": "t"})));
    let key = endpoints.cache_key("addTodo").unwrap();
    assert_eq!(api.store().get(key.as_str()), Some(json!({"id": 1, "title": "t"})));

    let state = endpoints
        .executor("getTodo")
        .unwrap()
        .trigger(None, Some(rest_api_kit::UrlParams::new().with("id", 2)))
        .await;
    assert!(state.is_error());
    assert_eq!(
        state.error,
        Some(RequestError::Response {
            data: json!({"error": "boom"}),
            status: Some(500),
            info: Some(json!({"statusText": "Internal Server Error"})),
        })
    );
}
