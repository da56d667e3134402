//! Endpoint declaration: once-only initialization, accessors and manifests.

use rest_api_kit::transport::{FnTransport, Transport, TransportRequest, TransportResponse};
use rest_api_kit::{Endpoint, EndpointManifest, Endpoints, Error, Method, RestBase};
use serde_json::json;
use std::sync::Arc;

fn echo_transport() -> Arc<dyn Transport> {
    Arc::new(FnTransport::new(|req: TransportRequest| async move {
        Ok(TransportResponse::success(json!({ "url": req.url })))
    }))
}

fn api() -> RestBase {
    RestBase::builder()
        .base_url("https://api.example.com")
        .transport(echo_transport())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_second_initialization_is_ignored() {
    let api = api();
    let first = api
        .create_endpoints([
            ("getUser", Endpoint::get("/users/:id")),
            ("login", Endpoint::post("/login")),
        ])
        .unwrap();

    let second = api
        .create_endpoints([("somethingElse", Endpoint::get("/else"))])
        .unwrap();

    assert_eq!(second.names(), vec!["getUser", "login"]);
    assert!(second.executor("somethingElse").is_none());
    assert_eq!(api.endpoints().map(Endpoints::len), Some(2));

    // Bindings from the first call keep working.
    let state = first.accessor("useLogin").unwrap().trigger(None, None).await;
    assert_eq!(state.data, Some(json!({"url": "https://api.example.com/login"})));
}

#[test]
fn test_failed_declaration_can_be_retried() {
    let api = api();
    let err = api
        .create_endpoints([("a", Endpoint::get("/a")), ("a", Endpoint::get("/b"))])
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(api.endpoints().is_none());

    let endpoints = api.create_endpoints([("a", Endpoint::get("/a"))]).unwrap();
    assert_eq!(endpoints.len(), 1);
}

#[test]
fn test_accessor_names() {
    let endpoints = api()
        .create_endpoints([
            ("getUser", Endpoint::get("/users/:id")),
            ("listTodos", Endpoint::get("/todos")),
        ])
        .unwrap();

    assert_eq!(Endpoints::accessor_name("getUser"), "useGetUser");
    assert_eq!(endpoints.accessor_names(), vec!["useGetUser", "useListTodos"]);
    assert_eq!(endpoints.accessor("useGetUser").unwrap().name(), "getUser");
    assert!(endpoints.accessor("getUser").is_none());
    assert!(endpoints.executor("useGetUser").is_none());
}

#[test]
fn test_cache_key_is_stable_and_policy_independent() {
    let a = api()
        .create_endpoints([("getUser", Endpoint::get("/users/:id"))])
        .unwrap();
    let b = api()
        .create_endpoints([(
            "getUser",
            Endpoint::get("/v2/users/:id").save_to_cache(true).prefer_cache_value(true),
        )])
        .unwrap();

    assert_eq!(a.cache_key("getUser"), b.cache_key("getUser"));
    assert_eq!(
        a.cache_key("getUser").map(|k| k.as_str()),
        Some("https://api.example.com&getUser")
    );
    assert_eq!(
        a.executor("getUser").unwrap().cache_key(),
        a.executor("getUser").unwrap().cache_key()
    );
}

#[test]
fn test_declaration_errors() {
    let relative_without_base = RestBase::builder()
        .transport(echo_transport())
        .build()
        .unwrap()
        .create_endpoints([("a", Endpoint::get("/a"))]);
    // REST_KIT_BASE_URL may supply a base URL in some environments.
    if std::env::var("REST_KIT_BASE_URL").is_err() {
        assert!(matches!(
            relative_without_base,
            Err(Error::Configuration { .. })
        ));
    }

    let absolute_is_fine = RestBase::builder()
        .transport(echo_transport())
        .build()
        .unwrap()
        .create_endpoints([("a", Endpoint::get("https://other.example.com/a"))]);
    assert!(absolute_is_fine.is_ok());

    let unknown_target =
        api().create_endpoints([("a", Endpoint::post("/a").updates(["missing"]))]);
    assert!(matches!(unknown_target, Err(Error::Validation { .. })));

    let reserved = api().create_endpoints([("a&b", Endpoint::get("/a"))]);
    assert!(matches!(reserved, Err(Error::Validation { .. })));

    let colliding =
        api().create_endpoints([("user", Endpoint::get("/a")), ("User", Endpoint::get("/b"))]);
    assert!(matches!(colliding, Err(Error::Validation { .. })));

    let bad_base = RestBase::builder().base_url("api.example.com").build();
    assert!(matches!(bad_base, Err(Error::Configuration { .. })));
}

#[tokio::test]
async fn test_manifest_driven_declaration() {
    let manifest = EndpointManifest::from_yaml_str(
        r#"
base_url: https://manifest.example.com
defaults:
  save_to_cache: true
endpoints:
  listTodos:
    url: /todos
  addTodo:
    url: /todos
    method: POST
    save_to_cache: false
    updates: [listTodos]
"#,
    )
    .unwrap();
    manifest.validate().unwrap();

    let api = RestBase::builder()
        .manifest(&manifest)
        .unwrap()
        .transport(echo_transport())
        .build()
        .unwrap();
    assert_eq!(api.base_url(), Some("https://manifest.example.com"));

    let endpoints = api.create_endpoints(manifest.endpoints().unwrap()).unwrap();
    let policy = endpoints.policy("addTodo").unwrap();
    assert_eq!(policy.method, Method::Post);
    assert!(!policy.save_to_cache);
    assert!(endpoints.policy("listTodos").unwrap().save_to_cache);

    let list = endpoints.accessor("useListTodos").unwrap();
    list.trigger(None, None).await;
    let key = "https://manifest.example.com&listTodos";
    assert!(api.store().has(key));

    endpoints
        .accessor("useAddTodo")
        .unwrap()
        .trigger(Some(json!({"title": "t"})), None)
        .await;
    assert!(!api.store().has(key));
}
