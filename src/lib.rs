//! # rest-api-kit
//!
//! Client-side request/cache layer for REST APIs.
//!
//! ## Overview
//!
//! Declare a set of named endpoints once (URL template, HTTP method, caching
//! policy). Each endpoint gets a trigger and an observable request state. A
//! trigger performs the network call, can serve or store responses in a
//! shared in-memory cache, and clears the cache entries of related endpoints
//! when a mutation succeeds.
//!
//! ## Key Features
//!
//! - **Observable cache**: [`Store`] with subscriptions, middleware, history and persistence hooks
//! - **Request state machine**: pure [`reduce`](request::reduce) over [`RequestAction`]s
//! - **Cache invalidation**: `updates` fan-out after successful mutations
//! - **Typed declarations**: per-method [`Endpoint`] builder or a YAML/JSON [`EndpointManifest`]
//! - **Pluggable transport**: [`transport::HttpTransport`] (reqwest) or any
//!   [`transport::Transport`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rest_api_kit::{Endpoint, RestBase};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> rest_api_kit::Result<()> {
//!     let api = RestBase::builder()
//!         .base_url("https://api.example.com")
//!         .build()?;
//!
//!     let endpoints = api.create_endpoints([
//!         ("listTodos", Endpoint::get("/todos").save_to_cache(true).prefer_cache_value(true)),
//!         ("addTodo", Endpoint::post("/todos").updates(["listTodos"])),
//!     ])?;
//!
//!     let add = endpoints.accessor("useAddTodo").expect("declared above");
//!     let state = add.trigger(Some(json!({"title": "write docs"})), None).await;
//!     if let Some(error) = &state.error {
//!         eprintln!("failed: {}", error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`store`] | Cache store: dispatch, middleware, events, history, persistence, selections |
//! | [`cache`] | Cache identifiers and URL building |
//! | [`request`] | Request state and its reducer |
//! | [`endpoint`] | Endpoint declarations, policies and manifests |
//! | [`transport`] | Network collaborator contract and the HTTP implementation |
//! | [`client`] | `RestBase`, endpoint registry and request executor |

pub mod cache;
pub mod client;
pub mod endpoint;
pub mod request;
pub mod store;
pub mod transport;

// Re-export main types for convenience
pub use cache::{build_url, CacheKey, UrlParams};
pub use client::{Endpoints, RequestExecutor, RestBase, RestBuilder};
pub use endpoint::{Endpoint, EndpointManifest, EndpointPolicy, Method, PolicyDefaults};
pub use request::{RequestAction, RequestError, RequestState};
pub use store::{Store, StoreAction, StoreEvent, StoreEventKind, StoreState};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
