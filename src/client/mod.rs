//! Endpoint declaration and request execution.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RestBase`] | Library-wide options and the once-only endpoint declaration |
//! | [`RestBuilder`] | Builder for [`RestBase`] (base URL, headers callback, transport, store) |
//! | [`Endpoints`] | Registry of declared endpoints, by name or accessor name |
//! | [`RequestExecutor`] | Trigger and observable state of one endpoint |
//!
//! ```rust,no_run
//! use rest_api_kit::client::RestBase;
//! use rest_api_kit::endpoint::Endpoint;
//!
//! # async fn run() -> rest_api_kit::Result<()> {
//! let api = RestBase::builder().base_url("https://api.example.com").build()?;
//! let endpoints = api.create_endpoints([
//!     ("getUser", Endpoint::get("/users/:id").save_to_cache(true)),
//!     ("renameUser", Endpoint::patch("/users/:id").updates(["getUser"])),
//! ])?;
//!
//! let get_user = endpoints.accessor("useGetUser").expect("declared above");
//! let state = get_user
//!     .trigger(None, Some([("id", 1)].into_iter().collect()))
//!     .await;
//! println!("{:?}", state.data);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod endpoint;
pub mod execution;

pub use builder::{PrepareHeaders, RestBuilder};
pub use self::core::RestBase;
pub use endpoint::Endpoints;
pub use execution::RequestExecutor;
