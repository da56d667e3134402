//! Cache identifiers and URL building.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheKey`] | Stable per-endpoint cache identifier |
//! | [`build_url`] | Path placeholder substitution + query string |
//! | [`resolve_base_url`] | Absolute URL resolution against a base URL |
//! | [`UrlParams`] | Ordered parameter list |
//!
//! ```rust
//! use rest_api_kit::cache::{build_url, CacheKey, UrlParams};
//!
//! let url = build_url("/users/:id", &UrlParams::new().with("id", 5).with("x", 1));
//! assert_eq!(url, "/users/5?x=1");
//!
//! let key = CacheKey::for_endpoint(Some("https://api.example.com"), "getUser");
//! assert_eq!(key.as_str(), "https://api.example.com&getUser");
//! ```

mod key;
mod url;

pub use self::url::{build_url, encode_component, is_absolute_url, resolve_base_url, UrlParams};
pub use key::{validate_endpoint_name, CacheKey, CACHE_KEY_SEPARATOR};
