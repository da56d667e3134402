use super::Method;
use crate::cache::validate_endpoint_name;
use crate::{Error, ErrorContext, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Decides whether a successful transport response counts as a success.
pub type SuccessCondition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Maps the raw response (and the request body) to the value exposed as `data`.
pub type TransformResponse = Arc<dyn Fn(Value, Option<&Value>) -> Value + Send + Sync>;

/// Fully resolved, immutable per-endpoint configuration.
#[derive(Clone)]
pub struct EndpointPolicy {
    pub method: Method,
    pub headers: HeaderMap,
    /// Fold the request body into the query string, whatever the method.
    pub body_as_params: bool,
    /// Serve an existing cache entry without a network call.
    pub prefer_cache_value: bool,
    /// Store the raw response of a successful invocation.
    pub save_to_cache: bool,
    /// Endpoints whose cache entries are cleared after a successful invocation.
    pub updates: Vec<String>,
    pub success_condition: SuccessCondition,
    pub transform_response: TransformResponse,
}

impl EndpointPolicy {
    pub fn check(&self, data: &Value) -> bool {
        (self.success_condition)(data)
    }

    pub fn transform(&self, data: Value, body: Option<&Value>) -> Value {
        (self.transform_response)(data, body)
    }

    /// Whether the request body is folded into the query string.
    pub fn folds_body(&self) -> bool {
        self.body_as_params || !self.method.allows_body()
    }
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Endpoint::new(Method::Get, "").resolve(&PolicyDefaults::default())
    }
}

impl fmt::Debug for EndpointPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointPolicy")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body_as_params", &self.body_as_params)
            .field("prefer_cache_value", &self.prefer_cache_value)
            .field("save_to_cache", &self.save_to_cache)
            .field("updates", &self.updates)
            .finish_non_exhaustive()
    }
}

/// Library-wide policy defaults. Values set on an endpoint always win.
#[derive(Clone, Default)]
pub struct PolicyDefaults {
    pub headers: HeaderMap,
    pub body_as_params: Option<bool>,
    pub prefer_cache_value: Option<bool>,
    pub save_to_cache: Option<bool>,
    pub success_condition: Option<SuccessCondition>,
    pub transform_response: Option<TransformResponse>,
}

impl PolicyDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn prefer_cache_value(mut self, enable: bool) -> Self {
        self.prefer_cache_value = Some(enable);
        self
    }

    pub fn save_to_cache(mut self, enable: bool) -> Self {
        self.save_to_cache = Some(enable);
        self
    }

    pub fn body_as_params(mut self, enable: bool) -> Self {
        self.body_as_params = Some(enable);
        self
    }

    pub fn success_condition<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.success_condition = Some(Arc::new(f));
        self
    }

    pub fn transform_response<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.transform_response = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for PolicyDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyDefaults")
            .field("headers", &self.headers)
            .field("body_as_params", &self.body_as_params)
            .field("prefer_cache_value", &self.prefer_cache_value)
            .field("save_to_cache", &self.save_to_cache)
            .finish_non_exhaustive()
    }
}

/// Declaration of one endpoint: URL template, method and policy overrides.
///
/// ```rust
/// use rest_api_kit::endpoint::Endpoint;
///
/// let user = Endpoint::get("/users/:id")
///     .prefer_cache_value(true)
///     .save_to_cache(true);
/// let rename = Endpoint::patch("/users/:id").updates(["getUser"]);
/// assert_eq!(user.url(), "/users/:id");
/// assert_eq!(rename.update_targets(), ["getUser".to_string()]);
/// ```
#[derive(Clone)]
pub struct Endpoint {
    url: String,
    method: Method,
    headers: HeaderMap,
    body_as_params: Option<bool>,
    prefer_cache_value: Option<bool>,
    save_to_cache: Option<bool>,
    updates: Vec<String>,
    success_condition: Option<SuccessCondition>,
    transform_response: Option<TransformResponse>,
}

impl Endpoint {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body_as_params: None,
            prefer_cache_value: None,
            save_to_cache: None,
            updates: Vec::new(),
            success_condition: None,
            transform_response: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    pub fn options(url: impl Into<String>) -> Self {
        Self::new(Method::Options, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body_as_params(mut self, enable: bool) -> Self {
        self.body_as_params = Some(enable);
        self
    }

    pub fn prefer_cache_value(mut self, enable: bool) -> Self {
        self.prefer_cache_value = Some(enable);
        self
    }

    pub fn save_to_cache(mut self, enable: bool) -> Self {
        self.save_to_cache = Some(enable);
        self
    }

    pub fn updates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updates.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn success_condition<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.success_condition = Some(Arc::new(f));
        self
    }

    pub fn transform_response<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.transform_response = Some(Arc::new(f));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn update_targets(&self) -> &[String] {
        &self.updates
    }

    /// Check the declaration in isolation.
    pub fn validate(&self, name: &str) -> Result<()> {
        validate_endpoint_name(name)?;
        if self.url.trim().is_empty() {
            return Err(Error::validation_with_context(
                "endpoint URL must not be empty",
                ErrorContext::new()
                    .with_field_path(format!("endpoints.{}.url", name))
                    .with_source("endpoint_builder"),
            ));
        }
        for (i, target) in self.updates.iter().enumerate() {
            validate_endpoint_name(target).map_err(|_| {
                Error::validation_with_context(
                    format!("invalid update target '{}'", target),
                    ErrorContext::new()
                        .with_field_path(format!("endpoints.{}.updates[{}]", name, i))
                        .with_source("endpoint_builder"),
                )
            })?;
        }
        Ok(())
    }

    /// Merge with library defaults into the immutable policy.
    pub fn resolve(&self, defaults: &PolicyDefaults) -> EndpointPolicy {
        let mut headers = defaults.headers.clone();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        EndpointPolicy {
            method: self.method,
            headers,
            body_as_params: self
                .body_as_params
                .or(defaults.body_as_params)
                .unwrap_or(false),
            prefer_cache_value: self
                .prefer_cache_value
                .or(defaults.prefer_cache_value)
                .unwrap_or(false),
            save_to_cache: self
                .save_to_cache
                .or(defaults.save_to_cache)
                .unwrap_or(false),
            updates: self.updates.clone(),
            success_condition: self
                .success_condition
                .clone()
                .or_else(|| defaults.success_condition.clone())
                .unwrap_or_else(|| Arc::new(|_: &Value| true)),
            transform_response: self
                .transform_response
                .clone()
                .or_else(|| defaults.transform_response.clone())
                .unwrap_or_else(|| Arc::new(|data: Value, _: Option<&Value>| data)),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body_as_params", &self.body_as_params)
            .field("prefer_cache_value", &self.prefer_cache_value)
            .field("save_to_cache", &self.save_to_cache)
            .field("updates", &self.updates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, AUTHORIZATION};
    use serde_json::json;

    #[test]
    fn test_library_defaults() {
        let policy = Endpoint::get("/users").resolve(&PolicyDefaults::default());
        assert_eq!(policy.method, Method::Get);
        assert!(!policy.prefer_cache_value);
        assert!(!policy.save_to_cache);
        assert!(!policy.body_as_params);
        assert!(policy.updates.is_empty());
        assert!(policy.check(&json!(null)));
        assert_eq!(policy.transform(json!({"a": 1}), None), json!({"a": 1}));
    }

    #[test]
    fn test_explicit_values_win() {
        let defaults = PolicyDefaults::new()
            .save_to_cache(true)
            .prefer_cache_value(true)
            .header(ACCEPT, HeaderValue::from_static("text/plain"))
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer default"))
            .success_condition(|_| false);

        let policy = Endpoint::post("/users")
            .save_to_cache(false)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .resolve(&defaults);

        assert!(!policy.save_to_cache);
        assert!(policy.prefer_cache_value);
        assert_eq!(policy.headers[ACCEPT], "application/json");
        assert_eq!(policy.headers[AUTHORIZATION], "Bearer default");
        assert!(!policy.check(&json!({})));
    }

    #[test]
    fn test_transform_receives_body() {
        let policy = Endpoint::post("/login")
            .transform_response(|data, body| json!({"data": data, "sent": body.cloned()}))
            .resolve(&PolicyDefaults::default());
        assert_eq!(
            policy.transform(json!(1), Some(&json!({"u": "a"}))),
            json!({"data": 1, "sent": {"u": "a"}})
        );
    }

    #[test]
    fn test_body_folding() {
        let d = PolicyDefaults::default();
        assert!(Endpoint::get("/a").resolve(&d).folds_body());
        assert!(!Endpoint::post("/a").resolve(&d).folds_body());
        assert!(Endpoint::post("/a").body_as_params(true).resolve(&d).folds_body());
    }

    #[test]
    fn test_validate() {
        assert!(Endpoint::get("/a").validate("getA").is_ok());
        assert!(Endpoint::get("  ").validate("getA").is_err());
        assert!(Endpoint::get("/a").validate("get&A").is_err());

        let err = Endpoint::post("/a")
            .updates(["ok", "bad&name"])
            .validate("createA")
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("endpoints.createA.updates[1]")
        );
    }
}
