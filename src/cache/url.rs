//! URL formatting: base URL resolution, path placeholders and query strings.

use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/:([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder pattern is valid"));

/// Ordered request parameters used for path placeholders and query strings.
///
/// Iteration order is insertion order, which is also the order of the
/// generated query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams(Vec<(String, String)>);

impl UrlParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append every entry of `other`, `other` winning on duplicate keys.
    pub fn extend(&mut self, other: &UrlParams) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    /// Flatten a JSON object into parameters.
    ///
    /// Strings are taken verbatim, `null` members are skipped and any other
    /// value is rendered as compact JSON. Non-object values yield no parameters.
    pub fn from_json(value: &Value) -> Self {
        let mut params = Self::new();
        if let Value::Object(map) = value {
            for (k, v) in map {
                match v {
                    Value::Null => {}
                    Value::String(s) => params.insert(k.clone(), s),
                    other => params.insert(k.clone(), other),
                }
            }
        }
        params
    }
}

impl<K, V> FromIterator<(K, V)> for UrlParams
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Percent-encode a single path segment or query value.
pub fn encode_component(value: &str) -> String {
    ::url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Render `template` with `params`.
///
/// Each `/:name` placeholder whose name is present in `params` is replaced by
/// the encoded value; remaining parameters are appended as a query string in
/// parameter order. Placeholders without a matching parameter are left as is.
pub fn build_url(template: &str, params: &UrlParams) -> String {
    let mut consumed: Vec<&str> = Vec::new();
    let path = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        match params.iter().find(|(k, _)| *k == name) {
            Some((k, v)) => {
                consumed.push(k);
                format!("/{}", encode_component(v))
            }
            None => caps[0].to_string(),
        }
    });

    let query = params
        .iter()
        .filter(|(k, _)| !consumed.contains(k))
        .map(|(k, v)| format!("{}={}", k, encode_component(v)))
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        path.into_owned()
    } else if path.contains('?') {
        format!("{}&{}", path, query)
    } else {
        format!("{}?{}", path, query)
    }
}

/// True when `candidate` carries a URI scheme.
pub fn is_absolute_url(candidate: &str) -> bool {
    ::url::Url::parse(candidate).is_ok()
}

/// Make `url` absolute against `base_url`.
///
/// Absolute URLs are returned unchanged. Relative ones are joined to the base
/// with exactly one `/` between them.
pub fn resolve_base_url(url: &str, base_url: Option<&str>) -> Result<String> {
    if is_absolute_url(url) {
        return Ok(url.to_string());
    }

    let base = base_url.map(str::trim).filter(|b| !b.is_empty()).ok_or_else(|| {
        Error::configuration_with_context(
            format!("relative URL '{}' requires a base URL", url),
            ErrorContext::new()
                .with_field_path("base_url")
                .with_source("resolve_base_url"),
        )
    })?;

    if !is_absolute_url(base) {
        return Err(Error::configuration_with_context(
            format!("base URL '{}' is not an absolute URL", base),
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details("expected a scheme such as https://")
                .with_source("resolve_base_url"),
        ));
    }

    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    ))
}
