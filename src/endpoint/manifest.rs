//! Declarative endpoint manifests (YAML or JSON).
//!
//! ```yaml
//! base_url: https://api.example.com
//! defaults:
//!   headers:
//!     accept: application/json
//!   save_to_cache: true
//! endpoints:
//!   getUser:
//!     url: /users/:id
//!     prefer_cache_value: true
//!   renameUser:
//!     url: /users/:id
//!     method: PATCH
//!     updates: [getUser]
//! ```
//!
//! Unknown fields are rejected when the manifest is parsed. Response checks
//! and transforms are code and can only be attached through the typed
//! [`Endpoint`] builder.

use super::{Endpoint, Method, PolicyDefaults};
use crate::{Error, ErrorContext, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub defaults: ManifestDefaults,
    pub endpoints: BTreeMap<String, EndpointSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestDefaults {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_as_params: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_cache_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_to_cache: Option<bool>,
}

/// One endpoint entry of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSpec {
    pub url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_as_params: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_cache_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_to_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<String>,
}

impl EndpointManifest {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a file; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn policy_defaults(&self) -> Result<PolicyDefaults> {
        Ok(PolicyDefaults {
            headers: header_map(&self.defaults.headers, "defaults.headers")?,
            body_as_params: self.defaults.body_as_params,
            prefer_cache_value: self.defaults.prefer_cache_value,
            save_to_cache: self.defaults.save_to_cache,
            success_condition: None,
            transform_response: None,
        })
    }

    /// Convert every entry into a typed [`Endpoint`] declaration.
    pub fn endpoints(&self) -> Result<Vec<(String, Endpoint)>> {
        self.endpoints
            .iter()
            .map(|(name, spec)| {
                let headers = header_map(&spec.headers, &format!("endpoints.{}.headers", name))?;
                let mut endpoint = Endpoint::new(spec.method, spec.url.clone())
                    .headers(headers)
                    .updates(spec.updates.iter().cloned());
                if let Some(v) = spec.body_as_params {
                    endpoint = endpoint.body_as_params(v);
                }
                if let Some(v) = spec.prefer_cache_value {
                    endpoint = endpoint.prefer_cache_value(v);
                }
                if let Some(v) = spec.save_to_cache {
                    endpoint = endpoint.save_to_cache(v);
                }
                endpoint.validate(name)?;
                Ok((name.clone(), endpoint))
            })
            .collect()
    }

    /// Parse-level and cross-entry checks, without building anything.
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = &self.base_url {
            if !crate::cache::is_absolute_url(base) {
                return Err(Error::configuration_with_context(
                    format!("base URL '{}' is not absolute", base),
                    ErrorContext::new()
                        .with_field_path("base_url")
                        .with_source("endpoint_manifest"),
                ));
            }
        }
        self.policy_defaults()?;
        let endpoints = self.endpoints()?;
        super::check_update_targets(endpoints.iter().map(|(n, e)| (n.as_str(), e)))
    }
}

fn header_map(raw: &BTreeMap<String, String>, field: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(raw.len());
    for (name, value) in raw {
        let invalid = |what: &str| {
            Error::validation_with_context(
                format!("invalid header {} '{}'", what, name),
                ErrorContext::new()
                    .with_field_path(format!("{}.{}", field, name))
                    .with_source("endpoint_manifest"),
            )
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid("name"))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid("value"))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
base_url: https://api.example.com
defaults:
  headers:
    accept: application/json
  save_to_cache: true
endpoints:
  getUser:
    url: /users/:id
    prefer_cache_value: true
  renameUser:
    url: /users/:id
    method: PATCH
    save_to_cache: false
    updates: [getUser]
"#;

    #[test]
    fn test_parse_yaml_manifest() {
        let manifest = EndpointManifest::from_yaml_str(MANIFEST).unwrap();
        assert_eq!(manifest.base_url.as_deref(), Some("https://api.example.com"));
        manifest.validate().unwrap();

        let defaults = manifest.policy_defaults().unwrap();
        let endpoints = manifest.endpoints().unwrap();
        assert_eq!(endpoints.len(), 2);

        let (name, get_user) = &endpoints[0];
        assert_eq!(name, "getUser");
        let policy = get_user.resolve(&defaults);
        assert_eq!(policy.method, Method::Get);
        assert!(policy.prefer_cache_value);
        assert!(policy.save_to_cache);
        assert_eq!(policy.headers["accept"], "application/json");

        let rename = endpoints[1].1.resolve(&defaults);
        assert_eq!(rename.method, Method::Patch);
        assert!(!rename.save_to_cache);
        assert_eq!(rename.updates, vec!["getUser".to_string()]);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = EndpointManifest::from_yaml_str(
            "endpoints:\n  a:\n    url: /a\n    cache_forever: true\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));

        let err =
            EndpointManifest::from_json_str(r#"{"endpoints": {}, "retries": 3}"#).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_unknown_update_target() {
        let manifest = EndpointManifest::from_yaml_str(
            "endpoints:\n  a:\n    url: /a\n    method: POST\n    updates: [missing]\n",
        )
        .unwrap();
        let err = manifest.validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("endpoints.a.updates")
        );
    }

    #[test]
    fn test_invalid_header_name() {
        let manifest = EndpointManifest::from_yaml_str(
            "endpoints:\n  a:\n    url: /a\n    headers:\n      \"bad header\": x\n",
        )
        .unwrap();
        assert!(manifest.endpoints().is_err());
    }

    #[test]
    fn test_relative_base_url_is_rejected() {
        let manifest =
            EndpointManifest::from_yaml_str("base_url: api/v1\nendpoints:\n  a:\n    url: /a\n")
                .unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_from_path_picks_format() {
        let dir = std::env::temp_dir().join(format!("rest-api-kit-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let json_path = dir.join("endpoints.json");
        std::fs::write(&json_path, r#"{"endpoints": {"a": {"url": "/a"}}}"#).unwrap();
        let yaml_path = dir.join("endpoints.yaml");
        std::fs::write(&yaml_path, MANIFEST).unwrap();

        assert_eq!(EndpointManifest::from_path(&json_path).unwrap().endpoints.len(), 1);
        assert_eq!(EndpointManifest::from_path(&yaml_path).unwrap().endpoints.len(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
