//! Endpoint declarations.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Endpoint`] | Typed builder, one constructor per HTTP method |
//! | [`EndpointPolicy`] | Resolved, immutable per-endpoint policy |
//! | [`PolicyDefaults`] | Library-wide defaults merged under explicit values |
//! | [`EndpointManifest`] | YAML/JSON declaration file |

mod manifest;
mod method;
mod policy;

pub use manifest::{EndpointManifest, EndpointSpec, ManifestDefaults};
pub use method::Method;
pub use policy::{Endpoint, EndpointPolicy, PolicyDefaults, SuccessCondition, TransformResponse};

use crate::{Error, ErrorContext, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Accessor name of an endpoint: `use` followed by the name with its first
/// character upper-cased (`getUser` becomes `useGetUser`).
pub fn accessor_name(endpoint_name: &str) -> String {
    let mut chars = endpoint_name.chars();
    match chars.next() {
        Some(first) => format!("use{}{}", first.to_uppercase(), chars.as_str()),
        None => "use".to_string(),
    }
}

/// Every `updates` entry must name a declared endpoint, and no two endpoints
/// may share an accessor name.
pub(crate) fn check_update_targets<'a, I>(declarations: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a Endpoint)>,
{
    let declarations: Vec<(&str, &Endpoint)> = declarations.into_iter().collect();
    let names: BTreeSet<&str> = declarations.iter().map(|(n, _)| *n).collect();

    let mut accessors: BTreeMap<String, &str> = BTreeMap::new();
    for (name, endpoint) in &declarations {
        if let Some(previous) = accessors.insert(accessor_name(name), name) {
            return Err(Error::validation_with_context(
                format!(
                    "endpoints '{}' and '{}' map to the same accessor '{}'",
                    previous,
                    name,
                    accessor_name(name)
                ),
                ErrorContext::new()
                    .with_field_path(format!("endpoints.{}", name))
                    .with_source("endpoint_registry"),
            ));
        }
        for target in endpoint.update_targets() {
            if !names.contains(target.as_str()) {
                return Err(Error::validation_with_context(
                    format!("'{}' updates unknown endpoint '{}'", name, target),
                    ErrorContext::new()
                        .with_field_path(format!("endpoints.{}.updates", name))
                        .with_source("endpoint_registry"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_name() {
        assert_eq!(accessor_name("getUser"), "useGetUser");
        assert_eq!(accessor_name("login"), "useLogin");
        assert_eq!(accessor_name("ßeta"), "useSSeta");
    }

    #[test]
    fn test_colliding_accessors_are_rejected() {
        let a = Endpoint::get("/a");
        let b = Endpoint::get("/b");
        let err = check_update_targets([("user", &a), ("User", &b)]).unwrap_err();
        assert!(err.to_string().contains("useUser"));
    }

    #[test]
    fn test_update_targets_must_exist() {
        let list = Endpoint::get("/users");
        let create = Endpoint::post("/users").updates(["listUsers"]);
        assert!(check_update_targets([("listUsers", &list), ("createUser", &create)]).is_ok());
        assert!(check_update_targets([("createUser", &create)]).is_err());
    }
}
