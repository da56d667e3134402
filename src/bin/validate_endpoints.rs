//! Standalone binary to validate endpoint manifests.
//! Used by CI to ensure declaration files parse and reference known endpoints.
//!
//! Usage: `validate_endpoints <manifest.yaml|manifest.json>...`
//! With no arguments, `REST_KIT_MANIFEST` is used.

use anyhow::{bail, Context};
use rest_api_kit::endpoint::{accessor_name, EndpointManifest};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        let from_env = std::env::var("REST_KIT_MANIFEST")
            .context("no manifest given and REST_KIT_MANIFEST is not set")?;
        paths.push(PathBuf::from(from_env));
    }

    let mut errors = Vec::new();

    println!("=== Validating Endpoint Manifests ===");
    for path in &paths {
        print!("Validating {}... ", path.display());
        let outcome = EndpointManifest::from_path(path).and_then(|manifest| {
            manifest.validate()?;
            Ok(manifest)
        });
        match outcome {
            Ok(manifest) => {
                println!("✅ ({} endpoints)", manifest.endpoints.len());
                for (name, spec) in &manifest.endpoints {
                    println!(
                        "  {:<24} {:<7} {}  -> {}",
                        name,
                        spec.method,
                        spec.url,
                        accessor_name(name)
                    );
                }
            }
            Err(e) => {
                println!("❌");
                errors.push(format!("  {}: {}", path.display(), e));
            }
        }
    }

    println!("\n=== Summary ===");
    if errors.is_empty() {
        println!("✅ All endpoint manifests are valid!");
        return Ok(());
    }
    println!("❌ Found {} validation error(s):\n", errors.len());
    for err in &errors {
        println!("{}", err);
    }
    bail!("{} manifest(s) failed validation", errors.len())
}
