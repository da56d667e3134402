//! Benchmarks for URL and cache key building
//!
//! This benchmark measures:
//! - Placeholder substitution with and without leftover query parameters
//! - Base URL resolution
//! - Cache identifier derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rest_api_kit::cache::{build_url, resolve_base_url, CacheKey, UrlParams};

fn bench_build_url(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_url");

    let path_only = UrlParams::new().with("org", "acme").with("id", 42);
    let with_query = UrlParams::new()
        .with("org", "acme")
        .with("id", 42)
        .with("q", "space separated & escaped")
        .with("page", 3)
        .with("limit", 50);

    group.bench_with_input(BenchmarkId::new("template", "path_only"), &path_only, |b, p| {
        b.iter(|| build_url(black_box("/orgs/:org/users/:id"), p))
    });
    group.bench_with_input(BenchmarkId::new("template", "with_query"), &with_query, |b, p| {
        b.iter(|| build_url(black_box("/orgs/:org/users/:id"), p))
    });
    group.bench_with_input(BenchmarkId::new("template", "no_placeholders"), &with_query, |b, p| {
        b.iter(|| build_url(black_box("/search"), p))
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    group.bench_function("resolve_relative", |b| {
        b.iter(|| {
            resolve_base_url(black_box("/users/1"), Some("https://api.example.com/")).unwrap()
        })
    });
    group.bench_function("resolve_absolute", |b| {
        b.iter(|| resolve_base_url(black_box("https://other.example.com/users"), None).unwrap())
    });
    group.bench_function("cache_key", |b| {
        b.iter(|| CacheKey::for_endpoint(Some(black_box("https://api.example.com")), "getUser"))
    });

    group.finish();
}

criterion_group!(benches, bench_build_url, bench_resolution);
criterion_main!(benches);
