//! Performance benchmarks for castkit.
//!
//! Run with: cargo bench
//!
//! Covers the host-side work done for every extension before any JavaScript
//! runs: manifest parsing and directory discovery.

use std::fs;
use std::path::Path;

use castkit::extensions::{parse_manifest, read_manifest, scan, ExtensionKind, MANIFEST_FILE};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn write_extensions(root: &Path, count: usize) {
    for i in 0..count {
        let dir = root.join(format!("ext-{i}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!(r#"{{"name": "ext-{i}", "displayName": "Extension {i}", "version": "1.0.{i}"}}"#),
        )
        .unwrap();
    }
    // Noise that discovery has to skip.
    fs::create_dir_all(root.join("not-an-extension")).unwrap();
    fs::write(root.join("README.md"), "extensions").unwrap();
}

/// Benchmark converting an untyped manifest into a descriptor.
fn bench_parse_manifest(c: &mut Criterion) {
    let manifest = json!({
        "name": "podcast-index",
        "displayName": "Podcast Index",
        "version": "2.3.1",
        "main": "dist/index.js",
        "description": "Search the podcast index",
        "author": { "name": "Someone", "email": "someone@example.com" },
        "homepage": "https://example.com"
    });

    c.bench_function("parse_manifest", |b| {
        b.iter(|| {
            let descriptor = parse_manifest(
                black_box(&manifest),
                "/opt/castkit/extensions/podcast-index".into(),
                ExtensionKind::External,
            );
            black_box(descriptor)
        })
    });
}

/// Benchmark scanning extension roots of different sizes.
fn bench_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery");

    for count in [1, 10, 100] {
        let temp = tempfile::tempdir().unwrap();
        write_extensions(temp.path(), count);

        group.bench_with_input(BenchmarkId::new("scan", count), temp.path(), |b, root| {
            b.iter(|| black_box(scan(root).unwrap()))
        });

        group.bench_with_input(
            BenchmarkId::new("scan_and_read", count),
            temp.path(),
            |b, root| {
                b.iter(|| {
                    let descriptors: Vec<_> = scan(root)
                        .unwrap()
                        .iter()
                        .filter_map(|dir| read_manifest(dir, ExtensionKind::External).ok())
                        .collect();
                    black_box(descriptors)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse_manifest, bench_discovery);
criterion_main!(benches);
