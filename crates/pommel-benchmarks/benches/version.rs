//! Version ordering and selection benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pommel_benchmarks::{criterion_config, version_strings};
use pommel_core::{Version, VersionRange};
use pommel_resolver::VersionSelector;

fn bench_version_parsing(c: &mut Criterion) {
    let versions = version_strings(1000);
    let mut index = 0;

    c.bench_function("version_parsing", |b| {
        b.iter(|| {
            let text = &versions[index % versions.len()];
            index += 1;
            black_box(Version::parse(text))
        });
    });
}

fn bench_version_sorting(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_sorting");

    for count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        let versions: Vec<Version> = version_strings(*count)
            .iter()
            .map(|text| Version::parse(text).unwrap())
            .collect();

        group.bench_with_input(BenchmarkId::new("versions", count), &versions, |b, versions| {
            b.iter(|| {
                let mut sorted = versions.clone();
                sorted.sort();
                black_box(sorted)
            });
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_selection");
    let versions: Vec<Version> = version_strings(500)
        .iter()
        .map(|text| Version::parse(text).unwrap())
        .collect();

    for expression in ["[1.0,4.0)", "(,3.5],[5.0,)", "LATEST", "RELEASE", "1.x"] {
        let selector = VersionSelector::parse(expression).unwrap();
        group.bench_with_input(BenchmarkId::new("select", expression), &selector, |b, selector| {
            b.iter(|| black_box(selector.select(&versions, None, true)));
        });
    }

    let range = VersionRange::parse("[1.2,5.0-SNAPSHOT)").unwrap();
    group.bench_function("range_contains", |b| {
        b.iter(|| black_box(versions.iter().filter(|v| range.contains(v)).count()));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_version_parsing, bench_version_sorting, bench_selection
}
criterion_main!(benches);
