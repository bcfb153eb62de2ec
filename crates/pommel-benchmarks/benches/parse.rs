//! Descriptor parsing and interpolation benchmarks
//!
//! Measures XML parsing of descriptors of growing size and the cost of
//! resolving their `${...}` placeholders.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pommel_benchmarks::{criterion_config, descriptor_text};
use pommel_pom::{implicit_properties, Descriptor, Interpolator, PropertyScope};

fn bench_descriptor_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_parsing");
    group.measurement_time(std::time::Duration::from_secs(5));

    for dep_count in [10, 100, 500].iter() {
        group.throughput(Throughput::Elements(*dep_count as u64));
        let text = descriptor_text(*dep_count);

        group.bench_with_input(BenchmarkId::new("dependencies", dep_count), &text, |b, text| {
            b.iter(|| black_box(Descriptor::parse(text, "bench.xml").unwrap()));
        });
    }

    group.finish();
}

fn bench_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation");
    group.measurement_time(std::time::Duration::from_secs(5));

    for dep_count in [10, 100, 500].iter() {
        group.throughput(Throughput::Elements(*dep_count as u64));
        let descriptor = Descriptor::parse(&descriptor_text(*dep_count), "bench.xml").unwrap();
        let scope = PropertyScope::new()
            .with_implicit(implicit_properties(&descriptor, "20240101-0000"))
            .with_declared(descriptor.properties.clone());

        group.bench_with_input(BenchmarkId::new("dependencies", dep_count), &descriptor, |b, descriptor| {
            b.iter(|| black_box(Interpolator::new(&scope).descriptor(descriptor)));
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_descriptor_parsing, bench_interpolation
}
criterion_main!(benches);
