//! Performance benchmarks for adapter resolution.
//!
//! Resolution runs on every dispatched device call, so it must stay cheap
//! with a realistic number of registered vendors.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench registry_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fleetlink_adapter::AdapterRegistry;
use fleetlink_adapter::mock::MockAdapter;
use fleetlink_core::{Device, DeviceType};
use std::hint::black_box;
use std::sync::Arc;

fn registry_with(count: usize) -> AdapterRegistry {
    let registry = AdapterRegistry::new();
    for i in 0..count {
        let (adapter, _handle) = MockAdapter::new(format!("VENDOR{i}"), DeviceType::Access);
        registry.register(&format!("VENDOR{i}"), Arc::new(adapter));
    }
    registry
}

/// Benchmark resolving by tag for growing registry sizes.
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(1));

    for size in [4usize, 16, 64] {
        let registry = registry_with(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(registry.resolve(black_box("vendor3")).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark the capability scan used when the protocol tag does not match.
fn bench_resolve_for_device(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_for_device");
    group.throughput(Throughput::Elements(1));

    let registry = registry_with(16);
    let device = Device::new("ACC-01", DeviceType::Access, "UNREGISTERED").with_manufacturer("VENDOR7");

    group.bench_function("capability_scan", |b| {
        b.iter(|| black_box(registry.resolve_for_device(black_box(&device)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_resolve_for_device);
criterion_main!(benches);
