//! Resolution benchmarks
//!
//! Measures cold builds over provider chains of growing depth, warm cache
//! hits and group assembly.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use graft_core::container::instance;
use graft_core::{Container, ProvideOptions, Provider, TypeKey};

/// Register `depth` providers where link `i` consumes link `i - 1`
fn linear_chain(depth: usize) -> Container {
    let container = Container::new();

    for i in 0..depth {
        let key = TypeKey::named::<u64>(format!("link{}", i));
        let mut builder = Provider::builder(format!("new_link{}", i)).result(key);
        if i > 0 {
            let previous = TypeKey::named::<u64>(format!("link{}", i - 1));
            let lookup = previous.clone();
            builder = builder.param(previous).call(move |values| {
                let value = values[0].as_ref().ok_or("missing link")?.downcast::<u64>(&lookup)?;
                Ok(vec![instance(*value + 1)])
            });
        } else {
            builder = builder.call(|_| Ok(vec![instance(0u64)]));
        }
        container.register(builder.build()).unwrap();
    }

    container
}

fn benchmark_cold_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_resolution");

    for depth in [10, 50, 200].iter() {
        group.bench_with_input(BenchmarkId::new("linear_chain", depth), depth, |b, &depth| {
            let tip = TypeKey::named::<u64>(format!("link{}", depth - 1));
            b.iter(|| {
                let container = linear_chain(depth);
                black_box(container.get_key(&tip).unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_cached_get(c: &mut Criterion) {
    let container = linear_chain(50);
    let tip = TypeKey::named::<u64>("link49");
    container.get_key(&tip).unwrap();

    c.bench_function("cached_get", |b| {
        b.iter(|| black_box(container.get_key(&tip).unwrap()));
    });

    let request = container.scope("request").unwrap();
    c.bench_function("cached_get_from_child_scope", |b| {
        b.iter(|| black_box(request.get_key(&tip).unwrap()));
    });
}

fn benchmark_group_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_assembly");

    for members in [8, 64].iter() {
        group.bench_with_input(BenchmarkId::new("members", members), members, |b, &members| {
            b.iter(|| {
                let container = Container::new();
                for index in 0..members {
                    container
                        .provide_with(ProvideOptions::new().group("plugins"), move || index)
                        .unwrap();
                }
                let plugins: Vec<Arc<usize>> = container.get_group("plugins").unwrap();
                black_box(plugins);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_cold_resolution,
    benchmark_cached_get,
    benchmark_group_assembly
);

criterion_main!(benches);
