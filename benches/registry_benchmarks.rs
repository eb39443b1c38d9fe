use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use script_bridge::{
    CallbackRegistry, Dispatcher, FetchBinding, FetchResponse, IdAllocator, ScriptValue,
};

fn benchmark_id_allocation(c: &mut Criterion) {
    let allocator = IdAllocator::default();
    c.bench_function("id_allocator_try_next", |b| {
        b.iter(|| black_box(allocator.try_next()))
    });
}

fn benchmark_registry_set_remove(c: &mut Criterion) {
    let registry: CallbackRegistry<u64> = CallbackRegistry::new("bench");
    let allocator = IdAllocator::default();
    c.bench_function("registry_set_remove", |b| {
        b.iter(|| {
            let id = allocator.next();
            registry.set(id, Arc::new(42));
            black_box(registry.remove(id))
        })
    });
}

fn benchmark_fetch_round_trip(c: &mut Criterion) {
    let binding = FetchBinding::new("__bench_fetch__", 0, Dispatcher::inline());
    let callback = ScriptValue::native("noop", |_: &[ScriptValue]| Ok(ScriptValue::Undefined));
    let args = [
        ScriptValue::from("http://bench"),
        ScriptValue::from(""),
        callback,
    ];
    c.bench_function("fetch_start_deliver_inline", |b| {
        b.iter(|| {
            if let Ok(id) = binding.start(&args) {
                black_box(binding.deliver(id, FetchResponse::ok(200, "")));
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_id_allocation,
    benchmark_registry_set_remove,
    benchmark_fetch_round_trip
);
criterion_main!(benches);
