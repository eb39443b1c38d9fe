//! Property checks for id allocation, the callback registry and fetch delivery

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::{fetch_args, Recorder, RecordingTransport};
use proptest::prelude::*;
use script_bridge::{
    constants::globals, CallbackRegistry, Dispatcher, FetchBinding, FetchResponse, IdAllocator,
    ScriptValue, WebSocketBinding, MAX_SAFE_TOKEN,
};

#[derive(Debug, Clone)]
enum RegistryOp {
    Set(i64, u32),
    Get(i64),
    Remove(i64),
    Reset,
}

fn registry_op_strategy() -> impl Strategy<Value = RegistryOp> {
    let id = 0i64..16;
    prop_oneof![
        4 => (id.clone(), any::<u32>()).prop_map(|(id, v)| RegistryOp::Set(id, v)),
        3 => id.clone().prop_map(RegistryOp::Get),
        3 => id.prop_map(RegistryOp::Remove),
        1 => Just(RegistryOp::Reset),
    ]
}

proptest! {
    /// Property: ids from concurrent callers are pairwise distinct
    #[test]
    fn concurrent_ids_are_unique(threads in 2usize..8, per_thread in 1usize..200, base in 0i64..1_000) {
        let allocator = Arc::new(IdAllocator::new(base));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || {
                    (0..per_thread).map(|_| allocator.next()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                prop_assert!(id >= base);
                prop_assert!(seen.insert(id), "id {} handed out twice", id);
            }
        }
        prop_assert_eq!(seen.len(), threads * per_thread);
    }

    /// Property: the registry behaves like a plain map under any op sequence
    #[test]
    fn registry_matches_map_model(ops in prop::collection::vec(registry_op_strategy(), 0..64)) {
        let registry: CallbackRegistry<u32> = CallbackRegistry::new("model");
        let mut model: HashMap<i64, u32> = HashMap::new();

        for op in ops {
            match op {
                RegistryOp::Set(id, value) => {
                    registry.set(id, Arc::new(value));
                    model.insert(id, value);
                }
                RegistryOp::Get(id) => {
                    prop_assert_eq!(registry.get(id).map(|v| *v), model.get(&id).copied());
                }
                RegistryOp::Remove(id) => {
                    prop_assert_eq!(registry.remove(id).map(|v| *v), model.remove(&id));
                }
                RegistryOp::Reset => {
                    prop_assert_eq!(registry.reset(), model.len());
                    model.clear();
                }
            }
            prop_assert_eq!(registry.len(), model.len());
        }
    }

    /// Property: however often an id is delivered, its callback runs once
    #[test]
    fn fetch_callbacks_run_at_most_once(
        started in 1usize..20,
        deliveries in prop::collection::vec(0i64..30, 0..60),
    ) {
        let binding = FetchBinding::new(globals::FETCH, 0, Dispatcher::inline());
        binding.set_transport(RecordingTransport::new());
        let recorder = Recorder::new();
        for _ in 0..started {
            binding.start(&fetch_args("http://x", "", recorder.callback("done"))).unwrap();
        }

        let mut expected = HashSet::new();
        for id in deliveries {
            let delivered = binding.deliver(id, FetchResponse::ok(200, ""));
            let first_time = id < started as i64 && expected.insert(id);
            prop_assert_eq!(delivered, first_time);
        }
        prop_assert_eq!(recorder.count(), expected.len());
        prop_assert_eq!(binding.pending_count(), started - expected.len());
    }

    /// Property: non-integral or out-of-range socket tokens never reach the transport
    #[test]
    fn invalid_tokens_are_rejected(token in prop_oneof![
        (-1.0e12f64..-1.0),
        (0.0f64..1.0e6).prop_filter("fractional", |t| t.fract() != 0.0),
        Just(MAX_SAFE_TOKEN as f64 * 2.0),
        Just(f64::NAN),
        Just(f64::INFINITY),
    ]) {
        let binding = WebSocketBinding::new(globals::WEBSOCKET, 0, Dispatcher::inline());
        let transport = RecordingTransport::new();
        binding.set_transport(transport.clone());

        let result = binding.send(&[ScriptValue::Number(token), ScriptValue::from("m")]);
        prop_assert!(result.is_err());
        prop_assert!(transport.calls().is_empty());
    }
}

#[test]
fn test_allocator_stops_at_ceiling() {
    let allocator = IdAllocator::new(MAX_SAFE_TOKEN);
    assert_eq!(allocator.try_next(), Some(MAX_SAFE_TOKEN));
    assert_eq!(allocator.try_next(), None);
}
