//! Property tests: a wrapped target is indistinguishable from the raw one
//!
//! Uses proptest to verify that for arbitrary inputs, with any number of
//! pass-through interceptors stacked in front, results (including errors)
//! equal the raw target's.

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use interpose::InterceptorChain;
use proptest::prelude::*;

fn order_strategy() -> impl Strategy<Value = Order> {
    (any::<u64>(), -1_000i64..1_000).prop_map(|(id, amount)| Order { id, amount })
}

fn wrapped(depth: usize, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn OrderService> {
    let mut chain = InterceptorChain::new();
    for i in 0..depth {
        chain.add(Recorder::new(&format!("r{i}"), log).on(charge_signature()));
    }
    chain
        .plugin_surface::<dyn OrderService>(Arc::new(Payments::new(250)))
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: intercepted operations return what the target returns
    #[test]
    fn prop_charge_is_transparent(order in order_strategy(), depth in 0usize..4) {
        let raw = Payments::new(250);
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = wrapped(depth, &log);

        prop_assert_eq!(proxy.charge(order.clone()), OrderService::charge(&raw, order));
        prop_assert_eq!(log.lock().unwrap().len(), depth);
    }

    /// Property: operations nobody intercepts are forwarded unchanged
    #[test]
    fn prop_status_is_forwarded(order_id in any::<u64>(), depth in 1usize..4) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = wrapped(depth, &log);

        prop_assert_eq!(proxy.status(order_id), Payments::new(250).status(order_id));
        prop_assert!(log.lock().unwrap().is_empty());
    }
}
