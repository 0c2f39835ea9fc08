//! Property-based tests for the scheduler and controller.
//!
//! Uses proptest to generate random module sets, rates and storage layouts,
//! then verify the pass invariants hold.

use proptest::prelude::*;
use resched_core::controller::{disperse, gather};
use resched_core::module::Module;
use resched_core::overrides::OverrideFlags;
use resched_core::pool::ResourcePool;
use resched_core::priority::ResourcePriority;
use resched_core::resource::ResourceName;
use resched_core::scheduler::{Scheduler, TickContext};
use resched_core::storage::StorageUnit;
use resched_core::test_utils::*;
use std::cell::RefCell;
use std::rc::Rc;

const EC: ResourceName = ResourceName::ElectricCharge;

// ===========================================================================
// Generators
// ===========================================================================

/// (packed priority bits, signals topology change)
fn arb_modules(max: usize) -> impl Strategy<Value = Vec<(u8, bool)>> {
    proptest::collection::vec(
        (prop_oneof![1..=5u8, (1..=5u8).prop_map(|t| t | 0x80)], any::<bool>()),
        1..=max,
    )
}

fn arb_units(max: usize) -> impl Strategy<Value = Vec<StorageUnit>> {
    proptest::collection::vec(
        (
            prop_oneof![
                Just("ElectricCharge"),
                Just("LiquidFuel"),
                Just("WasteHeat"),
                Just("Kethane"),
            ],
            0.0..100.0f64,
            0.0..100.0f64,
        )
            .prop_map(|(name, amount, capacity)| {
                StorageUnit::new(name, amount.min(capacity), capacity)
            }),
        0..=max,
    )
}

fn ctx(dt: f64) -> TickContext {
    TickContext::new(dt, OverrideFlags::none())
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A producer emitting `p` for `dt` seconds adds exactly `p * dt`.
    #[test]
    fn production_is_linear(p in 0.0..1000.0f64, dt in 0.0..100.0f64) {
        let mut sched = Scheduler::default();
        sched.register(Box::new(
            TestModule::new("producer", ResourcePriority::default()).on_update(move |rm| {
                rm.produce(EC, p);
                Ok(())
            }),
        ));
        let mut pool = ResourcePool::new();
        sched.run_pass(ctx(dt), &mut pool).unwrap();
        prop_assert!((pool.amount(EC) - p * dt).abs() <= 1e-9 * (1.0 + p * dt));
    }

    /// Grants are never negative and never exceed the request; the pool
    /// never goes negative.
    #[test]
    fn grants_are_bounded(
        start in 0.0..50.0f64,
        requests in proptest::collection::vec(0.0..20.0f64, 1..10),
        dt in 0.01..5.0f64,
    ) {
        let granted = Rc::new(RefCell::new(Vec::new()));
        let g = granted.clone();
        let reqs = requests.clone();
        let mut sched = Scheduler::default();
        sched.register(Box::new(
            TestModule::new("consumer", ResourcePriority::default()).on_update(move |rm| {
                for r in &reqs {
                    g.borrow_mut().push(rm.consume(EC, *r));
                }
                Ok(())
            }),
        ));
        let mut pool = ResourcePool::new().with_amount(EC, start);
        sched.run_pass(ctx(dt), &mut pool).unwrap();

        for (grant, request) in granted.borrow().iter().zip(&requests) {
            prop_assert!(*grant >= 0.0);
            prop_assert!(*grant <= *request);
        }
        prop_assert!(pool.amount(EC) >= 0.0);
        let total: f64 = granted.borrow().iter().sum::<f64>() * dt;
        prop_assert!(total <= start / 0.9999 + 1e-9);
    }

    /// Every module runs exactly once per pass, whatever restarts occur,
    /// and the run order respects tier and supplier-only ordering.
    #[test]
    fn modules_run_once_in_priority_order(modules in arb_modules(12)) {
        let log = CallLog::default();
        let mut sched = Scheduler::default();
        let mut expected: Vec<(ResourcePriority, usize)> = Vec::new();
        for (i, &(bits, signals)) in modules.iter().enumerate() {
            let priority = ResourcePriority::from_bits(bits);
            let mut module = TestModule::new(&format!("m{i}"), priority).with_log(&log);
            if signals {
                module = module.on_update(|rm| {
                    rm.signal_topology_changed();
                    Ok(())
                });
            }
            sched.register(Box::new(module) as Box<dyn Module>);
            expected.push((priority, i));
        }
        expected.sort_by_key(|(p, i)| (p.sort_key(), *i));

        let report = sched.run_pass(ctx(1.0), &mut ResourcePool::new()).unwrap();
        let entries = log.entries();
        prop_assert_eq!(entries.len(), modules.len());
        prop_assert_eq!(report.modules_run, modules.len());
        let order: Vec<String> = expected.iter().map(|(_, i)| format!("update:m{i}")).collect();
        prop_assert_eq!(entries, order);
    }

    /// With no modules, gather then disperse puts every unit back as it was.
    #[test]
    fn gather_disperse_conserves(units in arb_units(8)) {
        let before = units.clone();
        let mut units = units;
        let mut pool = gather(&mut units);
        let leftovers = disperse(&mut pool, &mut units);

        let total = |us: &[StorageUnit], name: &str| -> f64 {
            us.iter().filter(|u| u.resource == name).map(|u| u.amount).sum()
        };
        for name in ["ElectricCharge", "LiquidFuel", "WasteHeat", "Kethane"] {
            prop_assert!((total(&before, name) - total(&units, name)).abs() < 1e-9);
        }
        prop_assert!(leftovers.values().all(|a| *a < 1e-9));
        for unit in &units {
            prop_assert!(unit.amount <= unit.capacity + 1e-9);
        }
    }
}
