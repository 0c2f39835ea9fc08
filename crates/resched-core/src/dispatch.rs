//! Supplier dispatch: on-demand top-up when a consume request falls short.

use crate::id::ModuleId;
use crate::resource::ResourceName;
use crate::scheduler::{CONSUME_TOLERANCE, Scheduler, guarded};

impl Scheduler {
    /// Ask the suppliers of `resource` to cover a shortfall.
    ///
    /// `rate` is the original per-second request, `requested` the absolute
    /// amount it stands for and `obtained` what has been drawn so far.
    /// Suppliers are visited in execution order. Each one runs its own
    /// update first if it has not yet run this pass, then is asked to
    /// provide the remaining rate; its production is drawn back out of the
    /// pool. Returns the total obtained, never more than `requested`.
    pub(crate) fn dispatch(
        &mut self,
        resource: ResourceName,
        rate: f64,
        requested: f64,
        mut obtained: f64,
    ) -> f64 {
        let suppliers: Vec<ModuleId> = self.registry.suppliers_for(resource).to_vec();

        for id in suppliers {
            if obtained >= requested * CONSUME_TOLERANCE {
                break;
            }
            let Some(pass) = self.pass.as_ref() else {
                break;
            };
            if pass.run.exhausted.contains(&id) {
                continue;
            }
            if pass.run.executing.contains(&id) {
                self.report_reentrancy(id);
                continue;
            }

            if !pass.run.updated.contains(&id) {
                if let Err(err) = self.run_update(id) {
                    self.defer(err);
                }
                obtained += self.redraw(resource, requested - obtained);
                if obtained >= requested * CONSUME_TOLERANCE {
                    break;
                }
            }

            let shortfall_rate = rate * (1.0 - obtained / requested);
            self.provide(id, resource, shortfall_rate);
            obtained += self.redraw(resource, requested - obtained);
        }

        obtained
    }

    /// Make one provide call, isolating any failure.
    fn provide(&mut self, id: ModuleId, resource: ResourceName, rate: f64) {
        let Some(mut module) = self.registry.take(id) else {
            return;
        };
        self.enter(id);
        let result = guarded(|| match module.as_supplier_mut() {
            Some(supplier) => supplier.provide(self, resource, rate),
            None => Ok(false),
        });
        self.leave(id);

        if let Some(pass) = self.pass.as_mut() {
            pass.report.supplier_calls += 1;
            if matches!(result, Ok(false)) {
                pass.run.exhausted.insert(id);
            }
        }
        let name = module.name().to_string();
        self.registry.restore(id, module);

        if let Err(err) = self.handle_fault(id, name, result) {
            self.defer(err);
        }
    }

    fn redraw(&mut self, resource: ResourceName, max: f64) -> f64 {
        match self.pass.as_mut() {
            Some(pass) => pass.pool.draw(resource, max),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::module::ModuleError;
    use crate::overrides::OverrideFlags;
    use crate::pool::ResourcePool;
    use crate::priority::{PriorityTier, ResourcePriority};
    use crate::resource::ResourceName;
    use crate::scheduler::{FaultPolicy, PassError, Scheduler, TickContext};
    use crate::test_utils::{CallLog, TestModule, TestSupplier};
    use std::cell::RefCell;
    use std::rc::Rc;

    const EC: ResourceName = ResourceName::ElectricCharge;

    fn ctx(dt: f64) -> TickContext {
        TickContext::new(dt, OverrideFlags::none())
    }

    fn recorder(
        name: &str,
        tier: PriorityTier,
        requests: Vec<f64>,
        granted: &Rc<RefCell<Vec<f64>>>,
        log: &CallLog,
    ) -> TestModule {
        let granted = granted.clone();
        TestModule::new(name, ResourcePriority::new(tier))
            .with_log(log)
            .on_update(move |rm| {
                for r in &requests {
                    granted.borrow_mut().push(rm.consume(EC, *r));
                }
                Ok(())
            })
    }

    #[test]
    fn no_suppliers_keeps_what_was_drawn() {
        let granted = Rc::new(RefCell::new(Vec::new()));
        let log = CallLog::default();
        let mut sched = Scheduler::default();
        sched.register(Box::new(recorder(
            "consumer",
            PriorityTier::First,
            vec![4.0],
            &granted,
            &log,
        )));
        let mut pool = ResourcePool::new().with_amount(EC, 1.0);
        sched.run_pass(ctx(1.0), &mut pool).unwrap();
        assert_eq!(*granted.borrow(), vec![1.0]);
    }

    #[test]
    fn supplier_updates_lazily_then_runs_dry() {
        let granted = Rc::new(RefCell::new(Vec::new()));
        let log = CallLog::default();
        let mut sched = Scheduler::default();
        sched.register(Box::new(recorder(
            "consumer",
            PriorityTier::First,
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0],
            &granted,
            &log,
        )));
        let supplier = sched.register(Box::new(
            TestSupplier::new("fuel-cell", ResourcePriority::new(PriorityTier::Second), EC, 5.0)
                .with_log(&log),
        ));

        let report = sched.run_pass(ctx(1.0), &mut ResourcePool::new()).unwrap();
        assert_eq!(*granted.borrow(), vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);

        let entries = log.entries();
        assert_eq!(entries[0], "update:consumer");
        assert_eq!(entries[1], "update:fuel-cell");
        assert_eq!(entries[2], "provide:fuel-cell");
        assert_eq!(
            entries.iter().filter(|e| *e == "update:fuel-cell").count(),
            1
        );
        // Exhausted on its fifth provide, so the sixth request never reaches it.
        assert_eq!(report.supplier_calls, 5);
        assert_eq!(sched.registry().get::<TestSupplier>(supplier).unwrap().updates(), 1);
    }

    #[test]
    fn suppliers_are_asked_in_order_until_satisfied() {
        let granted = Rc::new(RefCell::new(Vec::new()));
        let log = CallLog::default();
        let mut sched = Scheduler::default();
        sched.register(Box::new(recorder(
            "consumer",
            PriorityTier::First,
            vec![3.0],
            &granted,
            &log,
        )));
        sched.register(Box::new(
            TestSupplier::new("small", ResourcePriority::new(PriorityTier::Second), EC, 1.0)
                .with_log(&log),
        ));
        sched.register(Box::new(
            TestSupplier::new("large", ResourcePriority::new(PriorityTier::Third), EC, 10.0)
                .with_log(&log),
        ));
        sched.register(Box::new(
            TestSupplier::new("unused", ResourcePriority::new(PriorityTier::Fourth), EC, 10.0)
                .with_log(&log),
        ));

        sched.run_pass(ctx(1.0), &mut ResourcePool::new()).unwrap();
        assert_eq!(*granted.borrow(), vec![3.0]);
        let provides: Vec<String> = log
            .entries()
            .into_iter()
            .filter(|e| e.starts_with("provide:"))
            .collect();
        assert_eq!(provides, vec!["provide:small", "provide:large"]);
    }

    #[test]
    fn lazy_update_production_is_used_before_provide() {
        let granted = Rc::new(RefCell::new(Vec::new()));
        let log = CallLog::default();
        let mut sched = Scheduler::default();
        sched.register(Box::new(recorder(
            "consumer",
            PriorityTier::First,
            vec![1.0],
            &granted,
            &log,
        )));
        sched.register(Box::new(
            TestSupplier::new("rtg", ResourcePriority::new(PriorityTier::Second), EC, 0.0)
                .with_log(&log)
                .on_update(|rm| {
                    rm.produce(EC, 2.0);
                    Ok(())
                }),
        ));
        let mut pool = ResourcePool::new();
        let report = sched.run_pass(ctx(1.0), &mut pool).unwrap();
        assert_eq!(*granted.borrow(), vec![1.0]);
        assert_eq!(report.supplier_calls, 0);
        assert!((pool.amount(EC) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn failing_supplier_is_skipped() {
        let granted = Rc::new(RefCell::new(Vec::new()));
        let log = CallLog::default();
        let mut sched = Scheduler::default();
        sched.register(Box::new(recorder(
            "consumer",
            PriorityTier::First,
            vec![2.0],
            &granted,
            &log,
        )));
        sched.register(Box::new(
            TestSupplier::new("broken", ResourcePriority::new(PriorityTier::Second), EC, 5.0)
                .fail_provide("valve stuck"),
        ));
        sched.register(Box::new(TestSupplier::new(
            "backup",
            ResourcePriority::new(PriorityTier::Third),
            EC,
            5.0,
        )));
        let report = sched.run_pass(ctx(1.0), &mut ResourcePool::new()).unwrap();
        assert_eq!(*granted.borrow(), vec![2.0]);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].name, "broken");
    }

    #[test]
    fn strict_mode_fails_pass_after_supplier_fault() {
        let granted = Rc::new(RefCell::new(Vec::new()));
        let log = CallLog::default();
        let mut sched = Scheduler::new(FaultPolicy::Strict);
        sched.register(Box::new(recorder(
            "consumer",
            PriorityTier::First,
            vec![2.0],
            &granted,
            &log,
        )));
        sched.register(Box::new(
            TestSupplier::new("broken", ResourcePriority::new(PriorityTier::Second), EC, 5.0)
                .fail_provide("valve stuck"),
        ));
        let err = sched.run_pass(ctx(1.0), &mut ResourcePool::new()).unwrap_err();
        // The consumer still finished its update before the pass failed.
        assert_eq!(*granted.borrow(), vec![0.0]);
        match err {
            PassError::ModuleFault { name, source, .. } => {
                assert_eq!(name, "broken");
                assert_eq!(source, ModuleError::Failed("valve stuck".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn executing_supplier_is_not_asked_to_supply_itself() {
        let log = CallLog::default();
        let mut sched = Scheduler::default();
        let granted = Rc::new(RefCell::new(Vec::new()));
        let g = granted.clone();
        sched.register(Box::new(
            TestSupplier::new("greedy", ResourcePriority::new(PriorityTier::First), EC, 5.0)
                .with_log(&log)
                .on_update(move |rm| {
                    g.borrow_mut().push(rm.consume(EC, 1.0));
                    Ok(())
                }),
        ));
        let report = sched.run_pass(ctx(1.0), &mut ResourcePool::new()).unwrap();
        assert_eq!(*granted.borrow(), vec![0.0]);
        assert_eq!(report.supplier_calls, 0);
        assert!(sched.reentrancy_reported);
    }

    #[test]
    fn ordinary_dispatch_reports_no_reentrancy() {
        let mut sched = Scheduler::default();
        sched.register(Box::new(
            TestModule::new("lamp", ResourcePriority::new(PriorityTier::First)).on_update(|rm| {
                rm.consume(EC, 1.0);
                Ok(())
            }),
        ));
        sched.register(Box::new(TestSupplier::new(
            "battery",
            ResourcePriority::new(PriorityTier::Second),
            EC,
            5.0,
        )));
        sched.run_pass(ctx(1.0), &mut ResourcePool::new()).unwrap();
        assert!(!sched.reentrancy_reported);
    }
}
