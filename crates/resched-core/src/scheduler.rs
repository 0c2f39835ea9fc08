//! The per-pass scheduler.
//!
//! A pass runs every registered module once, in priority order, against a
//! pool handed in by the caller. While the pass is active the scheduler is
//! the [`ResourceManager`] each module sees; outside a pass every pool
//! operation is rejected with a warning.
//!
//! # Pass algorithm
//!
//! 1. Refresh the registry if it is stale. An empty module list ends the
//!    pass with no side effects.
//! 2. Walk the ordered list by index. Modules already updated this pass are
//!    skipped, as are modules that are still executing (logged once).
//! 3. Run the module's update under the fault policy.
//! 4. If the update left the registry stale, refresh it and restart the
//!    index at zero. The updated set is kept, so nothing runs twice.
//! 5. Offer remaining storage headroom to the registered suppliers.

use crate::id::ModuleId;
use crate::module::{Module, ModuleError, ResourceManager};
use crate::overrides::OverrideFlags;
use crate::pool::ResourcePool;
use crate::registry::ModuleRegistry;
use crate::resource::ResourceName;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

/// A consume request satisfied to within this fraction counts as complete.
pub const CONSUME_TOLERANCE: f64 = 0.9999;

static NO_OVERRIDES: OverrideFlags = OverrideFlags::none();

// ---------------------------------------------------------------------------
// Pass inputs and outputs
// ---------------------------------------------------------------------------

/// Inputs fixed for the duration of one pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickContext {
    /// Seconds covered by the pass.
    pub tick_length: f64,
    pub overrides: OverrideFlags,
}

impl TickContext {
    pub fn new(tick_length: f64, overrides: OverrideFlags) -> Self {
        Self {
            tick_length,
            overrides,
        }
    }
}

/// What to do when a module's update or provide call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaultPolicy {
    /// Log the failure, record it in the report and carry on.
    #[default]
    Isolate,
    /// Fail the pass as soon as the failing module returns.
    Strict,
}

/// A contained module failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleFault {
    pub module: ModuleId,
    pub name: String,
    pub error: ModuleError,
}

/// Summary of a completed pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Update calls made, including lazy supplier activations.
    pub modules_run: usize,
    /// Times the pass restarted after a topology change.
    pub restarts: usize,
    /// Faults contained under [`FaultPolicy::Isolate`].
    pub faults: Vec<ModuleFault>,
    /// Provide calls made by supplier dispatch.
    pub supplier_calls: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PassError {
    #[error("module {name} failed: {source}")]
    ModuleFault {
        module: ModuleId,
        name: String,
        source: ModuleError,
    },
    #[error("invalid tick length: {0}")]
    InvalidTickLength(f64),
}

// ---------------------------------------------------------------------------
// Pass state
// ---------------------------------------------------------------------------

/// Identity-keyed run state. Cleared at the start of every pass.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub(crate) updated: HashSet<ModuleId>,
    pub(crate) executing: HashSet<ModuleId>,
    pub(crate) exhausted: HashSet<ModuleId>,
    /// Innermost executing module last.
    pub(crate) stack: Vec<ModuleId>,
}

#[derive(Debug)]
pub(crate) struct ActivePass {
    pub(crate) ctx: TickContext,
    pub(crate) pool: ResourcePool,
    pub(crate) run: RunState,
    pub(crate) report: PassReport,
    /// First fault raised under `Strict` where it could not be returned
    /// directly. Fails the pass once control is back in the main loop.
    pub(crate) deferred: Option<ModuleFault>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Scheduler {
    pub(crate) registry: ModuleRegistry,
    pub(crate) policy: FaultPolicy,
    pub(crate) pass: Option<ActivePass>,
    pub(crate) reentrancy_reported: bool,
}

impl Scheduler {
    pub fn new(policy: FaultPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_registry(registry: ModuleRegistry, policy: FaultPolicy) -> Self {
        Self {
            registry,
            policy,
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    /// Register a module directly with the owned registry.
    pub fn register(&mut self, module: Box<dyn Module>) -> ModuleId {
        self.registry.register(module)
    }

    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FaultPolicy) {
        self.policy = policy;
    }

    /// Returns true while a pass is running.
    pub fn in_pass(&self) -> bool {
        self.pass.is_some()
    }

    /// Run one pass over `pool`.
    ///
    /// The pool is moved into the scheduler for the duration of the pass and
    /// written back before returning, including when the pass fails.
    pub fn run_pass(
        &mut self,
        ctx: TickContext,
        pool: &mut ResourcePool,
    ) -> Result<PassReport, PassError> {
        if !ctx.tick_length.is_finite() || ctx.tick_length < 0.0 {
            return Err(PassError::InvalidTickLength(ctx.tick_length));
        }
        if self.registry.is_stale() {
            self.registry.refresh();
        }
        if self.registry.ordered_modules().is_empty() {
            return Ok(PassReport::default());
        }

        self.pass = Some(ActivePass {
            ctx,
            pool: std::mem::take(pool),
            run: RunState::default(),
            report: PassReport::default(),
            deferred: None,
        });

        let outcome = self.run_modules().and_then(|()| self.fill_storage());

        let Some(finished) = self.pass.take() else {
            return outcome.map(|()| PassReport::default());
        };
        *pool = finished.pool;
        outcome.map(|()| finished.report)
    }

    fn run_modules(&mut self) -> Result<(), PassError> {
        let mut index = 0;
        while let Some(&id) = self.registry.ordered_modules().get(index) {
            index += 1;

            let Some(pass) = self.pass.as_ref() else {
                break;
            };
            if pass.run.updated.contains(&id) {
                continue;
            }

            self.run_update(id)?;
            self.raise_deferred()?;

            if self.registry.is_stale() {
                self.registry.refresh();
                if let Some(pass) = self.pass.as_mut() {
                    pass.report.restarts += 1;
                }
                index = 0;
            }
        }
        Ok(())
    }

    /// Run a module's update once, marking it executing for the duration
    /// and updated afterwards.
    pub(crate) fn run_update(&mut self, id: ModuleId) -> Result<(), PassError> {
        let Some(mut module) = self.registry.take(id) else {
            return Ok(());
        };
        self.enter(id);
        let result = guarded(|| module.update(self));
        self.leave(id);
        if let Some(pass) = self.pass.as_mut() {
            pass.run.updated.insert(id);
            pass.report.modules_run += 1;
        }
        let name = module.name().to_string();
        self.registry.restore(id, module);
        self.handle_fault(id, name, result)
    }

    pub(crate) fn enter(&mut self, id: ModuleId) {
        if let Some(pass) = self.pass.as_mut() {
            pass.run.executing.insert(id);
            pass.run.stack.push(id);
        }
    }

    pub(crate) fn leave(&mut self, id: ModuleId) {
        if let Some(pass) = self.pass.as_mut() {
            pass.run.executing.remove(&id);
            if let Some(pos) = pass.run.stack.iter().rposition(|m| *m == id) {
                pass.run.stack.remove(pos);
            }
        }
    }

    /// Apply the fault policy to the outcome of a module call.
    pub(crate) fn handle_fault<T>(
        &mut self,
        id: ModuleId,
        name: String,
        result: Result<T, ModuleError>,
    ) -> Result<(), PassError> {
        let Err(error) = result else {
            return Ok(());
        };
        match self.policy {
            FaultPolicy::Isolate => {
                error!("module {name} ({id:?}) failed: {error}");
                if let Some(pass) = self.pass.as_mut() {
                    pass.report.faults.push(ModuleFault {
                        module: id,
                        name,
                        error,
                    });
                }
                Ok(())
            }
            FaultPolicy::Strict => Err(PassError::ModuleFault {
                module: id,
                name,
                source: error,
            }),
        }
    }

    /// Remember a strict-mode failure raised where it cannot be returned.
    pub(crate) fn defer(&mut self, err: PassError) {
        if let (Some(pass), PassError::ModuleFault { module, name, source }) =
            (self.pass.as_mut(), err)
        {
            pass.deferred.get_or_insert(ModuleFault {
                module,
                name,
                error: source,
            });
        }
    }

    fn raise_deferred(&mut self) -> Result<(), PassError> {
        match self.pass.as_mut().and_then(|p| p.deferred.take()) {
            Some(fault) => Err(PassError::ModuleFault {
                module: fault.module,
                name: fault.name,
                source: fault.error,
            }),
            None => Ok(()),
        }
    }

    /// Warn, once per scheduler, that a supplier was asked to supply while
    /// its own call was still on the stack.
    pub(crate) fn report_reentrancy(&mut self, id: ModuleId) {
        if !self.reentrancy_reported {
            self.reentrancy_reported = true;
            let name = self.registry.name(id).unwrap_or("?");
            warn!("module {name} ({id:?}) is already executing; skipped");
        }
    }

    /// Offer each resource's free storage capacity to its suppliers and keep
    /// whatever they deliver.
    fn fill_storage(&mut self) -> Result<(), PassError> {
        let Some(pass) = self.pass.as_ref() else {
            return Ok(());
        };
        let tick = pass.ctx.tick_length;
        if tick <= 0.0 {
            return Ok(());
        }
        let targets: Vec<(ResourceName, f64)> = pass
            .pool
            .capacities()
            .filter(|&(resource, _)| {
                pass.pool.headroom(resource) > 0.0
                    && !pass.ctx.overrides.is_unlimited(resource)
                    && !pass.ctx.overrides.ignores_limits(resource)
                    && !self.registry.suppliers_for(resource).is_empty()
            })
            .collect();

        for (resource, capacity) in targets {
            let Some(pass) = self.pass.as_mut() else {
                break;
            };
            let held = pass.pool.draw(resource, capacity);
            let obtained = self.dispatch(resource, capacity / tick, capacity, held);
            if let Some(pass) = self.pass.as_mut() {
                pass.pool.deposit(resource, obtained);
            }
            self.raise_deferred()?;
        }
        Ok(())
    }

    /// Validate a pool operation. Returns the tick length when it may go
    /// ahead.
    fn admit(&self, op: &str, resource: ResourceName, rate: f64) -> Option<f64> {
        if !resource.is_known() {
            warn!("{op} called with an unrecognised resource; ignored");
            return None;
        }
        let Some(pass) = self.pass.as_ref() else {
            warn!("{op}({resource}) called outside an active pass; ignored");
            return None;
        };
        if !rate.is_finite() || rate < 0.0 {
            warn!("{op}({resource}) called with invalid rate {rate}; ignored");
            return None;
        }
        Some(pass.ctx.tick_length)
    }
}

// ---------------------------------------------------------------------------
// ResourceManager
// ---------------------------------------------------------------------------

impl ResourceManager for Scheduler {
    fn consume(&mut self, resource: ResourceName, rate: f64) -> f64 {
        let Some(tick) = self.admit("consume", resource, rate) else {
            return 0.0;
        };
        let Some(pass) = self.pass.as_mut() else {
            return 0.0;
        };
        if pass.ctx.overrides.is_unlimited(resource) {
            return rate;
        }

        let requested = rate * tick;
        if requested <= 0.0 {
            return rate;
        }
        let mut obtained = pass.pool.draw(resource, requested);
        if obtained < requested * CONSUME_TOLERANCE {
            obtained = self.dispatch(resource, rate, requested, obtained);
        }

        if obtained >= requested * CONSUME_TOLERANCE {
            rate
        } else {
            rate * (obtained / requested)
        }
    }

    fn produce(&mut self, resource: ResourceName, rate: f64) {
        let Some(tick) = self.admit("produce", resource, rate) else {
            return;
        };
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        if pass.ctx.overrides.ignores_limits(resource) {
            return;
        }
        pass.pool.deposit(resource, rate * tick);
    }

    fn tick_length(&self) -> f64 {
        self.pass.as_ref().map_or(0.0, |p| p.ctx.tick_length)
    }

    fn overrides(&self) -> &OverrideFlags {
        self.pass.as_ref().map_or(&NO_OVERRIDES, |p| &p.ctx.overrides)
    }

    fn available(&self, resource: ResourceName) -> f64 {
        self.pass.as_ref().map_or(0.0, |p| p.pool.amount(resource))
    }

    fn current_module(&self) -> Option<ModuleId> {
        self.pass.as_ref()?.run.stack.last().copied()
    }

    fn signal_topology_changed(&mut self) {
        self.registry.mark_stale();
    }

    fn queue_remove_module(&mut self, id: ModuleId) {
        self.registry.queue_remove(id);
    }
}

// ---------------------------------------------------------------------------
// Fault containment
// ---------------------------------------------------------------------------

/// Run a module call, converting a panic into [`ModuleError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, ModuleError>) -> Result<T, ModuleError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ModuleError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
