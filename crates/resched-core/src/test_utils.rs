//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, downstream crates' tests and benchmarks (via
//! the `test-utils` feature).

use crate::id::ModuleId;
use crate::module::{Module, ModuleError, ResourceManager, VariableSupplier};
use crate::overrides::OverrideFlags;
use crate::pool::ResourcePool;
use crate::priority::ResourcePriority;
use crate::resource::ResourceName;
use crate::scheduler::CONSUME_TOLERANCE;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type UpdateFn = Box<dyn FnMut(&mut dyn ResourceManager) -> Result<(), ModuleError>>;

// ===========================================================================
// Call log
// ===========================================================================

/// Shared, ordered record of module calls (`"update:<name>"`,
/// `"provide:<name>"`).
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

// ===========================================================================
// TestModule
// ===========================================================================

/// A module whose update is a closure.
pub struct TestModule {
    name: String,
    priority: ResourcePriority,
    on_update: Option<UpdateFn>,
    log: Option<CallLog>,
    runs: u32,
}

impl TestModule {
    pub fn new(name: &str, priority: ResourcePriority) -> Self {
        Self {
            name: name.to_string(),
            priority,
            on_update: None,
            log: None,
            runs: 0,
        }
    }

    pub fn on_update(
        mut self,
        f: impl FnMut(&mut dyn ResourceManager) -> Result<(), ModuleError> + 'static,
    ) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// Number of update calls so far.
    pub fn runs(&self) -> u32 {
        self.runs
    }
}

impl fmt::Debug for TestModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("runs", &self.runs)
            .finish()
    }
}

impl Module for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ResourcePriority {
        self.priority
    }

    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError> {
        self.runs += 1;
        if let Some(log) = &self.log {
            log.record(format!("update:{}", self.name));
        }
        match self.on_update.as_mut() {
            Some(f) => f(rm),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ===========================================================================
// TestSupplier
// ===========================================================================

/// A supplier that can deliver a fixed total amount of one resource per
/// pass. The budget is refilled by its update.
pub struct TestSupplier {
    name: String,
    priority: ResourcePriority,
    resource: ResourceName,
    budget: f64,
    remaining: f64,
    on_update: Option<UpdateFn>,
    provide_error: Option<String>,
    log: Option<CallLog>,
    updates: u32,
    provides: u32,
}

impl TestSupplier {
    pub fn new(
        name: &str,
        priority: ResourcePriority,
        resource: ResourceName,
        budget: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            priority,
            resource,
            budget,
            remaining: 0.0,
            on_update: None,
            provide_error: None,
            log: None,
            updates: 0,
            provides: 0,
        }
    }

    pub fn on_update(
        mut self,
        f: impl FnMut(&mut dyn ResourceManager) -> Result<(), ModuleError> + 'static,
    ) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Every provide call fails with this message.
    pub fn fail_provide(mut self, message: &str) -> Self {
        self.provide_error = Some(message.to_string());
        self
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn updates(&self) -> u32 {
        self.updates
    }

    pub fn provides(&self) -> u32 {
        self.provides
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }
}

impl fmt::Debug for TestSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSupplier")
            .field("name", &self.name)
            .field("resource", &self.resource)
            .field("budget", &self.budget)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl Module for TestSupplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ResourcePriority {
        self.priority
    }

    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError> {
        self.updates += 1;
        if let Some(log) = &self.log {
            log.record(format!("update:{}", self.name));
        }
        if let Some(f) = self.on_update.as_mut() {
            f(rm)?;
        }
        self.remaining = self.budget;
        Ok(())
    }

    fn as_supplier(&self) -> Option<&dyn VariableSupplier> {
        Some(self)
    }

    fn as_supplier_mut(&mut self) -> Option<&mut dyn VariableSupplier> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl VariableSupplier for TestSupplier {
    fn resources_supplied(&self) -> Vec<ResourceName> {
        vec![self.resource]
    }

    fn provide(
        &mut self,
        rm: &mut dyn ResourceManager,
        resource: ResourceName,
        rate: f64,
    ) -> Result<bool, ModuleError> {
        self.provides += 1;
        if let Some(log) = &self.log {
            log.record(format!("provide:{}", self.name));
        }
        if let Some(message) = &self.provide_error {
            return Err(ModuleError::Failed(message.clone()));
        }
        let tick = rm.tick_length();
        if resource != self.resource || tick <= 0.0 {
            return Ok(false);
        }
        let amount = (rate * tick).min(self.remaining);
        rm.produce(resource, amount / tick);
        self.remaining -= amount;
        Ok(self.remaining > 0.0)
    }
}

// ===========================================================================
// StandaloneManager
// ===========================================================================

/// A [`ResourceManager`] over a bare pool, with no registry and no
/// suppliers. Records every draw and deposit so tests can assert on them.
#[derive(Debug, Default)]
pub struct StandaloneManager {
    pub pool: ResourcePool,
    pub tick: f64,
    pub overrides: OverrideFlags,
    /// `(resource, amount)` drawn from the pool.
    pub consumed: Vec<(ResourceName, f64)>,
    /// `(resource, amount)` added to the pool.
    pub produced: Vec<(ResourceName, f64)>,
    pub topology_signals: u32,
    pub removals: Vec<ModuleId>,
}

impl StandaloneManager {
    pub fn new(pool: ResourcePool, tick: f64) -> Self {
        Self {
            pool,
            tick,
            ..Self::default()
        }
    }

    pub fn with_overrides(mut self, overrides: OverrideFlags) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn amount(&self, resource: ResourceName) -> f64 {
        self.pool.amount(resource)
    }
}

impl ResourceManager for StandaloneManager {
    fn consume(&mut self, resource: ResourceName, rate: f64) -> f64 {
        if !resource.is_known() || !rate.is_finite() || rate < 0.0 {
            return 0.0;
        }
        if self.overrides.is_unlimited(resource) {
            return rate;
        }
        let requested = rate * self.tick;
        if requested <= 0.0 {
            return rate;
        }
        let obtained = self.pool.draw(resource, requested);
        self.consumed.push((resource, obtained));
        if obtained >= requested * CONSUME_TOLERANCE {
            rate
        } else {
            rate * (obtained / requested)
        }
    }

    fn produce(&mut self, resource: ResourceName, rate: f64) {
        if !resource.is_known() || !rate.is_finite() || rate < 0.0 {
            return;
        }
        if self.overrides.ignores_limits(resource) {
            return;
        }
        let amount = rate * self.tick;
        self.pool.deposit(resource, amount);
        self.produced.push((resource, amount));
    }

    fn tick_length(&self) -> f64 {
        self.tick
    }

    fn overrides(&self) -> &OverrideFlags {
        &self.overrides
    }

    fn available(&self, resource: ResourceName) -> f64 {
        self.pool.amount(resource)
    }

    fn current_module(&self) -> Option<ModuleId> {
        None
    }

    fn signal_topology_changed(&mut self) {
        self.topology_signals += 1;
    }

    fn queue_remove_module(&mut self, id: ModuleId) {
        self.removals.push(id);
    }
}

// ===========================================================================
// Pool helpers
// ===========================================================================

/// Build a pool from `(resource, amount, capacity)` triples.
pub fn pool_of(entries: &[(ResourceName, f64, f64)]) -> ResourcePool {
    entries
        .iter()
        .fold(ResourcePool::new(), |pool, &(resource, amount, capacity)| {
            pool.with_amount(resource, amount)
                .with_capacity(resource, capacity)
        })
}

/// Approximate float comparison for assertions.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
