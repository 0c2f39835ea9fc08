//! Capabilities implemented by host modules.
//!
//! A [`Module`] is anything that takes part in a scheduling pass: it has a
//! priority, and once per pass it is handed a [`ResourceManager`] through
//! which it consumes and produces resources. A module that can be asked to
//! top up a resource on demand also implements [`VariableSupplier`] and
//! exposes it through [`Module::as_supplier_mut`].

use crate::id::ModuleId;
use crate::overrides::OverrideFlags;
use crate::priority::ResourcePriority;
use crate::resource::{ResourceError, ResourceName};
use std::any::Any;

// ---------------------------------------------------------------------------
// ResourceManager
// ---------------------------------------------------------------------------

/// The pass-scoped surface a module sees.
///
/// Rates are per second; the manager scales them by the tick length. Calls
/// made while no pass is active log a warning and do nothing.
pub trait ResourceManager {
    /// Request `rate` per second of `resource`. Returns the granted rate,
    /// which is never negative and never more than `rate`.
    fn consume(&mut self, resource: ResourceName, rate: f64) -> f64;

    /// Add `rate` per second of `resource` to the pool.
    fn produce(&mut self, resource: ResourceName, rate: f64);

    /// Length of the current pass in seconds.
    fn tick_length(&self) -> f64;

    /// Override snapshot for the current pass.
    fn overrides(&self) -> &OverrideFlags;

    /// Amount of `resource` currently in the pool. Read-only.
    fn available(&self, resource: ResourceName) -> f64;

    /// The module whose update or provide call is running, if any.
    fn current_module(&self) -> Option<ModuleId>;

    /// Tell the scheduler the module set changed. The pass restarts after
    /// the current module returns; modules already run are not re-run.
    fn signal_topology_changed(&mut self);

    /// Queue a module for removal at the next registry refresh.
    fn queue_remove_module(&mut self, id: ModuleId);
}

// ---------------------------------------------------------------------------
// Module trait
// ---------------------------------------------------------------------------

/// A participant in the scheduling pass.
pub trait Module: std::fmt::Debug + 'static {
    /// Human-readable name, used in diagnostics.
    fn name(&self) -> &str;

    /// Execution tier and supplier-only flag.
    fn priority(&self) -> ResourcePriority;

    /// Called at most once per pass.
    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError>;

    /// The on-demand supplier capability, if this module has one.
    fn as_supplier(&self) -> Option<&dyn VariableSupplier> {
        None
    }

    fn as_supplier_mut(&mut self) -> Option<&mut dyn VariableSupplier> {
        None
    }

    /// Downcast to `&dyn Any` for type-safe access to concrete module types.
    fn as_any(&self) -> &dyn Any;

    /// Downcast to `&mut dyn Any` for type-safe mutable access to concrete module types.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// VariableSupplier
// ---------------------------------------------------------------------------

/// A module that can be asked mid-pass to produce more of a resource.
pub trait VariableSupplier {
    /// Resource kinds this supplier can provide. Read when the registry
    /// refreshes.
    fn resources_supplied(&self) -> Vec<ResourceName>;

    /// Produce up to `rate` per second of `resource` through `rm`.
    ///
    /// Returns `Ok(false)` once the supplier has nothing more to give this
    /// pass; it is then skipped until the next pass.
    fn provide(
        &mut self,
        rm: &mut dyn ResourceManager,
        resource: ResourceName,
        rate: f64,
    ) -> Result<bool, ModuleError>;
}

// ---------------------------------------------------------------------------
// ModuleError
// ---------------------------------------------------------------------------

/// Failures raised by a module's update or provide call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("panicked: {0}")]
    Panicked(String),
}
