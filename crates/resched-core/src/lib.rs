//! Resched Core -- a deterministic per-tick resource scheduler.
//!
//! A set of host-registered modules (generators, consumers, storage
//! chargers) share named resources through a pool that exists only for the
//! duration of one pass. Modules run once per pass in priority order; when a
//! module asks for more than the pool holds, registered suppliers are asked
//! to top it up on demand.
//!
//! # Update cycle
//!
//! Each call to [`controller::ResourceController::update`] runs:
//!
//! 1. **Gather** -- Move amounts out of host storage into a fresh pool.
//! 2. **Catch-up** -- If the entity was dormant, one coarse pass over the
//!    elapsed time.
//! 3. **Regular pass** -- One pass over the frame's tick length.
//! 4. **Disperse** -- Top storage units back up from the pool in order;
//!    leftovers are discarded.
//!
//! # Key Types
//!
//! - [`scheduler::Scheduler`] -- Runs passes and is the
//!   [`module::ResourceManager`] modules see.
//! - [`registry::ModuleRegistry`] -- Registered modules, execution order and
//!   per-resource supplier lists.
//! - [`module::Module`] / [`module::VariableSupplier`] -- Host capabilities.
//! - [`pool::ResourcePool`] -- Pass-scoped amounts and capacities.
//! - [`overrides::OverrideFlags`] -- Per-pass unlimited / ignore-limits
//!   snapshot.

pub mod controller;
mod dispatch;
pub mod id;
pub mod module;
pub mod overrides;
pub mod pool;
pub mod priority;
pub mod registry;
pub mod resource;
pub mod scheduler;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
