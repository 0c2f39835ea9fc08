//! Per-frame driver: gather, catch-up, regular pass, disperse.
//!
//! The [`ResourceController`] owns the scheduler for one entity (a vessel, a
//! base) together with the only state that survives between frames: when it
//! last ran and whether it has been dormant since. Resource amounts are
//! never held here; they live in host storage and are gathered into a fresh
//! pool on every update.

use crate::overrides::OverrideFlags;
use crate::pool::ResourcePool;
use crate::resource::ResourceName;
use crate::scheduler::{PassError, PassReport, Scheduler, TickContext};
use crate::storage::ResourceStorage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying encoded controller state.
pub const STATE_MAGIC: u32 = 0x5EC4_0001;

/// Current state format version.
pub const STATE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControllerError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(f64),
    #[error(transparent)]
    Pass(#[from] PassError),
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", STATE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported state version: expected {}, got {}", STATE_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("state from future version {0} (this build supports up to {STATE_VERSION})")]
    FutureVersion(u32),
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Fields the host round-trips through its save mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    /// Timestamp of the last update, in host seconds.
    pub last_executed: f64,
    /// Set while the entity is unloaded; cleared by the next update.
    pub dormant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateHeader {
    magic: u32,
    version: u32,
}

impl StateHeader {
    fn current() -> Self {
        Self {
            magic: STATE_MAGIC,
            version: STATE_VERSION,
        }
    }

    fn validate(&self) -> Result<(), StateError> {
        if self.magic != STATE_MAGIC {
            return Err(StateError::InvalidMagic(self.magic));
        }
        if self.version > STATE_VERSION {
            return Err(StateError::FutureVersion(self.version));
        }
        if self.version < STATE_VERSION {
            return Err(StateError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedState {
    header: StateHeader,
    state: ControllerState,
}

impl ControllerState {
    /// Encode with a versioned header.
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        let encoded = EncodedState {
            header: StateHeader::current(),
            state: *self,
        };
        bitcode::serialize(&encoded).map_err(|e| StateError::Encode(e.to_string()))
    }

    /// Decode bytes produced by [`encode`](Self::encode).
    pub fn decode(data: &[u8]) -> Result<Self, StateError> {
        let encoded: EncodedState =
            bitcode::deserialize(data).map_err(|e| StateError::Decode(e.to_string()))?;
        encoded.header.validate()?;
        Ok(encoded.state)
    }
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    /// Seconds since the previous update.
    pub elapsed: f64,
    /// Present when a catch-up pass ran.
    pub catch_up: Option<PassReport>,
    pub regular: PassReport,
    /// Pool amounts left over after every unit was topped up.
    pub discarded: BTreeMap<ResourceName, f64>,
}

// ---------------------------------------------------------------------------
// ResourceController
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ResourceController {
    scheduler: Scheduler,
    state: ControllerState,
}

impl ResourceController {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            state: ControllerState::default(),
        }
    }

    /// Resume from persisted state.
    pub fn with_state(scheduler: Scheduler, state: ControllerState) -> Self {
        Self { scheduler, state }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The entity was unloaded. The next update runs a catch-up pass.
    pub fn mark_dormant(&mut self) {
        self.state.dormant = true;
    }

    pub fn is_dormant(&self) -> bool {
        self.state.dormant
    }

    /// Run one frame.
    ///
    /// Gathers `storage` into a pool, runs a catch-up pass over the elapsed
    /// time if the entity was dormant, runs the regular pass over `frame_dt`,
    /// then disperses the pool back into `storage`. Storage is dispersed
    /// even when a pass fails.
    pub fn update<S: ResourceStorage + ?Sized>(
        &mut self,
        now: f64,
        frame_dt: f64,
        overrides: &OverrideFlags,
        storage: &mut S,
    ) -> Result<TickReport, ControllerError> {
        if !now.is_finite() {
            return Err(ControllerError::InvalidTimestamp(now));
        }
        let elapsed = now - self.state.last_executed;
        self.state.last_executed = now;

        let mut pool = gather(storage);
        let passes = self.run_passes(elapsed, frame_dt, overrides, &mut pool);
        let discarded = disperse(&mut pool, storage);

        let (catch_up, regular) = passes?;
        Ok(TickReport {
            elapsed,
            catch_up,
            regular,
            discarded,
        })
    }

    fn run_passes(
        &mut self,
        elapsed: f64,
        frame_dt: f64,
        overrides: &OverrideFlags,
        pool: &mut ResourcePool,
    ) -> Result<(Option<PassReport>, PassReport), PassError> {
        let mut catch_up = None;
        if self.state.dormant {
            self.state.dormant = false;
            if elapsed.is_finite() && elapsed > 0.0 {
                info!("running catch-up pass over {elapsed:.3}s");
                let ctx = TickContext::new(elapsed, overrides.clone());
                catch_up = Some(self.scheduler.run_pass(ctx, pool)?);
            } else {
                warn!("skipping catch-up pass: elapsed time {elapsed} is not positive");
            }
        }
        let ctx = TickContext::new(frame_dt, overrides.clone());
        let regular = self.scheduler.run_pass(ctx, pool)?;
        Ok((catch_up, regular))
    }
}

// ---------------------------------------------------------------------------
// Gather / disperse
// ---------------------------------------------------------------------------

/// Move every recognised unit's amount into a new pool and sum capacities.
/// Units holding unrecognised kinds are left untouched.
pub fn gather<S: ResourceStorage + ?Sized>(storage: &mut S) -> ResourcePool {
    let mut pool = ResourcePool::new();
    for unit in storage.units_mut() {
        let resource = ResourceName::parse(&unit.resource);
        if !resource.is_known() {
            warn!("skipping storage unit holding unrecognised resource {:?}", unit.resource);
            continue;
        }
        pool.add_capacity(resource, unit.capacity);
        if unit.amount.is_finite() && unit.amount > 0.0 {
            pool.deposit(resource, unit.amount);
            unit.amount = 0.0;
        }
    }
    pool
}

/// Top up units in iteration order from the pool. Returns what is left.
pub fn disperse<S: ResourceStorage + ?Sized>(
    pool: &mut ResourcePool,
    storage: &mut S,
) -> BTreeMap<ResourceName, f64> {
    for unit in storage.units_mut() {
        let resource = ResourceName::parse(&unit.resource);
        if !resource.is_known() {
            continue;
        }
        unit.amount += pool.draw(resource, unit.space());
    }

    let leftovers: BTreeMap<ResourceName, f64> = pool.iter().filter(|(_, a)| *a > 0.0).collect();
    for (resource, amount) in &leftovers {
        debug!("discarding {amount} {resource} with no storage space left");
    }
    leftovers
}
