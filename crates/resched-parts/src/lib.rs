//! Ready-made modules for the resched scheduler.
//!
//! - [`rtg::PlutoniumRtg`] -- constant electric charge producer.
//! - [`radioisotope::RadioisotopeGenerator`] -- output proportional to
//!   stored fuel, fuel decays by half-life.
//! - [`cryostat::Cryostat`] -- powered cooling with boil-off on shortfall.
//! - [`decay::DecayModule`] -- exponential decay of one resource into another.
//! - [`buffer::BufferSupplier`] -- on-demand supplier with a per-pass limit.

pub mod buffer;
pub mod cryostat;
pub mod decay;
pub mod radioisotope;
pub mod rtg;
