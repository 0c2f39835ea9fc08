//! On-disk structs for scheduler configuration files.
//!
//! Resource names are kept as plain strings here and resolved to
//! `ResourceName` by the loader, so a typo is reported against the file it
//! came from instead of silently becoming `Unknown`.

use resched_core::overrides::CheatOptions;
use serde::Deserialize;

fn one() -> f64 {
    1.0
}

// ===========================================================================
// Scheduler settings
// ===========================================================================

/// Contents of `scheduler.{ron,toml,json}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulerSettingsData {
    /// Stop a pass at the first module fault instead of isolating it.
    pub strict: bool,
    pub cheats: CheatOptions,
    /// Resources whose consumption is always granted in full.
    pub unlimited: Vec<String>,
    /// Resources whose production is discarded.
    pub ignore_limits: Vec<String>,
}

// ===========================================================================
// Decay
// ===========================================================================

/// One entry of `decay.*`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecayData {
    pub resource: String,
    pub product: String,
    pub decay_constant: f64,
    #[serde(default = "one")]
    pub density_ratio: f64,
    #[serde(default = "one")]
    pub decay_ratio: f64,
}

/// TOML wrapper: `[[decay]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlDecay {
    pub decay: Vec<DecayData>,
}

// ===========================================================================
// Cryostats
// ===========================================================================

/// One entry of `cryostat.*`.
#[derive(Debug, Clone, Deserialize)]
pub struct CryostatData {
    pub resource: String,
    pub boil_off_temp: f64,
    #[serde(default)]
    pub boil_off_rate: f64,
    #[serde(default)]
    pub power_req_kw: f64,
    #[serde(default = "one")]
    pub power_req_mult: f64,
}

/// TOML wrapper: `[[cryostat]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlCryostats {
    pub cryostat: Vec<CryostatData>,
}

// ===========================================================================
// Tests
// ===========================================================================
