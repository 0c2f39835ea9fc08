//! Radioisotope generator: power proportional to stored fuel, with the fuel
//! decaying by its half-life.

use resched_core::module::{Module, ModuleError, ResourceManager};
use resched_core::priority::{PriorityTier, ResourcePriority};
use resched_core::resource::ResourceName;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Electric charge per second per unit of fuel: 8 units give 0.75.
pub const DEFAULT_POWER_MULTIPLIER: f64 = 0.75 / 8.0;

/// Plutonium-238 half-life in seconds (87.7 years).
pub const PU238_HALF_LIFE: f64 = 87.7 * 365.0 * 24.0 * 60.0 * 60.0;

/// Fraction of a quantity left after `dt` seconds with the given half-life.
pub fn remaining_fraction(dt: f64, half_life: f64) -> f64 {
    if half_life <= 0.0 {
        return 0.0;
    }
    2f64.powf(-dt / half_life)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioisotopeGenerator {
    pub fuel: ResourceName,
    pub power_multiplier: f64,
    pub upgrade_multiplier: f64,
    pub half_life: f64,
    /// Electric charge per second produced by the last update.
    pub last_output: f64,
}

impl Default for RadioisotopeGenerator {
    fn default() -> Self {
        Self {
            fuel: ResourceName::Plutonium238,
            power_multiplier: DEFAULT_POWER_MULTIPLIER,
            upgrade_multiplier: 1.0,
            half_life: PU238_HALF_LIFE,
            last_output: 0.0,
        }
    }
}

impl RadioisotopeGenerator {
    /// Output for a given amount of fuel.
    pub fn power_for(&self, fuel: f64) -> f64 {
        fuel.max(0.0) * self.power_multiplier * self.upgrade_multiplier
    }
}

impl Module for RadioisotopeGenerator {
    fn name(&self) -> &str {
        "Radioisotope Generator"
    }

    fn priority(&self) -> ResourcePriority {
        ResourcePriority::supplier(PriorityTier::First)
    }

    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError> {
        let dt = rm.tick_length();
        let fuel = rm.available(self.fuel);
        self.last_output = self.power_for(fuel);
        rm.produce(ResourceName::ElectricCharge, self.last_output);

        if dt > 0.0 && fuel > 0.0 {
            let decayed = fuel * (1.0 - remaining_fraction(dt, self.half_life));
            rm.consume(self.fuel, decayed / dt);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
