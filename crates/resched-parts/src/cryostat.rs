//! Cryostat: draws electric charge to keep a cryogenic resource cold. Any
//! shortfall in power boils part of the resource off.

use log::debug;
use resched_core::module::{Module, ModuleError, ResourceManager};
use resched_core::priority::{PriorityTier, ResourcePriority};
use resched_core::resource::ResourceName;
use resched_core::scheduler::CONSUME_TOLERANCE;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Tanks holding less than this are treated as empty.
pub const EMPTY_TANK: f64 = 1e-7;

/// Temperature span (K) over which the cooling requirement scales linearly.
const TEMPERATURE_SCALE: f64 = 300.0;

/// Fraction of the rated power drawn per kelvin-scale unit.
const POWER_FACTOR: f64 = 0.2;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryostatConfig {
    /// The resource kept cold.
    pub resource: ResourceName,
    /// Fraction of the stored amount lost per second with no cooling.
    pub boil_off_rate: f64,
    /// Boiling point in kelvin.
    pub boil_off_temp: f64,
    /// Rated cooling power.
    pub power_req_kw: f64,
    pub power_req_mult: f64,
}

impl CryostatConfig {
    pub fn new(resource: ResourceName, boil_off_temp: f64) -> Self {
        Self {
            resource,
            boil_off_rate: 0.0,
            boil_off_temp,
            power_req_kw: 0.0,
            power_req_mult: 1.0,
        }
    }

    /// Electric charge per second needed at `external_temp`.
    pub fn power_requirement(&self, external_temp: f64) -> f64 {
        let temperature_modifier = (external_temp - self.boil_off_temp).max(0.0) / TEMPERATURE_SCALE;
        self.power_req_kw * POWER_FACTOR * temperature_modifier * self.power_req_mult
    }
}

// ---------------------------------------------------------------------------
// Cryostat module
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cryostat {
    pub config: CryostatConfig,
    /// Ambient temperature in kelvin, set by the host.
    pub external_temp: f64,
    /// Whether the last update had all the power it needed.
    pub previous_power_met: bool,
    /// Total amount boiled off so far.
    pub boiled_off: f64,
}

impl Cryostat {
    pub fn new(config: CryostatConfig) -> Self {
        Self {
            config,
            external_temp: 0.0,
            previous_power_met: true,
            boiled_off: 0.0,
        }
    }

    pub fn set_external_temp(&mut self, kelvin: f64) {
        self.external_temp = kelvin;
    }

    /// Cool the tank for one pass. Returns whether the power requirement was
    /// met.
    fn cool(&mut self, rm: &mut dyn ResourceManager) -> bool {
        if rm.overrides().ignores_limits(ResourceName::WasteHeat) {
            return true;
        }
        if !self.external_temp.is_finite() {
            debug!(
                "cryostat for {}: external temperature {} is not finite",
                self.config.resource, self.external_temp
            );
            return true;
        }
        let stored = rm.available(self.config.resource);
        if stored < EMPTY_TANK {
            return true;
        }
        let required = self.config.power_requirement(self.external_temp);
        if required <= 0.0 {
            return true;
        }

        let granted = rm.consume(ResourceName::ElectricCharge, required);
        let satisfaction = (granted / required).clamp(0.0, 1.0);
        if satisfaction >= CONSUME_TOLERANCE {
            return true;
        }

        let dt = rm.tick_length();
        if dt > 0.0 && self.config.boil_off_rate > 0.0 {
            let rate = (stored * self.config.boil_off_rate * (1.0 - satisfaction)).min(stored / dt);
            let lost = rm.consume(self.config.resource, rate) * dt;
            self.boiled_off += lost;
        }
        false
    }
}

impl Module for Cryostat {
    fn name(&self) -> &str {
        "Cryostat"
    }

    fn priority(&self) -> ResourcePriority {
        ResourcePriority::new(PriorityTier::Second)
    }

    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError> {
        self.previous_power_met = self.cool(rm);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resched_core::overrides::{CheatOptions, OverrideFlags};
    use resched_core::test_utils::{StandaloneManager, approx_eq, pool_of};

    const HE: ResourceName = ResourceName::LqdHelium;
    const EC: ResourceName = ResourceName::ElectricCharge;

    fn helium() -> Cryostat {
        let mut config = CryostatConfig::new(HE, 4.222);
        config.power_req_kw = 10.0;
        config.boil_off_rate = 0.01;
        let mut cryostat = Cryostat::new(config);
        cryostat.set_external_temp(200.0);
        cryostat
    }

    #[test]
    fn requirement_scales_with_temperature_above_boiling_point() {
        let config = helium().config;
        assert_eq!(config.power_requirement(4.0), 0.0);
        assert!(approx_eq(
            config.power_requirement(304.222),
            10.0 * 0.2 * 1.0
        ));
    }

    #[test]
    fn infinite_electricity_draws_no_charge() {
        let mut cryostat = helium();
        let overrides = OverrideFlags::from(CheatOptions {
            infinite_electricity: true,
            ..Default::default()
        });
        let mut rm =
            StandaloneManager::new(pool_of(&[(HE, 100.0, 100.0)]), 1.0).with_overrides(overrides);
        cryostat.update(&mut rm).unwrap();
        assert!(rm.consumed.is_empty());
        assert!(cryostat.previous_power_met);
    }

    #[test]
    fn ignore_max_temperature_prevents_boil_off() {
        let mut cryostat = helium();
        cryostat.set_external_temp(2000.0);
        let overrides = OverrideFlags::from(CheatOptions {
            ignore_max_temperature: true,
            ..Default::default()
        });
        let mut rm =
            StandaloneManager::new(pool_of(&[(HE, 100.0, 100.0)]), 1.0).with_overrides(overrides);
        cryostat.update(&mut rm).unwrap();
        assert!(rm.consumed.is_empty());
        assert!(cryostat.previous_power_met);
        assert_eq!(rm.amount(HE), 100.0);
    }

    #[test]
    fn empty_tanks_need_no_cooling() {
        let mut cryostat = helium();
        let mut rm = StandaloneManager::new(pool_of(&[(HE, 0.0, 100.0), (EC, 5000.0, 5000.0)]), 1.0);
        cryostat.update(&mut rm).unwrap();
        assert!(cryostat.previous_power_met);
        assert!(rm.consumed.is_empty());
    }

    #[test]
    fn powered_tank_keeps_its_contents() {
        let mut cryostat = helium();
        let mut rm =
            StandaloneManager::new(pool_of(&[(HE, 100.0, 100.0), (EC, 5000.0, 5000.0)]), 1.0);
        cryostat.update(&mut rm).unwrap();
        assert!(cryostat.previous_power_met);
        assert_eq!(rm.amount(HE), 100.0);
        assert!(rm.amount(EC) < 5000.0);
    }

    #[test]
    fn unpowered_tank_boils_off() {
        let mut cryostat = helium();
        let mut rm = StandaloneManager::new(pool_of(&[(HE, 100.0, 100.0), (EC, 0.0, 10.0)]), 1.0);
        cryostat.update(&mut rm).unwrap();
        assert!(!cryostat.previous_power_met);
        assert!(approx_eq(rm.amount(HE), 99.0));
        assert!(approx_eq(cryostat.boiled_off, 1.0));
    }

    #[test]
    fn non_finite_temperature_is_ignored() {
        let mut cryostat = helium();
        cryostat.set_external_temp(f64::NAN);
        let mut rm = StandaloneManager::new(pool_of(&[(HE, 100.0, 100.0)]), 1.0);
        cryostat.update(&mut rm).unwrap();
        assert!(cryostat.previous_power_met);
        assert!(rm.consumed.is_empty());
    }
}
