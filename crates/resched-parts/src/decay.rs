//! Exponential decay of one stored resource into another.

use resched_core::module::{Module, ModuleError, ResourceManager};
use resched_core::priority::{PriorityTier, ResourcePriority};
use resched_core::resource::ResourceName;
use serde::{Deserialize, Serialize};
use std::any::Any;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// The decaying resource.
    pub resource: ResourceName,
    /// What it decays into.
    pub product: ResourceName,
    /// Decay constant (lambda), per second.
    pub decay_constant: f64,
    /// Product density relative to the source.
    pub density_ratio: f64,
    /// Product units per decayed source unit.
    pub decay_ratio: f64,
}

impl DecayConfig {
    /// Amount of `amount` that decays over `dt` seconds.
    pub fn decayed(&self, amount: f64, dt: f64) -> f64 {
        amount * (1.0 - (-self.decay_constant * dt).exp())
    }

    /// Product yielded by `decayed` units of source.
    pub fn product_of(&self, decayed: f64) -> f64 {
        decayed * self.decay_ratio * self.density_ratio
    }
}

/// Applies one [`DecayConfig`] to the pool every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayModule {
    pub config: DecayConfig,
}

impl DecayModule {
    pub fn new(config: DecayConfig) -> Self {
        Self { config }
    }
}

impl Module for DecayModule {
    fn name(&self) -> &str {
        "Resource Decay"
    }

    fn priority(&self) -> ResourcePriority {
        ResourcePriority::supplier(PriorityTier::First)
    }

    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError> {
        self.config.resource.validate()?;
        self.config.product.validate()?;
        let dt = rm.tick_length();
        if dt <= 0.0 || self.config.decay_constant <= 0.0 {
            return Ok(());
        }
        let decayed = self.config.decayed(rm.available(self.config.resource), dt);
        if decayed <= 0.0 {
            return Ok(());
        }
        let granted = rm.consume(self.config.resource, decayed / dt);
        rm.produce(self.config.product, self.config.product_of(granted));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
