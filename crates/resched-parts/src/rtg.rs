use resched_core::module::{Module, ModuleError, ResourceManager};
use resched_core::priority::{PriorityTier, ResourcePriority};
use resched_core::resource::ResourceName;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Electric charge produced by a fresh plutonium RTG, per second.
pub const RTG_OUTPUT: f64 = 0.75;

/// A constant-output plutonium RTG. Runs first, ahead of any consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlutoniumRtg {
    /// Electric charge produced per second.
    pub output: f64,
    /// Seconds of operation.
    pub age: f64,
}

impl Default for PlutoniumRtg {
    fn default() -> Self {
        Self {
            output: RTG_OUTPUT,
            age: 0.0,
        }
    }
}

impl PlutoniumRtg {
    pub fn new(output: f64) -> Self {
        Self { output, age: 0.0 }
    }
}

impl Module for PlutoniumRtg {
    fn name(&self) -> &str {
        "Plutonium RTG"
    }

    fn priority(&self) -> ResourcePriority {
        ResourcePriority::supplier(PriorityTier::First)
    }

    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError> {
        rm.produce(ResourceName::ElectricCharge, self.output);
        self.age += rm.tick_length();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
