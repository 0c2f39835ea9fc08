//! On-demand supplier with a per-pass output limit, optionally converting
//! an input resource (a fuel cell burning hydrogen, a charger drawing from a
//! reactor bus).

use resched_core::module::{Module, ModuleError, ResourceManager, VariableSupplier};
use resched_core::priority::{PriorityTier, ResourcePriority};
use resched_core::resource::ResourceName;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// An input consumed per unit of output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedStock {
    pub resource: ResourceName,
    /// Input units per output unit.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferSupplier {
    pub name: String,
    pub output: ResourceName,
    /// Maximum output per second.
    pub max_rate: f64,
    pub feed: Option<FeedStock>,
    pub tier: PriorityTier,
    /// Output still available this pass. Reset by `update`.
    remaining: f64,
    /// Output delivered this pass.
    delivered: f64,
}

impl BufferSupplier {
    pub fn new(name: &str, output: ResourceName, max_rate: f64) -> Self {
        Self {
            name: name.to_string(),
            output,
            max_rate,
            feed: None,
            tier: PriorityTier::Third,
            remaining: 0.0,
            delivered: 0.0,
        }
    }

    /// Builder: consume `ratio` of `resource` per unit of output.
    pub fn with_feed(mut self, resource: ResourceName, ratio: f64) -> Self {
        self.feed = Some(FeedStock { resource, ratio });
        self
    }

    pub fn with_tier(mut self, tier: PriorityTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn delivered(&self) -> f64 {
        self.delivered
    }
}

impl Module for BufferSupplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ResourcePriority {
        ResourcePriority::new(self.tier)
    }

    fn update(&mut self, rm: &mut dyn ResourceManager) -> Result<(), ModuleError> {
        self.remaining = self.max_rate.max(0.0) * rm.tick_length();
        self.delivered = 0.0;
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

impl VariableSupplier for BufferSupplier {
    fn resources_supplied(&self) -> Vec<ResourceName> {
        vec![self.output]
    }

    fn provide(
        &mut self,
        rm: &mut dyn ResourceManager,
        resource: ResourceName,
        rate: f64,
    ) -> Result<bool, ModuleError> {
        let dt = rm.tick_length();
        if resource != self.output || dt <= 0.0 || self.remaining <= 0.0 {
            return Ok(false);
        }
        let mut out_rate = rate.min(self.remaining / dt);
        if let Some(feed) = self.feed {
            if feed.ratio > 0.0 {
                let fed = rm.consume(feed.resource, out_rate * feed.ratio);
                out_rate = fed / feed.ratio;
            }
        }
        if out_rate <= 0.0 {
            return Ok(false);
        }

        rm.produce(self.output, out_rate);
        self.remaining -= out_rate * dt;
        self.delivered += out_rate * dt;
        Ok(self.remaining > 0.0)
    }
}
