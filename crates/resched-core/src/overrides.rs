//! Simulation-wide override flags.
//!
//! Overrides are captured once per pass into the tick context as an
//! immutable [`OverrideFlags`] snapshot. Nothing in the scheduler reads
//! override state from anywhere else.

use crate::resource::ResourceName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Cheat options
// ---------------------------------------------------------------------------

/// Host-facing toggles, as a player would set them. Converted into an
/// [`OverrideFlags`] snapshot before a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheatOptions {
    /// Electric charge is never drawn from the pool.
    pub infinite_electricity: bool,
    /// Propellants are never drawn from the pool.
    pub infinite_propellant: bool,
    /// Waste heat production is discarded.
    pub ignore_max_temperature: bool,
}

// ---------------------------------------------------------------------------
// Override flags
// ---------------------------------------------------------------------------

/// Per-resource override snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverrideFlags {
    unlimited: BTreeSet<ResourceName>,
    ignore_limits: BTreeSet<ResourceName>,
}

impl OverrideFlags {
    /// No overrides.
    pub const fn none() -> Self {
        Self {
            unlimited: BTreeSet::new(),
            ignore_limits: BTreeSet::new(),
        }
    }

    pub fn builder() -> OverrideFlagsBuilder {
        OverrideFlagsBuilder::default()
    }

    /// Consumption of this resource is always granted in full without
    /// touching the pool.
    pub fn is_unlimited(&self, resource: ResourceName) -> bool {
        self.unlimited.contains(&resource)
    }

    /// Production of this resource is discarded.
    pub fn ignores_limits(&self, resource: ResourceName) -> bool {
        self.ignore_limits.contains(&resource)
    }

    pub fn unlimited(&self) -> impl Iterator<Item = ResourceName> + '_ {
        self.unlimited.iter().copied()
    }

    pub fn ignored_limits(&self) -> impl Iterator<Item = ResourceName> + '_ {
        self.ignore_limits.iter().copied()
    }

    /// Returns true if no override is set.
    pub fn is_empty(&self) -> bool {
        self.unlimited.is_empty() && self.ignore_limits.is_empty()
    }
}

impl From<CheatOptions> for OverrideFlags {
    fn from(cheats: CheatOptions) -> Self {
        OverrideFlags::builder().cheats(cheats).build()
    }
}

/// Builder for [`OverrideFlags`]. `Unknown` is never recorded.
#[derive(Debug, Default)]
pub struct OverrideFlagsBuilder {
    flags: OverrideFlags,
}

impl OverrideFlagsBuilder {
    pub fn unlimited(mut self, resource: ResourceName) -> Self {
        if resource.is_known() {
            self.flags.unlimited.insert(resource);
        }
        self
    }

    pub fn ignore_limits(mut self, resource: ResourceName) -> Self {
        if resource.is_known() {
            self.flags.ignore_limits.insert(resource);
        }
        self
    }

    /// Apply every override implied by `cheats`.
    pub fn cheats(mut self, cheats: CheatOptions) -> Self {
        if cheats.infinite_electricity {
            self = self.unlimited(ResourceName::ElectricCharge);
        }
        if cheats.infinite_propellant {
            for resource in ResourceName::ALL.iter().filter(|r| r.is_propellant()) {
                self = self.unlimited(*resource);
            }
        }
        if cheats.ignore_max_temperature {
            self = self.ignore_limits(ResourceName::WasteHeat);
        }
        self
    }

    pub fn build(self) -> OverrideFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_overrides() {
        let flags = OverrideFlags::none();
        assert!(flags.is_empty());
        for r in ResourceName::ALL {
            assert!(!flags.is_unlimited(r));
            assert!(!flags.ignores_limits(r));
        }
    }

    #[test]
    fn infinite_electricity_only_covers_charge() {
        let flags = OverrideFlags::from(CheatOptions {
            infinite_electricity: true,
            ..Default::default()
        });
        assert!(flags.is_unlimited(ResourceName::ElectricCharge));
        assert!(!flags.is_unlimited(ResourceName::LiquidFuel));
        assert!(!flags.ignores_limits(ResourceName::ElectricCharge));
    }

    #[test]
    fn infinite_propellant_covers_every_propellant() {
        let flags = OverrideFlags::from(CheatOptions {
            infinite_propellant: true,
            ..Default::default()
        });
        for r in ResourceName::ALL {
            assert_eq!(flags.is_unlimited(r), r.is_propellant(), "{r}");
        }
    }

    #[test]
    fn ignore_max_temperature_discards_waste_heat() {
        let flags = OverrideFlags::from(CheatOptions {
            ignore_max_temperature: true,
            ..Default::default()
        });
        assert!(flags.ignores_limits(ResourceName::WasteHeat));
        assert!(!flags.is_unlimited(ResourceName::WasteHeat));
    }

    #[test]
    fn builder_ignores_unknown() {
        let flags = OverrideFlags::builder()
            .unlimited(ResourceName::Unknown)
            .ignore_limits(ResourceName::Unknown)
            .build();
        assert!(flags.is_empty());
    }
}
