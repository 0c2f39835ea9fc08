//! Host-side resource storage, as seen by the controller.
//!
//! Storage is the only place resource amounts live between updates. The
//! controller gathers it into a pool before a pass and disperses the pool
//! back into it afterwards.

use serde::{Deserialize, Serialize};

/// One tank, battery or bin holding a single resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUnit {
    /// Storage name of the resource, as the host knows it.
    pub resource: String,
    pub amount: f64,
    pub capacity: f64,
}

impl StorageUnit {
    pub fn new(resource: impl Into<String>, amount: f64, capacity: f64) -> Self {
        Self {
            resource: resource.into(),
            amount,
            capacity,
        }
    }

    /// Free capacity, never negative.
    pub fn space(&self) -> f64 {
        (self.capacity - self.amount).max(0.0)
    }
}

/// A physical container (part, vessel section) holding several units.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub units: Vec<StorageUnit>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: Vec::new(),
        }
    }

    /// Builder: add a unit.
    pub fn with_unit(mut self, resource: impl Into<String>, amount: f64, capacity: f64) -> Self {
        self.units.push(StorageUnit::new(resource, amount, capacity));
        self
    }
}

/// Enumerates storage units in a stable order. Disperse fills units in
/// this order.
pub trait ResourceStorage {
    fn units_mut(&mut self) -> impl Iterator<Item = &mut StorageUnit>;
}

impl ResourceStorage for Vec<StorageUnit> {
    fn units_mut(&mut self) -> impl Iterator<Item = &mut StorageUnit> {
        self.iter_mut()
    }
}

impl ResourceStorage for [StorageUnit] {
    fn units_mut(&mut self) -> impl Iterator<Item = &mut StorageUnit> {
        self.iter_mut()
    }
}

impl ResourceStorage for Vec<Container> {
    fn units_mut(&mut self) -> impl Iterator<Item = &mut StorageUnit> {
        self.iter_mut().flat_map(|c| c.units.iter_mut())
    }
}

impl ResourceStorage for Container {
    fn units_mut(&mut self) -> impl Iterator<Item = &mut StorageUnit> {
        self.units.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_flatten_in_order() {
        let mut vessel = vec![
            Container::new("battery-bank")
                .with_unit("ElectricCharge", 1.0, 10.0)
                .with_unit("ElectricCharge", 2.0, 10.0),
            Container::new("tank").with_unit("LiquidFuel", 3.0, 90.0),
        ];
        let amounts: Vec<f64> = vessel.units_mut().map(|u| u.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn units_are_mutable_through_storage() {
        let mut units = vec![StorageUnit::new("WasteHeat", 0.0, 5.0)];
        for unit in units.units_mut() {
            unit.amount = 4.0;
        }
        assert_eq!(units[0].amount, 4.0);
        assert_eq!(units[0].space(), 1.0);
    }

    #[test]
    fn overfull_unit_has_no_space() {
        let unit = StorageUnit::new("ElectricCharge", 12.0, 10.0);
        assert_eq!(unit.space(), 0.0);
    }
}
