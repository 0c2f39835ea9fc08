//! The pass-scoped resource ledger.
//!
//! A [`ResourcePool`] holds the available amount and the storage capacity of
//! each resource kind for the duration of one controller update. Hosts and
//! tests build pools and read them back; modules only ever reach a pool
//! through `consume` / `produce` on the scheduler.

use crate::resource::ResourceName;
use std::collections::BTreeMap;

/// Amount and capacity per resource kind. Amounts are never negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePool {
    amounts: BTreeMap<ResourceName, f64>,
    capacities: BTreeMap<ResourceName, f64>,
}

impl ResourcePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the starting amount for a resource. Negative and
    /// non-finite amounts are stored as zero. `Unknown` is ignored.
    pub fn with_amount(mut self, resource: ResourceName, amount: f64) -> Self {
        if resource.is_known() {
            self.amounts.insert(resource, sanitize(amount));
        }
        self
    }

    /// Builder: set the storage capacity for a resource.
    pub fn with_capacity(mut self, resource: ResourceName, capacity: f64) -> Self {
        if resource.is_known() {
            self.capacities.insert(resource, sanitize(capacity));
        }
        self
    }

    /// Current amount, zero if the resource has no entry.
    pub fn amount(&self, resource: ResourceName) -> f64 {
        self.amounts.get(&resource).copied().unwrap_or(0.0)
    }

    /// Returns true if the pool has an amount entry for this resource.
    pub fn contains(&self, resource: ResourceName) -> bool {
        self.amounts.contains_key(&resource)
    }

    /// Storage capacity, zero if unknown.
    pub fn capacity(&self, resource: ResourceName) -> f64 {
        self.capacities.get(&resource).copied().unwrap_or(0.0)
    }

    /// Free capacity: `capacity - amount`, never negative.
    pub fn headroom(&self, resource: ResourceName) -> f64 {
        (self.capacity(resource) - self.amount(resource)).max(0.0)
    }

    /// Iterate `(resource, amount)` in resource order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceName, f64)> + '_ {
        self.amounts.iter().map(|(r, a)| (*r, *a))
    }

    /// Iterate `(resource, capacity)` in resource order.
    pub fn capacities(&self) -> impl Iterator<Item = (ResourceName, f64)> + '_ {
        self.capacities.iter().map(|(r, c)| (*r, *c))
    }

    /// Returns true if the pool holds no amounts and no capacities.
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty() && self.capacities.is_empty()
    }

    // -----------------------------------------------------------------------
    // Crate-private mutation
    // -----------------------------------------------------------------------

    /// Remove up to `max` from the pool. Returns the amount removed.
    pub(crate) fn draw(&mut self, resource: ResourceName, max: f64) -> f64 {
        if max <= 0.0 {
            return 0.0;
        }
        let entry = self.amounts.entry(resource).or_insert(0.0);
        let taken = entry.min(max);
        *entry -= taken;
        taken
    }

    /// Add to the pool, creating the entry if absent.
    pub(crate) fn deposit(&mut self, resource: ResourceName, amount: f64) {
        if !(amount.is_finite() && amount > 0.0) {
            return;
        }
        *self.amounts.entry(resource).or_insert(0.0) += amount;
    }

    pub(crate) fn add_capacity(&mut self, resource: ResourceName, capacity: f64) {
        *self.capacities.entry(resource).or_insert(0.0) += sanitize(capacity);
    }

}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EC: ResourceName = ResourceName::ElectricCharge;

    #[test]
    fn empty_pool_reads_zero() {
        let pool = ResourcePool::new();
        assert_eq!(pool.amount(EC), 0.0);
        assert_eq!(pool.capacity(EC), 0.0);
        assert!(!pool.contains(EC));
        assert!(pool.is_empty());
    }

    #[test]
    fn draw_never_goes_negative() {
        let mut pool = ResourcePool::new().with_amount(EC, 3.0);
        assert_eq!(pool.draw(EC, 5.0), 3.0);
        assert_eq!(pool.amount(EC), 0.0);
        assert_eq!(pool.draw(EC, 1.0), 0.0);
        assert_eq!(pool.amount(EC), 0.0);
    }

    #[test]
    fn draw_non_positive_is_noop() {
        let mut pool = ResourcePool::new().with_amount(EC, 3.0);
        assert_eq!(pool.draw(EC, 0.0), 0.0);
        assert_eq!(pool.draw(EC, -2.0), 0.0);
        assert_eq!(pool.amount(EC), 3.0);
    }

    #[test]
    fn deposit_creates_entry() {
        let mut pool = ResourcePool::new();
        pool.deposit(ResourceName::WasteHeat, 2.5);
        assert!(pool.contains(ResourceName::WasteHeat));
        assert_eq!(pool.amount(ResourceName::WasteHeat), 2.5);
    }

    #[test]
    fn negative_starting_amounts_are_clamped() {
        let pool = ResourcePool::new()
            .with_amount(EC, -4.0)
            .with_capacity(EC, f64::NAN);
        assert_eq!(pool.amount(EC), 0.0);
        assert_eq!(pool.capacity(EC), 0.0);
    }

    #[test]
    fn unknown_resource_is_never_stored() {
        let pool = ResourcePool::new()
            .with_amount(ResourceName::Unknown, 5.0)
            .with_capacity(ResourceName::Unknown, 5.0);
        assert!(pool.is_empty());
    }

    #[test]
    fn headroom_is_capacity_minus_amount() {
        let pool = ResourcePool::new()
            .with_amount(EC, 5.0)
            .with_capacity(EC, 20.0);
        assert_eq!(pool.headroom(EC), 15.0);

        let over = ResourcePool::new()
            .with_amount(EC, 25.0)
            .with_capacity(EC, 20.0);
        assert_eq!(over.headroom(EC), 0.0);
    }

    #[test]
    fn capacities_accumulate() {
        let mut pool = ResourcePool::new();
        pool.add_capacity(EC, 10.0);
        pool.add_capacity(EC, 5.0);
        assert_eq!(pool.capacity(EC), 15.0);
    }

}
