use serde::{Deserialize, Serialize};

use orderflow_core::{AggregateRoot, DomainError, DomainResult};
use orderflow_products::GlobalSkuId;

/// Aggregate root: InventoryRecord (one per global SKU).
///
/// Units move `available → allocated → fulfilled`. Only receipts add to
/// `available`. None of the pools can go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    sku: GlobalSkuId,
    available: u64,
    allocated: u64,
    fulfilled: u64,
    version: u64,
}

impl InventoryRecord {
    pub fn new(sku: GlobalSkuId) -> Self {
        Self {
            sku,
            available: 0,
            allocated: 0,
            fulfilled: 0,
            version: 0,
        }
    }

    pub fn sku(&self) -> GlobalSkuId {
        self.sku
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    /// Allocated but not yet fulfilled.
    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn fulfilled(&self) -> u64 {
        self.fulfilled
    }

    /// Add received units to the available pool.
    pub fn receive(&mut self, qty: u64) -> DomainResult<()> {
        if qty == 0 {
            return Err(DomainError::validation("received quantity must be positive"));
        }
        self.available = self
            .available
            .checked_add(qty)
            .ok_or_else(|| DomainError::invariant("available quantity overflow"))?;
        self.version += 1;
        Ok(())
    }

    pub fn decrement_available(&mut self, qty: u64) -> DomainResult<()> {
        if qty > self.available {
            return Err(DomainError::invariant(format!(
                "cannot take {qty} units of {}: only {} available",
                self.sku, self.available
            )));
        }
        self.available -= qty;
        self.version += 1;
        Ok(())
    }

    pub fn increment_allocated(&mut self, qty: u64) -> DomainResult<()> {
        self.allocated = self
            .allocated
            .checked_add(qty)
            .ok_or_else(|| DomainError::invariant("allocated quantity overflow"))?;
        self.version += 1;
        Ok(())
    }

    /// Drain fulfilled units out of the allocated pool.
    pub fn decrement_allocated(&mut self, qty: u64) -> DomainResult<()> {
        if qty > self.allocated {
            return Err(DomainError::invariant(format!(
                "cannot fulfill {qty} units of {}: only {} allocated",
                self.sku, self.allocated
            )));
        }
        self.allocated -= qty;
        self.fulfilled += qty;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for InventoryRecord {
    type Id = GlobalSkuId;

    fn id(&self) -> &Self::Id {
        &self.sku
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stocked(qty: u64) -> InventoryRecord {
        let mut record = InventoryRecord::new(GlobalSkuId::generate());
        record.receive(qty).unwrap();
        record
    }

    #[test]
    fn receive_rejects_zero() {
        let mut record = InventoryRecord::new(GlobalSkuId::generate());
        assert!(matches!(record.receive(0), Err(DomainError::Validation(_))));
        assert_eq!(record.version(), 0);
    }

    #[test]
    fn available_cannot_go_negative() {
        let mut record = stocked(3);
        let err = record.decrement_available(4).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(record.available(), 3);
    }

    #[test]
    fn fulfilling_moves_units_out_of_the_allocated_pool() {
        let mut record = stocked(10);
        record.decrement_available(4).unwrap();
        record.increment_allocated(4).unwrap();
        record.decrement_allocated(4).unwrap();

        assert_eq!(record.available(), 6);
        assert_eq!(record.allocated(), 0);
        assert_eq!(record.fulfilled(), 4);
    }

    #[test]
    fn every_mutation_bumps_the_version() {
        let mut record = stocked(5);
        assert_eq!(record.version(), 1);
        record.decrement_available(2).unwrap();
        record.increment_allocated(2).unwrap();
        assert_eq!(record.version(), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: units are conserved across the three pools.
        #[test]
        fn pools_sum_to_received(
            received in 1u64..10_000,
            takes in prop::collection::vec(0u64..500, 0..20),
        ) {
            let mut record = stocked(received);
            for take in takes {
                let grant = take.min(record.available());
                record.decrement_available(grant).unwrap();
                record.increment_allocated(grant).unwrap();
                if grant % 2 == 0 {
                    record.decrement_allocated(record.allocated()).unwrap();
                }
            }
            prop_assert_eq!(
                record.available() + record.allocated() + record.fulfilled(),
                received
            );
        }
    }
}
