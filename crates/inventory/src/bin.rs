use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, typed_id};
use orderflow_products::GlobalSkuId;

typed_id!(
    /// Physical storage location.
    BinId
);

/// Stock of one SKU held in one bin.
///
/// `quantity - allocated` is the bin's free stock; summed over all bins of a
/// SKU it equals the SKU's `InventoryRecord::available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinStockRecord {
    pub bin: BinId,
    pub sku: GlobalSkuId,
    pub quantity: u64,
    pub allocated: u64,
}

impl BinStockRecord {
    pub fn new(bin: BinId, sku: GlobalSkuId) -> Self {
        Self {
            bin,
            sku,
            quantity: 0,
            allocated: 0,
        }
    }

    pub fn free(&self) -> u64 {
        self.quantity.saturating_sub(self.allocated)
    }
}

/// Units to mark as allocated in one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinDraw {
    pub bin: BinId,
    pub qty: u64,
}

/// Decide which bins an allocation of `qty` units is drawn from.
///
/// Bins are drained greedily in bin order. Failing to cover `qty` means the bin
/// ledger disagrees with the inventory record.
pub fn plan_bin_draws(bins: &[BinStockRecord], qty: u64) -> DomainResult<Vec<BinDraw>> {
    let mut ordered: Vec<&BinStockRecord> = bins.iter().filter(|b| b.free() > 0).collect();
    ordered.sort_by_key(|b| b.bin);

    let mut remaining = qty;
    let mut draws = Vec::new();
    for bin in ordered {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(bin.free());
        draws.push(BinDraw { bin: bin.bin, qty: take });
        remaining -= take;
    }

    if remaining > 0 {
        return Err(DomainError::invariant(format!(
            "bin ledger out of sync: {remaining} of {qty} units could not be placed"
        )));
    }
    Ok(draws)
}
