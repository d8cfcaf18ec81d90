//! Inventory domain module.
//!
//! Pure bookkeeping for warehouse stock (no IO, no storage):
//! - [`InventoryRecord`]: per-SKU available / allocated / fulfilled pools
//! - [`BinStockRecord`]: per-(bin, SKU) physical breakdown of the same stock

pub mod bin;
pub mod record;

pub use bin::{BinDraw, BinId, BinStockRecord, plan_bin_draws};
pub use record::InventoryRecord;
