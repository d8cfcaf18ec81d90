//! Product catalog master data.
//!
//! Clients refer to their goods with their own SKU codes; the warehouse keys
//! everything by a global SKU. A [`Product`] is the mapping between the two.

pub mod product;

pub use product::{GlobalSkuId, Product};
