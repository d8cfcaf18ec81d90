//! Parties master data (clients and customers).
//!
//! Orders reference two parties: the client that owns the goods and the
//! customer that receives them. Only role resolution lives here.

pub mod party;

pub use party::{Party, PartyId, PartyRole};
