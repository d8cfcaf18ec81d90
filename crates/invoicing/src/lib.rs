//! Invoicing domain module.
//!
//! Decides whether a fulfilled order needs an invoice and computes the
//! document contents. Rendering and storage happen elsewhere.

pub mod invoice;

pub use invoice::{InvoiceDecision, InvoiceDocument, InvoiceLine, build_invoice, decide_invoice};
