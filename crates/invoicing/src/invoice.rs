use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult};
use orderflow_orders::{ChannelId, InvoiceLink, Order, OrderId, OrderLine, OrderStatus};
use orderflow_products::GlobalSkuId;

/// Invoice line derived from an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub client_sku_id: String,
    pub global_sku_id: GlobalSkuId,
    pub ordered_quantity: u64,
    /// Price in smallest currency unit (e.g., cents).
    pub selling_price_per_unit: u64,
    pub line_total: u64,
}

/// Data handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub order_id: OrderId,
    /// Order creation time.
    pub time: DateTime<Utc>,
    pub lines: Vec<InvoiceLine>,
    pub total: u64,
}

/// What `GetInvoice` has to do for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceDecision {
    /// Already resolved; hand back what is stored.
    Resolved(InvoiceLink),
    /// Internal-channel order: render a document.
    Generate,
    /// External channel invoices on its own; resolve to no URL.
    External,
}

/// Gate invoice materialization on the order state.
///
/// `internal_channel` is only consulted for a fulfilled order whose invoice is
/// still pending, so a failing lookup never masks the precondition.
pub fn decide_invoice<F, E>(order: &Order, internal_channel: F) -> Result<InvoiceDecision, E>
where
    F: FnOnce() -> Result<ChannelId, E>,
    E: From<DomainError>,
{
    if order.status() != OrderStatus::Fulfilled {
        return Err(DomainError::precondition(
            "Order should be fulfilled for invoice generation",
        )
        .into());
    }
    if !order.invoice().is_pending() {
        return Ok(InvoiceDecision::Resolved(order.invoice().clone()));
    }
    if order.channel_id() == internal_channel()? {
        Ok(InvoiceDecision::Generate)
    } else {
        Ok(InvoiceDecision::External)
    }
}

/// Build the invoice document for an order.
///
/// Totals are ordered quantity × unit price. Orders only reach `FULFILLED`
/// fully allocated and fully shipped, so ordered and fulfilled quantities
/// agree for every invoiced order.
pub fn build_invoice<F>(
    order: &Order,
    lines: &[OrderLine],
    mut client_sku_of: F,
) -> DomainResult<InvoiceDocument>
where
    F: FnMut(GlobalSkuId) -> DomainResult<String>,
{
    let mut ordered: Vec<&OrderLine> = lines.iter().collect();
    ordered.sort_by_key(|l| l.line_no());

    let mut total: u64 = 0;
    let mut invoice_lines = Vec::with_capacity(ordered.len());
    for line in ordered {
        let line_total = line
            .ordered_quantity()
            .checked_mul(line.unit_price())
            .ok_or_else(|| DomainError::invariant("invoice line amount overflow"))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;

        invoice_lines.push(InvoiceLine {
            client_sku_id: client_sku_of(line.global_sku_id())?,
            global_sku_id: line.global_sku_id(),
            ordered_quantity: line.ordered_quantity(),
            selling_price_per_unit: line.unit_price(),
            line_total,
        });
    }

    Ok(InvoiceDocument {
        order_id: order.id_typed(),
        time: order.created_at(),
        lines: invoice_lines,
        total,
    })
}
