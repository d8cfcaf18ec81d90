use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{AggregateRoot, DomainError, DomainResult, typed_id};
use orderflow_parties::PartyId;
use orderflow_products::GlobalSkuId;

use crate::channel::ChannelId;
use crate::status::{OrderStatus, StatusTransition};

typed_id!(
    /// Order identifier.
    OrderId
);

/// Write-once invoice slot of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum InvoiceLink {
    /// Invoice not materialized yet.
    Pending,
    /// Invoice document generated and stored at the given URL.
    Generated(String),
    /// Order came from an external channel, which invoices on its own.
    External,
}

impl InvoiceLink {
    pub fn is_pending(&self) -> bool {
        matches!(self, InvoiceLink::Pending)
    }

    /// URL handed back to callers; `None` for pending and external orders.
    pub fn url(&self) -> Option<&str> {
        match self {
            InvoiceLink::Generated(url) => Some(url),
            InvoiceLink::Pending | InvoiceLink::External => None,
        }
    }
}

/// Order line: resolved SKU, quantities and unit price.
///
/// Invariant: `fulfilled <= allocated <= ordered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    order_id: OrderId,
    line_no: u32,
    global_sku_id: GlobalSkuId,
    ordered_quantity: u64,
    allocated_quantity: u64,
    fulfilled_quantity: u64,
    /// Price in smallest currency unit (e.g., cents).
    unit_price: u64,
}

impl OrderLine {
    pub fn new(
        order_id: OrderId,
        line_no: u32,
        global_sku_id: GlobalSkuId,
        ordered_quantity: u64,
        unit_price: u64,
    ) -> DomainResult<Self> {
        if ordered_quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            order_id,
            line_no,
            global_sku_id,
            ordered_quantity,
            allocated_quantity: 0,
            fulfilled_quantity: 0,
            unit_price,
        })
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn global_sku_id(&self) -> GlobalSkuId {
        self.global_sku_id
    }

    pub fn ordered_quantity(&self) -> u64 {
        self.ordered_quantity
    }

    pub fn allocated_quantity(&self) -> u64 {
        self.allocated_quantity
    }

    pub fn fulfilled_quantity(&self) -> u64 {
        self.fulfilled_quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    /// Quantity still waiting for stock.
    pub fn remaining_to_allocate(&self) -> u64 {
        self.ordered_quantity.saturating_sub(self.allocated_quantity)
    }

    /// Quantity allocated but not shipped yet.
    pub fn remaining_to_fulfill(&self) -> u64 {
        self.allocated_quantity.saturating_sub(self.fulfilled_quantity)
    }

    pub fn is_fully_allocated(&self) -> bool {
        self.allocated_quantity == self.ordered_quantity
    }

    pub fn allocate(&mut self, qty: u64) -> DomainResult<()> {
        if qty > self.remaining_to_allocate() {
            return Err(DomainError::invariant(format!(
                "line {}: allocating {qty} exceeds remaining {}",
                self.line_no,
                self.remaining_to_allocate()
            )));
        }
        self.allocated_quantity += qty;
        Ok(())
    }

    pub fn fulfill(&mut self, qty: u64) -> DomainResult<()> {
        if qty > self.remaining_to_fulfill() {
            return Err(DomainError::invariant(format!(
                "line {}: fulfilling {qty} exceeds allocated remainder {}",
                self.line_no,
                self.remaining_to_fulfill()
            )));
        }
        self.fulfilled_quantity += qty;
        Ok(())
    }
}

/// Aggregate root: Order.
///
/// `(channel_id, channel_order_id)` is unique across all orders; the store
/// enforces it on create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    client_id: PartyId,
    customer_id: PartyId,
    channel_id: ChannelId,
    channel_order_id: String,
    status: OrderStatus,
    invoice: InvoiceLink,
    created_at: DateTime<Utc>,
    version: u64,
}

impl Order {
    pub fn new(
        id: OrderId,
        client_id: PartyId,
        customer_id: PartyId,
        channel_id: ChannelId,
        channel_order_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let channel_order_id = channel_order_id.into().trim().to_string();
        if channel_order_id.is_empty() {
            return Err(DomainError::validation("channel order id cannot be empty"));
        }
        Ok(Self {
            id,
            client_id,
            customer_id,
            channel_id,
            channel_order_id,
            status: OrderStatus::Created,
            invoice: InvoiceLink::Pending,
            created_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn client_id(&self) -> PartyId {
        self.client_id
    }

    pub fn customer_id(&self) -> PartyId {
        self.customer_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn channel_order_id(&self) -> &str {
        &self.channel_order_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn invoice(&self) -> &InvoiceLink {
        &self.invoice
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply a checked transition. Fails if the order moved since it was checked.
    pub fn apply_transition(&mut self, transition: StatusTransition) -> DomainResult<()> {
        if transition.from() != self.status {
            return Err(DomainError::invalid_transition(format!(
                "order {} is {}, not {}",
                self.id,
                self.status,
                transition.from()
            )));
        }
        self.status = transition.to();
        self.touch();
        Ok(())
    }

    /// Resolve the invoice slot. It can be written once.
    pub fn resolve_invoice(&mut self, link: InvoiceLink) -> DomainResult<()> {
        if !self.invoice.is_pending() {
            return Err(DomainError::conflict(format!(
                "invoice of order {} is already resolved",
                self.id
            )));
        }
        if link.is_pending() {
            return Err(DomainError::invariant("invoice cannot be reset to pending"));
        }
        self.invoice = link;
        self.touch();
        Ok(())
    }

    /// Record that the order or one of its lines changed.
    pub fn touch(&mut self) {
        self.version += 1;
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
