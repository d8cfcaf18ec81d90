use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_events::Event;

use crate::allocation::LineGrant;
use crate::channel::ChannelId;
use crate::order::OrderId;

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub channel_id: ChannelId,
    pub channel_order_id: String,
    pub line_count: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesAllocated (a pass that granted stock, complete or not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesAllocated {
    pub order_id: OrderId,
    pub grants: Vec<LineGrant>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderAllocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAllocated {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderFulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFulfilled {
    pub order_id: OrderId,
    pub fulfilled_units: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceResolved. `url` is `None` for external-channel orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceResolved {
    pub order_id: OrderId,
    pub url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    LinesAllocated(LinesAllocated),
    OrderAllocated(OrderAllocated),
    OrderFulfilled(OrderFulfilled),
    InvoiceResolved(InvoiceResolved),
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderCreated(e) => e.order_id,
            OrderEvent::LinesAllocated(e) => e.order_id,
            OrderEvent::OrderAllocated(e) => e.order_id,
            OrderEvent::OrderFulfilled(e) => e.order_id,
            OrderEvent::InvoiceResolved(e) => e.order_id,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "orders.order.created",
            OrderEvent::LinesAllocated(_) => "orders.order.lines_allocated",
            OrderEvent::OrderAllocated(_) => "orders.order.allocated",
            OrderEvent::OrderFulfilled(_) => "orders.order.fulfilled",
            OrderEvent::InvoiceResolved(_) => "orders.order.invoice_resolved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::LinesAllocated(e) => e.occurred_at,
            OrderEvent::OrderAllocated(e) => e.occurred_at,
            OrderEvent::OrderFulfilled(e) => e.occurred_at,
            OrderEvent::InvoiceResolved(e) => e.occurred_at,
        }
    }
}
