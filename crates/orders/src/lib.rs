//! Orders domain module.
//!
//! Business rules for customer orders, implemented purely as deterministic
//! domain logic (no IO, no storage). Every operation here reads immutable
//! snapshots and returns a plan; applying the plan is the caller's job.

pub mod allocation;
pub mod channel;
pub mod event;
pub mod fulfillment;
pub mod order;
pub mod status;
pub mod validation;

pub use allocation::{AllocationPlan, LineGrant, SkuAllocation, plan_allocation};
pub use channel::{Channel, ChannelId};
pub use event::{
    InvoiceResolved, LinesAllocated, OrderAllocated, OrderCreated, OrderEvent, OrderFulfilled,
};
pub use fulfillment::{FulfillmentPlan, LineDrain, SkuDrain, plan_fulfillment};
pub use order::{InvoiceLink, Order, OrderId, OrderLine};
pub use status::{OrderStatus, StatusTransition, next_status, transition};
pub use validation::{
    MAX_ORDER_LINES, OrderLineRequest, OrderRequest, resolve_global_skus, validate_lines,
};
