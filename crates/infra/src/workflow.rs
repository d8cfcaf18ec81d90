//! Order workflow (application-level orchestration).
//!
//! Composes validation, the status machine and the allocation, fulfillment and
//! invoice planners against the stores:
//!
//! ```text
//! request
//!   ↓
//! 1. Read a snapshot (order, lines, inventory)
//!   ↓
//! 2. Plan (pure, no mutation)
//!   ↓
//! 3. Apply the plan inside one unit of work (all or nothing)
//!   ↓
//! 4. Publish order events to the bus
//! ```
//!
//! Operations on one order are serialized by a per-order lock. Inventory is
//! shared between orders and is protected optimistically: the commit checks
//! that every touched record is still at the version the plan was computed
//! from, and a lost race is recomputed from a fresh snapshot.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};

use orderflow_core::{AggregateRoot, DomainError, ExpectedVersion};
use orderflow_events::{Event, EventBus, EventEnvelope};
use orderflow_inventory::{BinId, InventoryRecord};
use orderflow_invoicing::{InvoiceDecision, build_invoice, decide_invoice};
use orderflow_orders::{
    AllocationPlan, Channel, FulfillmentPlan, InvoiceLink, InvoiceResolved, LinesAllocated, Order,
    OrderAllocated, OrderCreated, OrderEvent, OrderFulfilled, OrderId, OrderLine, OrderRequest,
    OrderStatus, plan_allocation, plan_fulfillment, transition,
};
use orderflow_products::GlobalSkuId;

use crate::config::EngineConfig;
use crate::error::WorkflowError;
use crate::locks::KeyedLocks;
use crate::render::InvoiceRenderer;
use crate::store::{
    BinStockStore, CatalogStore, ChannelStore, InventoryStore, OrderStore, PartyStore, StoreError,
    StoreResult, UnitOfWork,
};
use crate::validator::Validator;

/// Aggregate type recorded on published envelopes.
pub const ORDER_AGGREGATE: &str = "orders.order";

/// Result of a successful order creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub line_count: usize,
}

/// Order state after a committed write, with the events it produced.
struct Committed {
    order: Order,
    events: Vec<OrderEvent>,
}

#[derive(Debug)]
pub struct OrderWorkflow<W, M, R, B> {
    warehouse: W,
    master: M,
    renderer: R,
    bus: B,
    config: EngineConfig,
    locks: KeyedLocks<OrderId>,
}

impl<W, M, R, B> OrderWorkflow<W, M, R, B> {
    pub fn new(warehouse: W, master: M, renderer: R, bus: B, config: EngineConfig) -> Self {
        Self {
            warehouse,
            master,
            renderer,
            bus,
            config,
            locks: KeyedLocks::new(),
        }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn master(&self) -> &M {
        &self.master
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<W, M, R, B> OrderWorkflow<W, M, R, B>
where
    W: UnitOfWork,
    M: CatalogStore + PartyStore + ChannelStore,
    R: InvoiceRenderer,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create an order on the internal channel. Returns the new order id and
    /// the number of lines written.
    #[instrument(
        skip(self, request),
        fields(channel_order_id = %request.channel_order_id, lines = request.lines.len()),
        err
    )]
    pub fn create_order(&self, request: &OrderRequest) -> Result<OrderReceipt, WorkflowError> {
        let channel = self.internal_channel()?;
        self.place_order(&channel, request)
    }

    /// Record an order received from an external channel.
    #[instrument(
        skip(self, request),
        fields(channel = %channel_name, channel_order_id = %request.channel_order_id),
        err
    )]
    pub fn import_order(
        &self,
        channel_name: &str,
        request: &OrderRequest,
    ) -> Result<OrderReceipt, WorkflowError> {
        let channel = self.channel(channel_name)?;
        self.place_order(&channel, request)
    }

    /// Move an order to `target`, running allocation or fulfillment.
    ///
    /// Returns the status after the pass; an allocation that could not cover
    /// every line leaves the order `CREATED` with its partial grants saved.
    #[instrument(skip(self), fields(order_id = %order_id, target = %target), err)]
    pub fn advance_order_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<OrderStatus, WorkflowError> {
        let _guard = self.locks.lock(order_id);

        let order = self.warehouse.read(|tx| tx.get_by_id(order_id))?;
        let step = transition(order.status(), target)?;
        match step.to() {
            OrderStatus::Allocated => self.allocate_locked(order_id),
            OrderStatus::Fulfilled => self.fulfill_locked(order_id),
            OrderStatus::Created => Err(DomainError::invariant(format!(
                "transition into {} has no handler",
                step.to()
            ))
            .into()),
        }
    }

    /// Run one allocation pass regardless of the requested status.
    ///
    /// Safe to call repeatedly: each pass only grants what is still missing.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub fn allocate_order(&self, order_id: OrderId) -> Result<OrderStatus, WorkflowError> {
        let _guard = self.locks.lock(order_id);
        self.allocate_locked(order_id)
    }

    /// Invoice URL of a fulfilled order, generating it on first request.
    ///
    /// `None` for orders of external channels, which invoice on their own.
    /// The document is rendered before the link is stored; if that write fails
    /// for any reason other than a lost race, the rendered document is left behind.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub fn get_invoice(&self, order_id: OrderId) -> Result<Option<String>, WorkflowError> {
        let _guard = self.locks.lock(order_id);

        let order = self.warehouse.read(|tx| tx.get_by_id(order_id))?;
        let decision = decide_invoice(&order, || self.internal_channel().map(|c| c.id_typed()))?;

        let link = match decision {
            InvoiceDecision::Resolved(link) => return Ok(link.url().map(str::to_string)),
            InvoiceDecision::External => InvoiceLink::External,
            InvoiceDecision::Generate => InvoiceLink::Generated(self.render_invoice(&order)?),
        };

        let stored: StoreResult<Order> = self.warehouse.transact(|tx| {
            tx.set_invoice_link(order_id, link.clone())?;
            tx.get_by_id(order_id)
        });
        match stored {
            Ok(order) => {
                info!(order_id = %order_id, url = ?link.url(), "invoice resolved");
                let event = OrderEvent::InvoiceResolved(InvoiceResolved {
                    order_id,
                    url: link.url().map(str::to_string),
                    occurred_at: Utc::now(),
                });
                self.publish(order_id, order.version(), &[event])?;
                Ok(link.url().map(str::to_string))
            }
            Err(StoreError::Conflict(_)) => {
                // Resolved by someone else first; theirs is the one kept.
                let order = self.warehouse.read(|tx| tx.get_by_id(order_id))?;
                Ok(order.invoice().url().map(str::to_string))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Put `qty` units of `sku` into `bin` and make them available.
    #[instrument(skip(self), fields(bin = %bin, sku = %sku), err)]
    pub fn receive_stock(
        &self,
        bin: BinId,
        sku: GlobalSkuId,
        qty: u64,
    ) -> Result<InventoryRecord, WorkflowError> {
        self.master.reverse_lookup(sku)?;

        let record = self.warehouse.transact(|tx| {
            tx.add_bin_stock(bin, sku, qty)?;
            tx.increment_available(sku, qty)?;
            tx.get_by_sku(sku)?
                .ok_or_else(|| StoreError::NotFound(format!("inventory for {sku}")))
        })?;
        info!(available = record.available(), "stock received");
        Ok(record)
    }

    fn place_order(
        &self,
        channel: &Channel,
        request: &OrderRequest,
    ) -> Result<OrderReceipt, WorkflowError> {
        let validator = Validator::new(&self.warehouse, &self.master, self.config.max_order_lines);
        validator.validate_order_request(&request.lines, request.client_id, request.customer_id)?;
        validator.check_channel_order_unique(channel.id_typed(), &request.channel_order_id)?;
        let skus = validator.resolve_global_skus(&request.lines, request.client_id)?;

        let order = Order::new(
            OrderId::generate(),
            request.client_id,
            request.customer_id,
            channel.id_typed(),
            request.channel_order_id.clone(),
            Utc::now(),
        )?;
        let order_id = order.id_typed();
        let lines = request
            .lines
            .iter()
            .zip(skus)
            .zip(1u32..)
            .map(|((line, sku), line_no)| {
                OrderLine::new(
                    order_id,
                    line_no,
                    sku,
                    line.quantity,
                    line.selling_price_per_unit,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let line_count = lines.len();
        let event = OrderEvent::OrderCreated(OrderCreated {
            order_id,
            channel_id: channel.id_typed(),
            channel_order_id: order.channel_order_id().to_string(),
            line_count,
            occurred_at: Utc::now(),
        });
        let version = order.version();

        // Uniqueness is enforced again by the store inside the transaction.
        self.warehouse.transact(|tx| tx.create(order, lines))?;
        info!(order_id = %order_id, channel = channel.name(), line_count, "order created");

        self.publish(order_id, version, &[event])?;
        Ok(OrderReceipt {
            order_id,
            line_count,
        })
    }

    fn allocate_locked(&self, order_id: OrderId) -> Result<OrderStatus, WorkflowError> {
        let committed = self.with_conflict_retries(order_id, "allocate", || {
            let (order, lines, inventory) = self.warehouse.read(|tx| {
                let order = tx.get_by_id(order_id)?;
                let lines = tx.get_lines(order_id)?;
                let inventory = inventory_snapshot(tx, &lines)?;
                Ok::<_, StoreError>((order, lines, inventory))
            })?;

            let plan = plan_allocation(&order, &lines, &inventory)?;
            if plan.is_noop() {
                debug!(order_id = %order_id, "nothing left to allocate");
                return Ok(Committed {
                    order,
                    events: Vec::new(),
                });
            }

            let order = self.warehouse.transact(|tx| apply_allocation(tx, &plan))?;

            let now = Utc::now();
            let mut events = vec![OrderEvent::LinesAllocated(LinesAllocated {
                order_id,
                grants: plan.grants.clone(),
                occurred_at: now,
            })];
            if plan.transition.is_some() {
                events.push(OrderEvent::OrderAllocated(OrderAllocated {
                    order_id,
                    occurred_at: now,
                }));
            }
            info!(
                order_id = %order_id,
                granted = plan.granted_total(),
                status = %order.status(),
                "allocation committed"
            );
            Ok(Committed { order, events })
        })?;

        self.publish(order_id, committed.order.version(), &committed.events)?;
        Ok(committed.order.status())
    }

    fn fulfill_locked(&self, order_id: OrderId) -> Result<OrderStatus, WorkflowError> {
        let committed = self.with_conflict_retries(order_id, "fulfill", || {
            let (order, lines) = self.warehouse.read(|tx| {
                Ok::<_, StoreError>((tx.get_by_id(order_id)?, tx.get_lines(order_id)?))
            })?;

            let plan = plan_fulfillment(&order, &lines)?;
            let order = self.warehouse.transact(|tx| apply_fulfillment(tx, &plan))?;

            let fulfilled_units: u64 = plan.drains.iter().map(|d| d.qty).sum();
            info!(order_id = %order_id, fulfilled_units, "order fulfilled");
            Ok(Committed {
                order,
                events: vec![OrderEvent::OrderFulfilled(OrderFulfilled {
                    order_id,
                    fulfilled_units,
                    occurred_at: Utc::now(),
                })],
            })
        })?;

        self.publish(order_id, committed.order.version(), &committed.events)?;
        Ok(committed.order.status())
    }

    /// Recompute and retry `attempt` while it loses optimistic checks.
    fn with_conflict_retries<T>(
        &self,
        order_id: OrderId,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(WorkflowError::Concurrency(reason))
                    if retries < self.config.max_conflict_retries =>
                {
                    retries += 1;
                    warn!(
                        order_id = %order_id,
                        operation,
                        retries,
                        reason = %reason,
                        "stale snapshot, recomputing"
                    );
                }
                other => return other,
            }
        }
    }

    fn render_invoice(&self, order: &Order) -> Result<String, WorkflowError> {
        let order_id = order.id_typed();
        let lines = self.warehouse.read(|tx| tx.get_lines(order_id))?;

        let mut client_skus: HashMap<GlobalSkuId, String> = HashMap::new();
        for line in &lines {
            let sku = line.global_sku_id();
            if !client_skus.contains_key(&sku) {
                client_skus.insert(sku, self.master.reverse_lookup(sku)?);
            }
        }

        let document = build_invoice(order, &lines, |sku| {
            client_skus
                .get(&sku)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("product {sku}")))
        })?;
        let url = self.renderer.render(&document)?;
        debug!(order_id = %order_id, total = document.total, url = %url, "invoice rendered");
        Ok(url)
    }

    fn internal_channel(&self) -> Result<Channel, WorkflowError> {
        self.channel(&self.config.internal_channel)
    }

    fn channel(&self, name: &str) -> Result<Channel, WorkflowError> {
        self.master
            .by_name(name)?
            .ok_or_else(|| WorkflowError::NotFound(format!("{name} channel does not exist")))
    }

    /// Publish committed events. The writes stand even if this fails.
    fn publish(
        &self,
        order_id: OrderId,
        sequence_number: u64,
        events: &[OrderEvent],
    ) -> Result<(), WorkflowError> {
        for event in events {
            let envelope =
                EventEnvelope::from_typed(order_id.0, ORDER_AGGREGATE, sequence_number, event)
                    .map_err(|e| WorkflowError::Publish(e.to_string()))?;
            if let Err(e) = self.bus.publish(envelope) {
                warn!(
                    order_id = %order_id,
                    event_type = event.event_type(),
                    error = ?e,
                    "failed to publish order event"
                );
                return Err(WorkflowError::Publish(format!("{e:?}")));
            }
        }
        Ok(())
    }
}

/// Inventory records for every SKU the lines reference. SKUs without a record
/// are left out; the planner reports them.
fn inventory_snapshot<T>(
    tx: &T,
    lines: &[OrderLine],
) -> StoreResult<HashMap<GlobalSkuId, InventoryRecord>>
where
    T: InventoryStore,
{
    let mut inventory = HashMap::new();
    for line in lines {
        let sku = line.global_sku_id();
        if inventory.contains_key(&sku) {
            continue;
        }
        if let Some(record) = tx.get_by_sku(sku)? {
            inventory.insert(sku, record);
        }
    }
    Ok(inventory)
}

fn apply_allocation<T>(tx: &mut T, plan: &AllocationPlan) -> StoreResult<Order>
where
    T: OrderStore + InventoryStore + BinStockStore,
{
    tx.check_version(plan.order_id, ExpectedVersion::Exact(plan.order_version))?;

    for sku in &plan.per_sku {
        tx.decrement_available(sku.sku, sku.qty, ExpectedVersion::Exact(sku.expected_version))?;
        tx.increment_allocated_pool(sku.sku, sku.qty)?;
        let draws = tx.record_allocation(sku.sku, sku.qty)?;
        debug!(sku = %sku.sku, qty = sku.qty, bins = draws.len(), "stock reserved");
    }
    for grant in &plan.grants {
        tx.allocate_line(plan.order_id, grant.line_no, grant.qty)?;
        debug!(line_no = grant.line_no, qty = grant.qty, "line granted");
    }
    if let Some(step) = plan.transition {
        tx.set_status(plan.order_id, step)?;
    }

    tx.get_by_id(plan.order_id)
}

fn apply_fulfillment<T>(tx: &mut T, plan: &FulfillmentPlan) -> StoreResult<Order>
where
    T: OrderStore + InventoryStore,
{
    tx.check_version(plan.order_id, ExpectedVersion::Exact(plan.order_version))?;

    for drain in &plan.drains {
        tx.fulfill_line(plan.order_id, drain.line_no, drain.qty)?;
    }
    for sku in &plan.per_sku {
        tx.decrement_allocated_pool(sku.sku, sku.qty)?;
    }
    tx.set_status(plan.order_id, plan.transition)?;

    tx.get_by_id(plan.order_id)
}
