//! In-memory stores for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use orderflow_core::{AggregateRoot, DomainResult, ExpectedVersion};
use orderflow_inventory::{BinDraw, BinId, BinStockRecord, InventoryRecord, plan_bin_draws};
use orderflow_orders::{Channel, ChannelId, InvoiceLink, Order, OrderId, OrderLine, StatusTransition};
use orderflow_parties::{Party, PartyId, PartyRole};
use orderflow_products::{GlobalSkuId, Product};

use super::{
    BinStockStore, CatalogStore, ChannelStore, InventoryStore, OrderStore, PartyStore, StoreError,
    StoreResult, UnitOfWork,
};

/// Everything the warehouse keeps about orders and stock.
///
/// Doubles as the transaction handle: a transaction works on a clone and the
/// clone replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct WarehouseState {
    orders: HashMap<OrderId, Order>,
    lines: HashMap<OrderId, Vec<OrderLine>>,
    channel_index: HashMap<(ChannelId, String), OrderId>,
    inventory: HashMap<GlobalSkuId, InventoryRecord>,
    bins: HashMap<(BinId, GlobalSkuId), BinStockRecord>,
}

impl WarehouseState {
    fn order_mut(&mut self, id: OrderId) -> StoreResult<&mut Order> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    fn line_mut(&mut self, order_id: OrderId, line_no: u32) -> StoreResult<&mut OrderLine> {
        self.lines
            .get_mut(&order_id)
            .and_then(|lines| lines.iter_mut().find(|l| l.line_no() == line_no))
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id} line {line_no}")))
    }

    fn record_mut(&mut self, sku: GlobalSkuId) -> StoreResult<&mut InventoryRecord> {
        self.inventory
            .get_mut(&sku)
            .ok_or_else(|| StoreError::NotFound(format!("inventory for {sku}")))
    }

    /// Apply a domain mutation to one line and mark the order as changed.
    fn update_line(
        &mut self,
        order_id: OrderId,
        line_no: u32,
        change: impl FnOnce(&mut OrderLine) -> DomainResult<()>,
    ) -> StoreResult<()> {
        change(self.line_mut(order_id, line_no)?)?;
        self.order_mut(order_id)?.touch();
        Ok(())
    }
}

impl OrderStore for WarehouseState {
    fn create(&mut self, order: Order, lines: Vec<OrderLine>) -> StoreResult<()> {
        let id = order.id_typed();
        if self.orders.contains_key(&id) {
            return Err(StoreError::Conflict(format!("order {id} already exists")));
        }
        let key = (order.channel_id(), order.channel_order_id().to_string());
        if self.channel_index.contains_key(&key) {
            return Err(StoreError::Conflict(
                "Channel Order Id already exists for this Channel".to_string(),
            ));
        }
        if let Some(stray) = lines.iter().find(|l| l.order_id() != id) {
            return Err(StoreError::Conflict(format!(
                "line {} belongs to order {}",
                stray.line_no(),
                stray.order_id()
            )));
        }

        self.channel_index.insert(key, id);
        self.lines.insert(id, lines);
        self.orders.insert(id, order);
        Ok(())
    }

    fn get_by_id(&self, id: OrderId) -> StoreResult<Order> {
        self.orders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    fn get_lines(&self, order_id: OrderId) -> StoreResult<Vec<OrderLine>> {
        self.lines
            .get(&order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))
    }

    fn find_by_channel_order(
        &self,
        channel_id: ChannelId,
        channel_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        let key = (channel_id, channel_order_id.trim().to_string());
        Ok(self
            .channel_index
            .get(&key)
            .and_then(|id| self.orders.get(id))
            .cloned())
    }

    fn check_version(&self, id: OrderId, expected: ExpectedVersion) -> StoreResult<()> {
        let order = self
            .orders
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;
        if !expected.matches(order.version()) {
            return Err(StoreError::Concurrency(format!(
                "order {id} changed (expected {expected:?}, found {})",
                order.version()
            )));
        }
        Ok(())
    }

    fn allocate_line(&mut self, order_id: OrderId, line_no: u32, qty: u64) -> StoreResult<()> {
        self.update_line(order_id, line_no, |line| line.allocate(qty))
    }

    fn fulfill_line(&mut self, order_id: OrderId, line_no: u32, qty: u64) -> StoreResult<()> {
        self.update_line(order_id, line_no, |line| line.fulfill(qty))
    }

    fn set_status(&mut self, id: OrderId, transition: StatusTransition) -> StoreResult<()> {
        Ok(self.order_mut(id)?.apply_transition(transition)?)
    }

    fn set_invoice_link(&mut self, id: OrderId, link: InvoiceLink) -> StoreResult<()> {
        Ok(self.order_mut(id)?.resolve_invoice(link)?)
    }
}

impl InventoryStore for WarehouseState {
    fn get_by_sku(&self, sku: GlobalSkuId) -> StoreResult<Option<InventoryRecord>> {
        Ok(self.inventory.get(&sku).cloned())
    }

    fn increment_available(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<()> {
        let record = self
            .inventory
            .entry(sku)
            .or_insert_with(|| InventoryRecord::new(sku));
        Ok(record.receive(qty)?)
    }

    fn decrement_available(
        &mut self,
        sku: GlobalSkuId,
        qty: u64,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        let record = self.record_mut(sku)?;
        if !expected.matches(record.version()) {
            return Err(StoreError::Concurrency(format!(
                "inventory for {sku} changed (expected {expected:?}, found {})",
                record.version()
            )));
        }
        Ok(record.decrement_available(qty)?)
    }

    fn increment_allocated_pool(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<()> {
        Ok(self.record_mut(sku)?.increment_allocated(qty)?)
    }

    fn decrement_allocated_pool(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<()> {
        Ok(self.record_mut(sku)?.decrement_allocated(qty)?)
    }
}

impl BinStockStore for WarehouseState {
    fn bins_for_sku(&self, sku: GlobalSkuId) -> StoreResult<Vec<BinStockRecord>> {
        let mut bins: Vec<BinStockRecord> = self
            .bins
            .values()
            .filter(|b| b.sku == sku)
            .cloned()
            .collect();
        bins.sort_by_key(|b| b.bin);
        Ok(bins)
    }

    fn add_bin_stock(&mut self, bin: BinId, sku: GlobalSkuId, qty: u64) -> StoreResult<()> {
        let record = self
            .bins
            .entry((bin, sku))
            .or_insert_with(|| BinStockRecord::new(bin, sku));
        record.quantity = record
            .quantity
            .checked_add(qty)
            .ok_or_else(|| StoreError::Conflict(format!("bin {bin} quantity overflow")))?;
        Ok(())
    }

    fn record_allocation(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<Vec<BinDraw>> {
        let draws = plan_bin_draws(&self.bins_for_sku(sku)?, qty)?;
        for draw in &draws {
            if let Some(record) = self.bins.get_mut(&(draw.bin, sku)) {
                record.allocated += draw.qty;
            }
        }
        Ok(draws)
    }
}

/// In-memory warehouse (orders, inventory, bins) with atomic transactions.
///
/// Transactions are serialized by a write lock and run on a cloned state.
/// Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryWarehouse {
    state: RwLock<WarehouseState>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnitOfWork for InMemoryWarehouse {
    type Tx = WarehouseState;

    fn transact<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let mut working = state.clone();
        let out = work(&mut working)?;
        *state = working;
        Ok(out)
    }

    fn read<T, E, F>(&self, view: F) -> Result<T, E>
    where
        F: FnOnce(&Self::Tx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        view(&state)
    }
}

/// In-memory parties, catalog and channels.
#[derive(Debug, Default)]
pub struct InMemoryMasterData {
    parties: RwLock<HashMap<PartyId, Party>>,
    products: RwLock<HashMap<GlobalSkuId, Product>>,
    channels: RwLock<HashMap<String, Channel>>,
}

impl InMemoryMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_party(&self, party: Party) -> StoreResult<()> {
        let mut parties = self
            .parties
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        parties.insert(party.id_typed(), party);
        Ok(())
    }

    /// Register a product. A client cannot reuse one of its SKU codes.
    pub fn add_product(&self, product: Product) -> StoreResult<()> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        if products
            .values()
            .any(|p| p.matches(product.client_id(), product.client_sku_id()))
        {
            return Err(StoreError::Conflict(format!(
                "client SKU {} already exists for client {}",
                product.client_sku_id(),
                product.client_id()
            )));
        }
        products.insert(product.global_sku_id(), product);
        Ok(())
    }

    pub fn add_channel(&self, channel: Channel) -> StoreResult<()> {
        let mut channels = self
            .channels
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        if channels.contains_key(channel.name()) {
            return Err(StoreError::Conflict(format!(
                "channel {} already exists",
                channel.name()
            )));
        }
        channels.insert(channel.name().to_string(), channel);
        Ok(())
    }
}

impl CatalogStore for InMemoryMasterData {
    fn resolve_global_sku(
        &self,
        client_sku_id: &str,
        client_id: PartyId,
    ) -> StoreResult<Option<GlobalSkuId>> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(products
            .values()
            .find(|p| p.matches(client_id, client_sku_id))
            .map(Product::global_sku_id))
    }

    fn reverse_lookup(&self, sku: GlobalSkuId) -> StoreResult<String> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        products
            .get(&sku)
            .map(|p| p.client_sku_id().to_string())
            .ok_or_else(|| StoreError::NotFound(format!("product {sku}")))
    }
}

impl PartyStore for InMemoryMasterData {
    fn check_role(&self, id: PartyId, role: PartyRole) -> StoreResult<()> {
        let parties = self
            .parties
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        let party = parties
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("{role} {id}")))?;
        Ok(party.ensure_role(role)?)
    }
}

impl ChannelStore for InMemoryMasterData {
    fn by_name(&self, name: &str) -> StoreResult<Option<Channel>> {
        let channels = self
            .channels
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(channels.get(name.trim()).cloned())
    }
}
