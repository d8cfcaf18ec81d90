//! Storage collaborator contracts.
//!
//! The engine only needs simple lookups and writes; everything that must
//! commit together goes through [`UnitOfWork::transact`]. Write methods take
//! `&mut self` because they are only reachable on a transaction handle.

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use orderflow_core::{DomainError, ExpectedVersion};
use orderflow_inventory::{BinDraw, BinId, BinStockRecord, InventoryRecord};
use orderflow_orders::{Channel, ChannelId, InvoiceLink, Order, OrderId, OrderLine, StatusTransition};
use orderflow_parties::{PartyId, PartyRole};
use orderflow_products::GlobalSkuId;

pub use in_memory::{InMemoryMasterData, InMemoryWarehouse, WarehouseState};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or write-once rule violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Optimistic concurrency check failed; the caller may recompute and retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// A domain rule rejected the write.
    #[error(transparent)]
    Domain(DomainError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::NotFound(msg) => StoreError::NotFound(msg),
            other => StoreError::Domain(other),
        }
    }
}

pub trait OrderStore {
    /// Insert an order with its lines. Fails with `Conflict` if the
    /// `(channel, channel order id)` pair is taken.
    fn create(&mut self, order: Order, lines: Vec<OrderLine>) -> StoreResult<()>;

    fn get_by_id(&self, id: OrderId) -> StoreResult<Order>;

    fn get_lines(&self, order_id: OrderId) -> StoreResult<Vec<OrderLine>>;

    fn find_by_channel_order(
        &self,
        channel_id: ChannelId,
        channel_order_id: &str,
    ) -> StoreResult<Option<Order>>;

    /// Fail with `Concurrency` unless the order is at `expected`.
    fn check_version(&self, id: OrderId, expected: ExpectedVersion) -> StoreResult<()>;

    fn allocate_line(&mut self, order_id: OrderId, line_no: u32, qty: u64) -> StoreResult<()>;

    fn fulfill_line(&mut self, order_id: OrderId, line_no: u32, qty: u64) -> StoreResult<()>;

    fn set_status(&mut self, id: OrderId, transition: StatusTransition) -> StoreResult<()>;

    /// Write-once; a second write fails with `Conflict`.
    fn set_invoice_link(&mut self, id: OrderId, link: InvoiceLink) -> StoreResult<()>;
}

pub trait InventoryStore {
    fn get_by_sku(&self, sku: GlobalSkuId) -> StoreResult<Option<InventoryRecord>>;

    /// Restock path; creates the record on first receipt.
    fn increment_available(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<()>;

    /// Take units out of the available pool if the record is still at `expected`.
    fn decrement_available(
        &mut self,
        sku: GlobalSkuId,
        qty: u64,
        expected: ExpectedVersion,
    ) -> StoreResult<()>;

    fn increment_allocated_pool(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<()>;

    fn decrement_allocated_pool(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<()>;
}

pub trait BinStockStore {
    fn bins_for_sku(&self, sku: GlobalSkuId) -> StoreResult<Vec<BinStockRecord>>;

    fn add_bin_stock(&mut self, bin: BinId, sku: GlobalSkuId, qty: u64) -> StoreResult<()>;

    /// Mark `qty` units of `sku` as allocated across its bins.
    fn record_allocation(&mut self, sku: GlobalSkuId, qty: u64) -> StoreResult<Vec<BinDraw>>;
}

pub trait CatalogStore: Send + Sync {
    fn resolve_global_sku(
        &self,
        client_sku_id: &str,
        client_id: PartyId,
    ) -> StoreResult<Option<GlobalSkuId>>;

    fn reverse_lookup(&self, sku: GlobalSkuId) -> StoreResult<String>;
}

pub trait PartyStore: Send + Sync {
    /// `NotFound` unless `id` exists and plays `role`.
    fn check_role(&self, id: PartyId, role: PartyRole) -> StoreResult<()>;
}

pub trait ChannelStore: Send + Sync {
    fn by_name(&self, name: &str) -> StoreResult<Option<Channel>>;
}

/// Atomic access to the order, inventory and bin stores.
pub trait UnitOfWork: Send + Sync {
    type Tx: OrderStore + InventoryStore + BinStockStore;

    /// Run `work` against a private working copy; its writes become visible
    /// together on `Ok`, and are discarded on `Err`.
    fn transact<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T, E>,
        E: From<StoreError>;

    /// Read a consistent snapshot.
    fn read<T, E, F>(&self, view: F) -> Result<T, E>
    where
        F: FnOnce(&Self::Tx) -> Result<T, E>,
        E: From<StoreError>;
}

impl<U> UnitOfWork for Arc<U>
where
    U: UnitOfWork + ?Sized,
{
    type Tx = U::Tx;

    fn transact<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transact(work)
    }

    fn read<T, E, F>(&self, view: F) -> Result<T, E>
    where
        F: FnOnce(&Self::Tx) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).read(view)
    }
}

impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    fn resolve_global_sku(
        &self,
        client_sku_id: &str,
        client_id: PartyId,
    ) -> StoreResult<Option<GlobalSkuId>> {
        (**self).resolve_global_sku(client_sku_id, client_id)
    }

    fn reverse_lookup(&self, sku: GlobalSkuId) -> StoreResult<String> {
        (**self).reverse_lookup(sku)
    }
}

impl<S> PartyStore for Arc<S>
where
    S: PartyStore + ?Sized,
{
    fn check_role(&self, id: PartyId, role: PartyRole) -> StoreResult<()> {
        (**self).check_role(id, role)
    }
}

impl<S> ChannelStore for Arc<S>
where
    S: ChannelStore + ?Sized,
{
    fn by_name(&self, name: &str) -> StoreResult<Option<Channel>> {
        (**self).by_name(name)
    }
}
