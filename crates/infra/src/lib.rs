//! Infrastructure layer: stores, rendering, configuration and the order
//! workflow that ties the domain crates together.

pub mod config;
pub mod error;
pub mod locks;
pub mod render;
pub mod store;
pub mod validator;
pub mod workflow;

pub use config::EngineConfig;
pub use error::WorkflowError;
pub use render::{InMemoryInvoiceRenderer, InvoiceRenderer, JsonFileInvoiceRenderer, RenderError};
pub use store::{
    BinStockStore, CatalogStore, ChannelStore, InMemoryMasterData, InMemoryWarehouse,
    InventoryStore, OrderStore, PartyStore, StoreError, StoreResult, UnitOfWork,
};
pub use validator::Validator;
pub use workflow::{OrderReceipt, OrderWorkflow};
