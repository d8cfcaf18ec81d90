use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, typed_id};
use orderflow_parties::PartyId;

typed_id!(
    /// Warehouse-wide SKU identifier.
    GlobalSkuId
);

/// Aggregate root: Product (client SKU ↔ global SKU).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    global_sku_id: GlobalSkuId,
    client_id: PartyId,
    client_sku_id: String,
    name: String,
}

impl Product {
    pub fn new(
        global_sku_id: GlobalSkuId,
        client_id: PartyId,
        client_sku_id: impl Into<String>,
        name: impl Into<String>,
    ) -> DomainResult<Self> {
        let client_sku_id = client_sku_id.into().trim().to_string();
        if client_sku_id.is_empty() {
            return Err(DomainError::validation("client SKU cannot be empty"));
        }
        Ok(Self {
            global_sku_id,
            client_id,
            client_sku_id,
            name: name.into(),
        })
    }

    pub fn global_sku_id(&self) -> GlobalSkuId {
        self.global_sku_id
    }

    pub fn client_id(&self) -> PartyId {
        self.client_id
    }

    pub fn client_sku_id(&self) -> &str {
        &self.client_sku_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `client_sku_id` from `client_id` refers to this product.
    pub fn matches(&self, client_id: PartyId, client_sku_id: &str) -> bool {
        self.client_id == client_id && self.client_sku_id == client_sku_id.trim()
    }
}
