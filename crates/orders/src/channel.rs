use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, typed_id};

typed_id!(
    /// Sales channel identifier.
    ChannelId
);

/// Origin system of an order (internal storefront or an external marketplace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    id: ChannelId,
    name: String,
}

impl Channel {
    pub fn new(id: ChannelId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("channel name cannot be empty"));
        }
        Ok(Self { id, name })
    }

    pub fn id_typed(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
