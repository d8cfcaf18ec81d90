use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, typed_id};

typed_id!(
    /// Party identifier (client or customer).
    PartyId
);

/// Role a party plays in an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartyRole {
    Client,
    Customer,
}

impl core::fmt::Display for PartyRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PartyRole::Client => f.write_str("client"),
            PartyRole::Customer => f.write_str("customer"),
        }
    }
}

/// Master-data record for a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    id: PartyId,
    name: String,
    role: PartyRole,
}

impl Party {
    pub fn new(id: PartyId, name: impl Into<String>, role: PartyRole) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("party name cannot be empty"));
        }
        Ok(Self { id, name, role })
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> PartyRole {
        self.role
    }

    /// Fail unless this party plays `role`.
    ///
    /// A party with the wrong role is reported as not found: the reference does
    /// not resolve to a party of the expected kind.
    pub fn ensure_role(&self, role: PartyRole) -> DomainResult<()> {
        if self.role != role {
            return Err(DomainError::not_found(format!("{role} {}", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_rejected() {
        let err = Party::new(PartyId::generate(), "  ", PartyRole::Client).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn ensure_role_accepts_matching_role() {
        let party = Party::new(PartyId::generate(), "Acme Toys", PartyRole::Client).unwrap();
        assert!(party.ensure_role(PartyRole::Client).is_ok());
    }

    #[test]
    fn customer_is_not_a_client() {
        let party = Party::new(PartyId::generate(), "Jane", PartyRole::Customer).unwrap();
        match party.ensure_role(PartyRole::Client) {
            Err(DomainError::NotFound(msg)) => assert!(msg.starts_with("client ")),
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
