//! Order request validation against master data.

use orderflow_core::DomainError;
use orderflow_orders::{ChannelId, OrderLineRequest, validate_lines};
use orderflow_parties::{PartyId, PartyRole};
use orderflow_products::GlobalSkuId;

use crate::error::WorkflowError;
use crate::store::{CatalogStore, OrderStore, PartyStore, UnitOfWork};

/// Stateless checks run before an order is written.
#[derive(Debug)]
pub struct Validator<'a, W, M> {
    warehouse: &'a W,
    master: &'a M,
    max_order_lines: usize,
}

impl<'a, W, M> Validator<'a, W, M>
where
    W: UnitOfWork,
    M: CatalogStore + PartyStore,
{
    pub fn new(warehouse: &'a W, master: &'a M, max_order_lines: usize) -> Self {
        Self {
            warehouse,
            master,
            max_order_lines,
        }
    }

    /// Line checks are batched; the client and customer checks stop at the
    /// first failure.
    pub fn validate_order_request(
        &self,
        lines: &[OrderLineRequest],
        client_id: PartyId,
        customer_id: PartyId,
    ) -> Result<(), WorkflowError> {
        validate_lines(lines, self.max_order_lines)?;
        self.master.check_role(client_id, PartyRole::Client)?;
        self.master.check_role(customer_id, PartyRole::Customer)?;
        Ok(())
    }

    /// All lines resolve or none do.
    pub fn resolve_global_skus(
        &self,
        lines: &[OrderLineRequest],
        client_id: PartyId,
    ) -> Result<Vec<GlobalSkuId>, WorkflowError> {
        orderflow_orders::resolve_global_skus(lines, |client_sku_id| {
            self.master
                .resolve_global_sku(client_sku_id, client_id)
                .map_err(WorkflowError::from)
        })
    }

    pub fn check_channel_order_unique(
        &self,
        channel_id: ChannelId,
        channel_order_id: &str,
    ) -> Result<(), WorkflowError> {
        let existing = self
            .warehouse
            .read(|tx| tx.find_by_channel_order(channel_id, channel_order_id))?;
        if existing.is_some() {
            return Err(
                DomainError::conflict("Channel Order Id already exists for this Channel").into(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryMasterData, InMemoryWarehouse};
    use orderflow_parties::Party;
    use orderflow_products::Product;

    struct Fixture {
        warehouse: InMemoryWarehouse,
        master: InMemoryMasterData,
        client: PartyId,
        customer: PartyId,
    }

    fn fixture() -> Fixture {
        let master = InMemoryMasterData::new();
        let (client, customer) = (PartyId::generate(), PartyId::generate());
        master
            .add_party(Party::new(client, "Acme Toys", PartyRole::Client).unwrap())
            .unwrap();
        master
            .add_party(Party::new(customer, "Jane", PartyRole::Customer).unwrap())
            .unwrap();
        Fixture {
            warehouse: InMemoryWarehouse::new(),
            master,
            client,
            customer,
        }
    }

    fn line(sku: &str) -> OrderLineRequest {
        OrderLineRequest {
            client_sku_id: sku.to_string(),
            quantity: 1,
            selling_price_per_unit: 250,
        }
    }

    #[test]
    fn swapped_parties_are_not_found() {
        let f = fixture();
        let validator = Validator::new(&f.warehouse, &f.master, 10);

        assert!(
            validator
                .validate_order_request(&[line("A")], f.client, f.customer)
                .is_ok()
        );
        let err = validator
            .validate_order_request(&[line("A")], f.customer, f.client)
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn line_errors_are_reported_before_party_lookups() {
        let f = fixture();
        let validator = Validator::new(&f.warehouse, &f.master, 10);

        let err = validator
            .validate_order_request(&[line("A"), line("A")], PartyId::generate(), f.customer)
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.rows()[0].row, 2);
    }

    #[test]
    fn unknown_skus_are_listed_per_row() {
        let f = fixture();
        let known = GlobalSkuId::generate();
        f.master
            .add_product(Product::new(known, f.client, "KNOWN", "Kite").unwrap())
            .unwrap();
        let validator = Validator::new(&f.warehouse, &f.master, 10);

        assert_eq!(
            validator.resolve_global_skus(&[line("KNOWN")], f.client).unwrap(),
            vec![known]
        );
        let err = validator
            .resolve_global_skus(&[line("NOPE"), line("KNOWN"), line("GONE")], f.client)
            .unwrap_err();
        let rows: Vec<usize> = err.rows().iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 3]);
    }
}
