//! Fulfillment planning.
//!
//! One pass ships everything currently allocated: each line's
//! allocated-but-unfulfilled remainder is drained from the line and from the
//! SKU's allocated pool, and the order moves to `FULFILLED`.

use std::collections::BTreeMap;

use orderflow_core::{AggregateRoot, DomainError, DomainResult};
use orderflow_products::GlobalSkuId;

use crate::order::{Order, OrderId, OrderLine};
use crate::status::{OrderStatus, StatusTransition, transition};

/// Units shipped for one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDrain {
    pub line_no: u32,
    pub sku: GlobalSkuId,
    pub qty: u64,
}

/// Units removed from one SKU's allocated pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkuDrain {
    pub sku: GlobalSkuId,
    pub qty: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentPlan {
    pub order_id: OrderId,
    pub order_version: u64,
    pub drains: Vec<LineDrain>,
    pub per_sku: Vec<SkuDrain>,
    pub transition: StatusTransition,
}

/// Plan the fulfillment of an `ALLOCATED` order.
pub fn plan_fulfillment(order: &Order, lines: &[OrderLine]) -> DomainResult<FulfillmentPlan> {
    let transition = transition(order.status(), OrderStatus::Fulfilled)?;

    let mut ordered: Vec<&OrderLine> = lines.iter().collect();
    ordered.sort_by_key(|l| l.line_no());

    let mut drains = Vec::new();
    let mut per_sku: BTreeMap<GlobalSkuId, u64> = BTreeMap::new();
    for line in ordered {
        if line.order_id() != order.id_typed() {
            return Err(DomainError::invariant(format!(
                "line {} does not belong to order {}",
                line.line_no(),
                order.id_typed()
            )));
        }
        let qty = line.remaining_to_fulfill();
        if qty == 0 {
            continue;
        }
        drains.push(LineDrain {
            line_no: line.line_no(),
            sku: line.global_sku_id(),
            qty,
        });
        *per_sku.entry(line.global_sku_id()).or_default() += qty;
    }

    Ok(FulfillmentPlan {
        order_id: order.id_typed(),
        order_version: order.version(),
        drains,
        per_sku: per_sku
            .into_iter()
            .map(|(sku, qty)| SkuDrain { sku, qty })
            .collect(),
        transition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orderflow_parties::PartyId;

    use crate::channel::ChannelId;

    fn allocated_order() -> Order {
        let mut order = Order::new(
            OrderId::generate(),
            PartyId::generate(),
            PartyId::generate(),
            ChannelId::generate(),
            "CH-2",
            Utc::now(),
        )
        .unwrap();
        order
            .apply_transition(transition(OrderStatus::Created, OrderStatus::Allocated).unwrap())
            .unwrap();
        order
    }

    fn allocated_line(order: &Order, line_no: u32, sku: GlobalSkuId, qty: u64) -> OrderLine {
        let mut line = OrderLine::new(order.id_typed(), line_no, sku, qty, 100).unwrap();
        line.allocate(qty).unwrap();
        line
    }

    #[test]
    fn drains_every_allocated_line() {
        let order = allocated_order();
        let (x, y) = (GlobalSkuId::generate(), GlobalSkuId::generate());
        let lines = vec![allocated_line(&order, 1, x, 5), allocated_line(&order, 2, y, 3)];

        let plan = plan_fulfillment(&order, &lines).unwrap();

        assert_eq!(
            plan.drains,
            vec![
                LineDrain { line_no: 1, sku: x, qty: 5 },
                LineDrain { line_no: 2, sku: y, qty: 3 },
            ]
        );
        assert_eq!(plan.transition.to(), OrderStatus::Fulfilled);
        assert_eq!(plan.per_sku.iter().map(|d| d.qty).sum::<u64>(), 8);
    }

    #[test]
    fn already_shipped_units_are_not_drained_twice() {
        let order = allocated_order();
        let x = GlobalSkuId::generate();
        let mut line = allocated_line(&order, 1, x, 5);
        line.fulfill(2).unwrap();

        let plan = plan_fulfillment(&order, &[line]).unwrap();
        assert_eq!(plan.drains[0].qty, 3);
    }

    #[test]
    fn created_order_cannot_be_fulfilled() {
        let order = Order::new(
            OrderId::generate(),
            PartyId::generate(),
            PartyId::generate(),
            ChannelId::generate(),
            "CH-3",
            Utc::now(),
        )
        .unwrap();

        let err = plan_fulfillment(&order, &[]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
