//! Allocation planning.
//!
//! Given an order, its lines and a snapshot of the inventory records they
//! reference, compute how much of each line can be reserved right now. The
//! result is a plan of deltas; nothing is mutated here.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use orderflow_core::{AggregateRoot, DomainError, DomainResult, RowErrors};
use orderflow_inventory::InventoryRecord;
use orderflow_products::GlobalSkuId;

use crate::order::{Order, OrderId, OrderLine};
use crate::status::{OrderStatus, StatusTransition, transition};

/// Units granted to one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineGrant {
    pub line_no: u32,
    pub sku: GlobalSkuId,
    pub qty: u64,
}

/// Total units taken from one inventory record, with the record version the
/// plan was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkuAllocation {
    pub sku: GlobalSkuId,
    pub qty: u64,
    pub expected_version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub order_id: OrderId,
    /// Order version the plan was computed against.
    pub order_version: u64,
    /// Non-zero grants, in line order.
    pub grants: Vec<LineGrant>,
    /// Grants summed per SKU, in SKU order.
    pub per_sku: Vec<SkuAllocation>,
    /// Set when every line ends up fully allocated and the order was `CREATED`.
    pub transition: Option<StatusTransition>,
}

impl AllocationPlan {
    pub fn granted_total(&self) -> u64 {
        self.grants.iter().map(|g| g.qty).sum()
    }

    /// Nothing to write: no stock granted and no status change.
    pub fn is_noop(&self) -> bool {
        self.grants.is_empty() && self.transition.is_none()
    }
}

/// Plan one allocation pass.
///
/// Each line independently receives `min(remaining need, available)`. Lines
/// sharing a SKU draw from the same running balance. Partial grants are not an
/// error; the order only advances to `ALLOCATED` once every line is complete,
/// so repeated passes pick up stock that became available in between.
///
/// Fails with `MissingInventory` listing every line whose SKU has no inventory
/// record at all.
pub fn plan_allocation(
    order: &Order,
    lines: &[OrderLine],
    inventory: &HashMap<GlobalSkuId, InventoryRecord>,
) -> DomainResult<AllocationPlan> {
    if order.status() == OrderStatus::Fulfilled {
        return Err(DomainError::invalid_transition(format!(
            "order {} is already FULFILLED",
            order.id_typed()
        )));
    }

    let mut ordered: Vec<&OrderLine> = lines.iter().collect();
    ordered.sort_by_key(|l| l.line_no());

    let mut missing = RowErrors::new();
    for (idx, line) in ordered.iter().enumerate() {
        if line.order_id() != order.id_typed() {
            return Err(DomainError::invariant(format!(
                "line {} does not belong to order {}",
                line.line_no(),
                order.id_typed()
            )));
        }
        if !inventory.contains_key(&line.global_sku_id()) {
            missing.push(idx + 1, "Inventory for orderItem does not exist");
        }
    }
    missing.into_result(DomainError::MissingInventory)?;

    let mut balance: BTreeMap<GlobalSkuId, (u64, u64)> = BTreeMap::new();
    let mut grants = Vec::new();
    let mut complete = true;

    for line in ordered {
        let sku = line.global_sku_id();
        let record = &inventory[&sku];
        let (available, taken) = balance.entry(sku).or_insert((record.available(), 0));

        let wanted = line.remaining_to_allocate();
        let grant = wanted.min(*available);
        if grant > 0 {
            *available -= grant;
            *taken += grant;
            grants.push(LineGrant {
                line_no: line.line_no(),
                sku,
                qty: grant,
            });
        }
        if grant < wanted {
            complete = false;
        }
    }

    let per_sku = balance
        .into_iter()
        .filter(|(_, (_, taken))| *taken > 0)
        .map(|(sku, (_, taken))| SkuAllocation {
            sku,
            qty: taken,
            expected_version: inventory[&sku].version(),
        })
        .collect();

    let transition = if complete && order.status() == OrderStatus::Created {
        Some(transition(OrderStatus::Created, OrderStatus::Allocated)?)
    } else {
        None
    };

    Ok(AllocationPlan {
        order_id: order.id_typed(),
        order_version: order.version(),
        grants,
        per_sku,
        transition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orderflow_parties::PartyId;
    use proptest::prelude::*;

    use crate::channel::ChannelId;

    fn test_order() -> Order {
        Order::new(
            OrderId::generate(),
            PartyId::generate(),
            PartyId::generate(),
            ChannelId::generate(),
            "CH-1",
            Utc::now(),
        )
        .unwrap()
    }

    fn record(sku: GlobalSkuId, available: u64) -> InventoryRecord {
        let mut r = InventoryRecord::new(sku);
        if available > 0 {
            r.receive(available).unwrap();
        }
        r
    }

    fn stock(records: &[(GlobalSkuId, u64)]) -> HashMap<GlobalSkuId, InventoryRecord> {
        records
            .iter()
            .map(|(sku, qty)| (*sku, record(*sku, *qty)))
            .collect()
    }

    /// Apply a plan to in-memory copies, the way a store would.
    fn apply(
        plan: &AllocationPlan,
        order: &mut Order,
        lines: &mut [OrderLine],
        inventory: &mut HashMap<GlobalSkuId, InventoryRecord>,
    ) {
        for g in &plan.grants {
            let line = lines.iter_mut().find(|l| l.line_no() == g.line_no).unwrap();
            line.allocate(g.qty).unwrap();
        }
        for s in &plan.per_sku {
            let r = inventory.get_mut(&s.sku).unwrap();
            r.decrement_available(s.qty).unwrap();
            r.increment_allocated(s.qty).unwrap();
        }
        if let Some(t) = plan.transition {
            order.apply_transition(t).unwrap();
        }
        if !plan.grants.is_empty() {
            order.touch();
        }
    }

    #[test]
    fn scarce_stock_leaves_order_created() {
        let order = test_order();
        let (x, y) = (GlobalSkuId::generate(), GlobalSkuId::generate());
        let lines = vec![
            OrderLine::new(order.id_typed(), 1, x, 5, 100).unwrap(),
            OrderLine::new(order.id_typed(), 2, y, 3, 100).unwrap(),
        ];

        let plan = plan_allocation(&order, &lines, &stock(&[(x, 10), (y, 1)])).unwrap();

        assert_eq!(
            plan.grants,
            vec![
                LineGrant { line_no: 1, sku: x, qty: 5 },
                LineGrant { line_no: 2, sku: y, qty: 1 },
            ]
        );
        assert_eq!(plan.transition, None);
    }

    #[test]
    fn full_stock_moves_order_to_allocated() {
        let order = test_order();
        let x = GlobalSkuId::generate();
        let lines = vec![OrderLine::new(order.id_typed(), 1, x, 4, 100).unwrap()];

        let plan = plan_allocation(&order, &lines, &stock(&[(x, 4)])).unwrap();

        let t = plan.transition.unwrap();
        assert_eq!((t.from(), t.to()), (OrderStatus::Created, OrderStatus::Allocated));
        assert_eq!(plan.per_sku[0].qty, 4);
        assert_eq!(plan.per_sku[0].expected_version, 1);
    }

    #[test]
    fn zero_available_is_not_an_error() {
        let order = test_order();
        let x = GlobalSkuId::generate();
        let lines = vec![OrderLine::new(order.id_typed(), 1, x, 4, 100).unwrap()];

        let plan = plan_allocation(&order, &lines, &stock(&[(x, 0)])).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn missing_inventory_reports_every_row() {
        let order = test_order();
        let (x, y, z) = (
            GlobalSkuId::generate(),
            GlobalSkuId::generate(),
            GlobalSkuId::generate(),
        );
        let lines = vec![
            OrderLine::new(order.id_typed(), 1, x, 1, 100).unwrap(),
            OrderLine::new(order.id_typed(), 2, y, 1, 100).unwrap(),
            OrderLine::new(order.id_typed(), 3, z, 1, 100).unwrap(),
        ];

        let err = plan_allocation(&order, &lines, &stock(&[(y, 10)])).unwrap_err();
        match &err {
            DomainError::MissingInventory(rows) => {
                let rows: Vec<usize> = rows.rows().iter().map(|r| r.row).collect();
                assert_eq!(rows, vec![1, 3]);
            }
            other => panic!("expected missing inventory, got {other:?}"),
        }
    }

    #[test]
    fn lines_sharing_a_sku_share_the_balance() {
        let order = test_order();
        let x = GlobalSkuId::generate();
        let lines = vec![
            OrderLine::new(order.id_typed(), 1, x, 3, 100).unwrap(),
            OrderLine::new(order.id_typed(), 2, x, 3, 100).unwrap(),
        ];

        let plan = plan_allocation(&order, &lines, &stock(&[(x, 4)])).unwrap();
        assert_eq!(plan.grants[0].qty, 3);
        assert_eq!(plan.grants[1].qty, 1);
        assert_eq!(plan.per_sku.len(), 1);
        assert_eq!(plan.per_sku[0].qty, 4);
    }

    #[test]
    fn fulfilled_order_cannot_be_allocated() {
        let mut order = test_order();
        order
            .apply_transition(transition(OrderStatus::Created, OrderStatus::Allocated).unwrap())
            .unwrap();
        order
            .apply_transition(transition(OrderStatus::Allocated, OrderStatus::Fulfilled).unwrap())
            .unwrap();

        let err = plan_allocation(&order, &[], &HashMap::new()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn second_pass_only_grants_new_stock() {
        let mut order = test_order();
        let (x, y) = (GlobalSkuId::generate(), GlobalSkuId::generate());
        let mut lines = vec![
            OrderLine::new(order.id_typed(), 1, x, 5, 100).unwrap(),
            OrderLine::new(order.id_typed(), 2, y, 3, 100).unwrap(),
        ];
        let mut inventory = stock(&[(x, 10), (y, 1)]);

        let first = plan_allocation(&order, &lines, &inventory).unwrap();
        apply(&first, &mut order, &mut lines, &mut inventory);
        assert_eq!(order.status(), OrderStatus::Created);

        inventory.get_mut(&y).unwrap().receive(2).unwrap();
        let second = plan_allocation(&order, &lines, &inventory).unwrap();
        assert_eq!(second.grants, vec![LineGrant { line_no: 2, sku: y, qty: 2 }]);
        apply(&second, &mut order, &mut lines, &mut inventory);

        assert_eq!(order.status(), OrderStatus::Allocated);
        assert_eq!(inventory[&x].available(), 5);
        assert_eq!(inventory[&y].available(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: bounds hold, stock is conserved and a second pass with no
        /// new stock changes nothing.
        #[test]
        fn allocation_invariants(
            wanted in prop::collection::vec((0usize..3, 1u64..50), 1..8),
            available in prop::collection::vec(0u64..80, 3),
        ) {
            let skus: Vec<GlobalSkuId> = (0..3).map(|_| GlobalSkuId::generate()).collect();
            let mut order = test_order();
            let mut lines: Vec<OrderLine> = wanted
                .iter()
                .enumerate()
                .map(|(i, (s, q))| {
                    OrderLine::new(order.id_typed(), i as u32 + 1, skus[*s], *q, 10).unwrap()
                })
                .collect();
            let mut inventory = stock(&[
                (skus[0], available[0]),
                (skus[1], available[1]),
                (skus[2], available[2]),
            ]);

            let plan = plan_allocation(&order, &lines, &inventory).unwrap();
            apply(&plan, &mut order, &mut lines, &mut inventory);

            for line in &lines {
                prop_assert!(line.allocated_quantity() <= line.ordered_quantity());
            }
            for (i, sku) in skus.iter().enumerate() {
                let granted: u64 = lines
                    .iter()
                    .filter(|l| l.global_sku_id() == *sku)
                    .map(|l| l.allocated_quantity())
                    .sum();
                prop_assert_eq!(available[i] - inventory[sku].available(), granted);
                prop_assert_eq!(inventory[sku].allocated(), granted);
            }
            let all_full = lines.iter().all(|l| l.is_fully_allocated());
            prop_assert_eq!(order.status() == OrderStatus::Allocated, all_full);

            let lines_before = lines.clone();
            let status_before = order.status();
            let again = plan_allocation(&order, &lines, &inventory).unwrap();
            prop_assert!(again.is_noop());
            apply(&again, &mut order, &mut lines, &mut inventory);
            prop_assert_eq!(lines, lines_before);
            prop_assert_eq!(order.status(), status_before);
        }
    }
}
