//! Structural validation of order requests.
//!
//! Line-level problems are collected for every row and reported together.
//! Rows are 1-based positions in the submitted line list.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, RowErrors};
use orderflow_parties::PartyId;
use orderflow_products::GlobalSkuId;

/// Default upper bound on the number of lines in one order.
pub const MAX_ORDER_LINES: usize = 1000;

/// One requested line, keyed by the client's own SKU code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub client_sku_id: String,
    pub quantity: u64,
    /// Selling price per unit in smallest currency unit.
    pub selling_price_per_unit: u64,
}

/// Order submission as received from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_id: PartyId,
    pub customer_id: PartyId,
    pub channel_order_id: String,
    pub lines: Vec<OrderLineRequest>,
}

/// Check list size, per-line fields and client SKU uniqueness.
///
/// The size check fails immediately; everything else is batched.
pub fn validate_lines(lines: &[OrderLineRequest], max_lines: usize) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation("order line list cannot be empty"));
    }
    if lines.len() > max_lines {
        return Err(DomainError::validation(format!(
            "order line list cannot exceed {max_lines} lines (got {})",
            lines.len()
        )));
    }

    let mut errors = RowErrors::new();
    let mut seen = HashSet::new();
    for (idx, line) in lines.iter().enumerate() {
        let row = idx + 1;
        let sku = line.client_sku_id.trim();
        if sku.is_empty() {
            errors.push(row, "clientSkuId cannot be empty");
        } else if !seen.insert(sku) {
            errors.push(row, "Duplicate clientSkuId");
        }
        if line.quantity == 0 {
            errors.push(row, "quantity must be positive");
        }
    }
    errors.into_result(DomainError::Validation)
}

/// Map every line's client SKU to a global SKU.
///
/// Either every line resolves, or the whole resolution fails with one error
/// per unresolved row. Lookup failures (as opposed to unknown SKUs) abort
/// immediately.
pub fn resolve_global_skus<F, E>(lines: &[OrderLineRequest], mut resolve: F) -> Result<Vec<GlobalSkuId>, E>
where
    F: FnMut(&str) -> Result<Option<GlobalSkuId>, E>,
    E: From<DomainError>,
{
    let mut errors = RowErrors::new();
    let mut resolved = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        match resolve(line.client_sku_id.trim())? {
            Some(sku) => resolved.push(sku),
            None => errors.push(idx + 1, "clientSkuId does not exist"),
        }
    }
    errors.into_result(DomainError::Validation)?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn line(sku: &str, quantity: u64) -> OrderLineRequest {
        OrderLineRequest {
            client_sku_id: sku.to_string(),
            quantity,
            selling_price_per_unit: 100,
        }
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = validate_lines(&[], MAX_ORDER_LINES).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn oversized_list_is_rejected() {
        let lines: Vec<_> = (0..=MAX_ORDER_LINES)
            .map(|i| line(&format!("SKU-{i}"), 1))
            .collect();
        let err = validate_lines(&lines, MAX_ORDER_LINES).unwrap_err();
        assert!(err.to_string().contains("cannot exceed 1000"));
    }

    #[test]
    fn every_duplicate_row_is_reported() {
        let lines = vec![
            line("A", 1),
            line("B", 1),
            line("A", 2),
            line(" B ", 1),
            line("A", 1),
        ];
        let err = validate_lines(&lines, MAX_ORDER_LINES).unwrap_err();
        let rows: Vec<usize> = err.rows().iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![3, 4, 5]);
    }

    #[test]
    fn field_errors_are_batched_with_duplicates() {
        let lines = vec![line("A", 0), line("", 1), line("A", 1)];
        let err = validate_lines(&lines, MAX_ORDER_LINES).unwrap_err();
        let rows: Vec<(usize, &str)> = err
            .rows()
            .iter()
            .map(|r| (r.row, r.message.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, "quantity must be positive"),
                (2, "clientSkuId cannot be empty"),
                (3, "Duplicate clientSkuId"),
            ]
        );
    }

    #[test]
    fn resolution_reports_all_unknown_rows() {
        let known: HashMap<&str, GlobalSkuId> = [("A", GlobalSkuId::generate())].into();
        let lines = vec![line("X", 1), line("A", 1), line("Y", 1)];

        let err = resolve_global_skus(&lines, |sku| Ok::<_, DomainError>(known.get(sku).copied()))
            .unwrap_err();
        let rows: Vec<usize> = err.rows().iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 3]);
    }

    #[test]
    fn resolution_keeps_line_order() {
        let a = GlobalSkuId::generate();
        let b = GlobalSkuId::generate();
        let known: HashMap<&str, GlobalSkuId> = [("A", a), ("B", b)].into();
        let lines = vec![line("B", 1), line("A", 1)];

        let resolved =
            resolve_global_skus(&lines, |sku| Ok::<_, DomainError>(known.get(sku).copied())).unwrap();
        assert_eq!(resolved, vec![b, a]);
    }
}
