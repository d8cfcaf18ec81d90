//! Order status machine.
//!
//! `CREATED → ALLOCATED → FULFILLED`, strictly linear. The table below is the
//! only place that knows which moves are legal, and [`StatusTransition`] can
//! only be obtained through [`transition`], so stores cannot be asked to write
//! a status that was not checked here.

use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Created,
    Allocated,
    Fulfilled,
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OrderStatus::Created => f.write_str("CREATED"),
            OrderStatus::Allocated => f.write_str("ALLOCATED"),
            OrderStatus::Fulfilled => f.write_str("FULFILLED"),
        }
    }
}

/// The single status an order may move to next, if any.
pub fn next_status(current: OrderStatus) -> Option<OrderStatus> {
    match current {
        OrderStatus::Created => Some(OrderStatus::Allocated),
        OrderStatus::Allocated => Some(OrderStatus::Fulfilled),
        OrderStatus::Fulfilled => None,
    }
}

/// A checked status move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    from: OrderStatus,
    to: OrderStatus,
}

impl StatusTransition {
    pub fn from(&self) -> OrderStatus {
        self.from
    }

    pub fn to(&self) -> OrderStatus {
        self.to
    }
}

/// Validate a requested move. No-ops, skips and reversals are rejected.
pub fn transition(current: OrderStatus, target: OrderStatus) -> DomainResult<StatusTransition> {
    match next_status(current) {
        Some(next) if next == target => Ok(StatusTransition {
            from: current,
            to: target,
        }),
        _ => Err(DomainError::invalid_transition(format!(
            "cannot move order from {current} to {target}"
        ))),
    }
}
