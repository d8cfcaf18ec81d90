//! Errors surfaced by the order workflow.

use thiserror::Error;

use orderflow_core::{DomainError, RowError, RowErrors};

use crate::render::RenderError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed input; every offending row is listed.
    #[error("validation failed: {0}")]
    Validation(RowErrors),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Lines whose SKU has no inventory record; nothing was allocated.
    #[error("missing inventory: {0}")]
    MissingInventory(RowErrors),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Optimistic checks kept failing after every allowed retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// The change committed, but its event could not be published.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl WorkflowError {
    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::InvalidTransition(_) => "invalid_transition",
            WorkflowError::MissingInventory(_) => "missing_inventory",
            WorkflowError::Precondition(_) => "precondition",
            WorkflowError::InvariantViolation(_) => "invariant_violation",
            WorkflowError::Concurrency(_) => "concurrency",
            WorkflowError::Store(_) => "store",
            WorkflowError::Render(_) => "render",
            WorkflowError::Publish(_) => "publish",
        }
    }

    /// Row-level causes of a batched error; empty for the other kinds.
    pub fn rows(&self) -> &[RowError] {
        match self {
            WorkflowError::Validation(rows) | WorkflowError::MissingInventory(rows) => rows.rows(),
            _ => &[],
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(rows) => WorkflowError::Validation(rows),
            DomainError::Conflict(msg) => WorkflowError::Conflict(msg),
            DomainError::NotFound(msg) => WorkflowError::NotFound(msg),
            DomainError::InvalidTransition(msg) => WorkflowError::InvalidTransition(msg),
            DomainError::MissingInventory(rows) => WorkflowError::MissingInventory(rows),
            DomainError::Precondition(msg) => WorkflowError::Precondition(msg),
            DomainError::InvariantViolation(msg) => WorkflowError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => WorkflowError::Validation(RowErrors::single(msg)),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(msg) => WorkflowError::NotFound(msg),
            StoreError::Conflict(msg) => WorkflowError::Conflict(msg),
            StoreError::Concurrency(msg) => WorkflowError::Concurrency(msg),
            StoreError::Domain(err) => err.into(),
            StoreError::Unavailable(msg) => WorkflowError::Store(msg),
        }
    }
}
