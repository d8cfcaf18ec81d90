//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// A single row-level cause inside a batched failure.
///
/// `row` is 1-based and refers to the position of the offending entry in the
/// list the caller submitted (order request lines, order lines, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for RowError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

/// Collected row-level errors.
///
/// Validation passes push every problem they find and convert the collection
/// into a single error at the end, so callers see everything wrong at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowErrors(Vec<RowError>);

impl RowErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error that is not tied to a particular row (e.g. list size).
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![RowError::new(0, message)])
    }

    pub fn push(&mut self, row: usize, message: impl Into<String>) {
        self.0.push(RowError::new(row, message));
    }

    pub fn extend(&mut self, other: RowErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn rows(&self) -> &[RowError] {
        &self.0
    }

    /// `Ok(())` when nothing was collected, otherwise the error built by `wrap`.
    pub fn into_result(self, wrap: impl FnOnce(RowErrors) -> DomainError) -> DomainResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(wrap(self))
        }
    }
}

impl core::fmt::Display for RowErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            if err.row == 0 {
                f.write_str(&err.message)?;
            } else {
                core::fmt::Display::fmt(err, f)?;
            }
        }
        Ok(())
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Infrastructure
/// concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or inconsistent input, reported per row.
    #[error("validation failed: {0}")]
    Validation(RowErrors),

    /// A uniqueness rule or optimistic concurrency expectation was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A requested status transition is not allowed from the current status.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Referenced SKUs have no inventory record, reported per row.
    #[error("missing inventory: {0}")]
    MissingInventory(RowErrors),

    /// The operation is not available in the current state.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(RowErrors::single(msg))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Row-level causes for batched errors; empty for the others.
    pub fn rows(&self) -> &[RowError] {
        match self {
            DomainError::Validation(rows) | DomainError::MissingInventory(rows) => rows.rows(),
            _ => &[],
        }
    }
}
