//! The module contains the error the engine can throw.
//!
//! Every failure mode a caller can recover from is a distinct variant:
//!
//! - [`TotalMismatch`] when a bill's stated total does not reconcile.
//! - [`QuantityExceeded`] when a reservation loses the allocation race or
//!   over-claims an item.
//! - [`AmountMismatch`] when a claimed amount disagrees with
//!   `quantity × unit_price`.
//!
//!  [`TotalMismatch`]: EngineError::TotalMismatch
//!  [`QuantityExceeded`]: EngineError::QuantityExceeded
//!  [`AmountMismatch`]: EngineError::AmountMismatch
use sea_orm::DbErr;
use thiserror::Error;

use crate::Money;

/// Engine custom errors.
///
/// All variants are recoverable by the caller; none are process-fatal. The
/// engine returns them from the operation that detected the problem and
/// never logs-and-swallows a correctness violation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// `subtotal + tax + tip` does not match the stated total within
    /// tolerance. `expected` is the computed sum.
    #[error("bill totals do not reconcile: expected {expected}, got {actual}")]
    TotalMismatch { expected: Money, actual: Money },
    /// The requested quantity does not fit in the item's remaining pool.
    ///
    /// This is the expected outcome of a lost allocation race, not a bug
    /// signal; callers may retry with at most `available` units.
    #[error("quantity exceeded: requested {requested}, {available} available")]
    QuantityExceeded { requested: i64, available: i64 },
    /// The claimed amount disagrees with `quantity × unit_price`.
    #[error("amount mismatch: expected {expected}, provided {provided}")]
    AmountMismatch { expected: Money, provided: Money },
    /// An assignment for this (item, participant) pair already exists; the
    /// caller should update it instead.
    #[error("participant already has an assignment for this item")]
    AlreadyAssigned,
    /// The acting or target user is not an active participant of the bill.
    /// An authorization failure, distinct from data validation.
    #[error("user is not an active participant of this bill")]
    NotParticipant,
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::TotalMismatch {
                    expected: a,
                    actual: b,
                },
                Self::TotalMismatch {
                    expected: c,
                    actual: d,
                },
            ) => a == c && b == d,
            (
                Self::QuantityExceeded {
                    requested: a,
                    available: b,
                },
                Self::QuantityExceeded {
                    requested: c,
                    available: d,
                },
            ) => a == c && b == d,
            (
                Self::AmountMismatch {
                    expected: a,
                    provided: b,
                },
                Self::AmountMismatch {
                    expected: c,
                    provided: d,
                },
            ) => a == c && b == d,
            (Self::AlreadyAssigned, Self::AlreadyAssigned) => true,
            (Self::NotParticipant, Self::NotParticipant) => true,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidStatus(a), Self::InvalidStatus(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
