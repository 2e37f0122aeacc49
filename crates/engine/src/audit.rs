//! Consistency audit report types.
//!
//! The auditor never throws: it walks the whole bill, accumulates every
//! issue it finds, and returns them in a [`ConsistencyReport`] so callers
//! (and tests) can see all problems at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Warning,
    Error,
}

/// A single inconsistency found while auditing a bill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditIssue {
    /// The bill's own `subtotal + tax + tip` no longer matches its total.
    TotalMismatch { expected: Money, actual: Money },
    /// The sum of assignment quantities exceeds the item's total quantity.
    /// Unreachable while writes go through the allocation pool, but audited
    /// anyway: a recomputation path must never assume earlier invariants
    /// held.
    OverAssigned {
        item_id: Uuid,
        assigned: i64,
        total_quantity: i64,
    },
    /// Some units of the item are still unclaimed. A warning, not an error.
    PartiallyAssigned {
        item_id: Uuid,
        assigned: i64,
        total_quantity: i64,
    },
    /// A stored assignment amount disagrees with `quantity × unit_price`
    /// beyond tolerance.
    AmountMismatch {
        assignment_id: Uuid,
        expected: Money,
        stored: Money,
    },
    /// The item's reserved counter disagrees with the live assignment sum.
    PoolDrift {
        item_id: Uuid,
        reserved_quantity: i64,
        assigned: i64,
    },
}

impl AuditIssue {
    #[must_use]
    pub fn severity(&self) -> AuditSeverity {
        match self {
            Self::PartiallyAssigned { .. } => AuditSeverity::Warning,
            _ => AuditSeverity::Error,
        }
    }
}

/// The outcome of a read-only consistency pass over one bill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub bill_id: Uuid,
    pub issues: Vec<AuditIssue>,
    pub audited_at: DateTime<Utc>,
}

impl ConsistencyReport {
    /// `true` when no error-severity issue was found (warnings allowed).
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.issues
            .iter()
            .all(|issue| issue.severity() != AuditSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &AuditIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity() == AuditSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &AuditIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity() == AuditSeverity::Warning)
    }
}
