//! The module contains the reservation counter guarding a line item's
//! finite quantity.
//!
//! Every unit a participant claims must first be reserved here. The pool
//! tracks how many of the item's `total_quantity` units are already taken
//! by live assignments; the invariant is
//! `0 <= reserved_quantity <= total_quantity` at all times.
//!
//! This struct is the in-memory form used for validation, previews and unit
//! tests. The persisted counter lives on the `line_items` row and is only
//! ever moved by a single atomic conditional update (see
//! `ops::allocation`), so two concurrent claims can never both take the
//! last unit.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Per-item allocation state: total purchasable quantity vs. quantity
/// already reserved by assignments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPool {
    pub total_quantity: i64,
    pub reserved_quantity: i64,
}

impl AllocationPool {
    pub fn new(total_quantity: i64) -> ResultEngine<Self> {
        if total_quantity <= 0 {
            return Err(EngineError::InvalidAmount(
                "total_quantity must be > 0".to_string(),
            ));
        }
        Ok(Self {
            total_quantity,
            reserved_quantity: 0,
        })
    }

    /// Units still claimable.
    #[must_use]
    pub fn available(&self) -> i64 {
        (self.total_quantity - self.reserved_quantity).max(0)
    }

    /// Reserves `delta` more units, or leaves the pool unchanged and
    /// reports the shortfall.
    ///
    /// The check and the increment are one step; callers never observe a
    /// pool that passed the check but has not yet been incremented.
    pub fn try_reserve(&mut self, delta: i64) -> ResultEngine<()> {
        if delta <= 0 {
            return Err(EngineError::InvalidAmount(
                "reservation delta must be > 0".to_string(),
            ));
        }
        if self.reserved_quantity + delta > self.total_quantity {
            return Err(EngineError::QuantityExceeded {
                requested: delta,
                available: self.available(),
            });
        }
        self.reserved_quantity += delta;
        Ok(())
    }

    /// Releases `delta` units back to the pool, floored at zero.
    ///
    /// Used when an assignment is removed or reduced. Releasing more than
    /// is reserved clamps instead of going negative, so a release can
    /// always be applied.
    pub fn release(&mut self, delta: i64) {
        self.reserved_quantity = (self.reserved_quantity - delta.max(0)).max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_up_to_total() {
        let mut pool = AllocationPool::new(3).unwrap();
        pool.try_reserve(2).unwrap();
        pool.try_reserve(1).unwrap();
        assert_eq!(pool.reserved_quantity, 3);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn over_reservation_reports_shortfall_and_leaves_pool_unchanged() {
        let mut pool = AllocationPool::new(3).unwrap();
        pool.try_reserve(2).unwrap();

        let err = pool.try_reserve(2).unwrap_err();
        assert_eq!(
            err,
            EngineError::QuantityExceeded {
                requested: 2,
                available: 1,
            }
        );
        assert_eq!(pool.reserved_quantity, 2);
    }

    #[test]
    fn release_floors_at_zero() {
        let mut pool = AllocationPool::new(3).unwrap();
        pool.try_reserve(2).unwrap();
        pool.release(5);
        assert_eq!(pool.reserved_quantity, 0);
        pool.try_reserve(3).unwrap();
    }

    #[test]
    #[should_panic(expected = "InvalidAmount")]
    fn zero_capacity_pool_is_rejected() {
        AllocationPool::new(0).unwrap();
    }
}
