//! Assignments.
//!
//! An [`Assignment`] is one participant's claim on a whole-number quantity
//! of one line item, with the amount that claim is worth. At most one
//! assignment exists per (item, participant) pair; repeated claims update
//! the existing row.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub item_id: Uuid,
    pub bill_id: Uuid,
    pub user_id: String,
    pub quantity: i64,
    pub assigned_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(
        item_id: Uuid,
        bill_id: Uuid,
        user_id: String,
        quantity: i64,
        assigned_amount: Money,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            bill_id,
            user_id,
            quantity,
            assigned_amount,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Splits `total_quantity` across `participants` claimants.
///
/// `base = total / n`; the first `total % n` positions (in the caller's
/// order) take one extra unit. The result always sums to exactly
/// `total_quantity` and per-position quantities differ by at most 1.
/// Positions whose quantity works out to zero stay in the vector; callers
/// skip them when materializing assignments.
pub(crate) fn split_quantities(total_quantity: i64, participants: usize) -> Vec<i64> {
    let n = participants as i64;
    if n == 0 {
        return Vec::new();
    }
    let base = total_quantity / n;
    let remainder = (total_quantity % n) as usize;
    (0..participants)
        .map(|position| base + i64::from(position < remainder))
        .collect()
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub item_id: String,
    pub bill_id: String,
    pub user_id: String,
    pub quantity: i64,
    pub assigned_amount_minor: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::line_items::Entity",
        from = "Column::ItemId",
        to = "super::line_items::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    LineItems,
}

impl Related<super::line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Assignment> for ActiveModel {
    fn from(assignment: &Assignment) -> Self {
        Self {
            id: ActiveValue::Set(assignment.id.to_string()),
            item_id: ActiveValue::Set(assignment.item_id.to_string()),
            bill_id: ActiveValue::Set(assignment.bill_id.to_string()),
            user_id: ActiveValue::Set(assignment.user_id.clone()),
            quantity: ActiveValue::Set(assignment.quantity),
            assigned_amount_minor: ActiveValue::Set(assignment.assigned_amount.minor()),
            created_at: ActiveValue::Set(assignment.created_at),
            updated_at: ActiveValue::Set(assignment.updated_at),
        }
    }
}

impl TryFrom<Model> for Assignment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("assignment not exists".to_string()))?,
            item_id: Uuid::parse_str(&model.item_id)
                .map_err(|_| EngineError::KeyNotFound("line_item not exists".to_string()))?,
            bill_id: Uuid::parse_str(&model.bill_id)
                .map_err(|_| EngineError::KeyNotFound("bill not exists".to_string()))?,
            user_id: model.user_id,
            quantity: model.quantity,
            assigned_amount: Money::new(model.assigned_amount_minor),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_distributes_remainder_to_first_positions() {
        assert_eq!(split_quantities(7, 3), vec![3, 2, 2]);
        assert_eq!(split_quantities(6, 3), vec![2, 2, 2]);
        assert_eq!(split_quantities(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_quantities(1, 1), vec![1]);
    }

    #[test]
    fn split_sums_to_total_with_spread_of_at_most_one() {
        for total in 1..=25 {
            for n in 1..=8usize {
                let parts = split_quantities(total, n);
                assert_eq!(parts.iter().sum::<i64>(), total);
                let max = parts.iter().max().copied().unwrap_or(0);
                let min = parts.iter().min().copied().unwrap_or(0);
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn split_with_no_participants_is_empty() {
        assert!(split_quantities(5, 0).is_empty());
    }
}
