//! Line items.
//!
//! A [`LineItem`] is a priced, quantity-bounded entry on a bill. Its row
//! also carries the allocation pool counter (`reserved_quantity`): the sum
//! of live assignment quantities, maintained exclusively through the atomic
//! reserve/release operations in `ops::allocation`.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AllocationPool, EngineError, Money, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub name: String,
    pub unit_price: Money,
    pub total_quantity: i64,
    pub reserved_quantity: i64,
    /// Derived `unit_price × total_quantity`, stored for display and audit.
    pub amount: Money,
}

impl LineItem {
    pub fn new(
        bill_id: Uuid,
        name: String,
        unit_price: Money,
        total_quantity: i64,
    ) -> ResultEngine<Self> {
        if unit_price.is_negative() {
            return Err(EngineError::InvalidAmount(
                "unit_price must not be negative".to_string(),
            ));
        }
        if total_quantity <= 0 {
            return Err(EngineError::InvalidAmount(
                "total_quantity must be > 0".to_string(),
            ));
        }
        let amount = unit_price
            .checked_mul(total_quantity)
            .ok_or_else(|| EngineError::InvalidAmount("item amount overflow".to_string()))?;
        Ok(Self {
            id: Uuid::new_v4(),
            bill_id,
            name,
            unit_price,
            total_quantity,
            reserved_quantity: 0,
            amount,
        })
    }

    /// The item's allocation state as a value, for previews and audits.
    #[must_use]
    pub fn pool(&self) -> AllocationPool {
        AllocationPool {
            total_quantity: self.total_quantity,
            reserved_quantity: self.reserved_quantity,
        }
    }

    /// Units still claimable.
    #[must_use]
    pub fn available_quantity(&self) -> i64 {
        self.pool().available()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "line_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub bill_id: String,
    pub name: String,
    pub unit_price_minor: i64,
    pub total_quantity: i64,
    pub reserved_quantity: i64,
    pub amount_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bills::Entity",
        from = "Column::BillId",
        to = "super::bills::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Bills,
    #[sea_orm(has_many = "super::assignments::Entity")]
    Assignments,
}

impl Related<super::bills::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bills.def()
    }
}

impl Related<super::assignments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LineItem> for ActiveModel {
    fn from(item: &LineItem) -> Self {
        Self {
            id: ActiveValue::Set(item.id.to_string()),
            bill_id: ActiveValue::Set(item.bill_id.to_string()),
            name: ActiveValue::Set(item.name.clone()),
            unit_price_minor: ActiveValue::Set(item.unit_price.minor()),
            total_quantity: ActiveValue::Set(item.total_quantity),
            reserved_quantity: ActiveValue::Set(item.reserved_quantity),
            amount_minor: ActiveValue::Set(item.amount.minor()),
        }
    }
}

impl TryFrom<Model> for LineItem {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("line_item not exists".to_string()))?,
            bill_id: Uuid::parse_str(&model.bill_id)
                .map_err(|_| EngineError::KeyNotFound("bill not exists".to_string()))?,
            name: model.name,
            unit_price: Money::new(model.unit_price_minor),
            total_quantity: model.total_quantity,
            reserved_quantity: model.reserved_quantity,
            amount: Money::new(model.amount_minor),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_derives_amount() {
        let item = LineItem::new(
            Uuid::new_v4(),
            "Pizza".to_string(),
            Money::new(18_99),
            2,
        )
        .unwrap();
        assert_eq!(item.amount, Money::new(37_98));
        assert_eq!(item.available_quantity(), 2);
    }

    #[test]
    #[should_panic(expected = "InvalidAmount")]
    fn zero_quantity_item_is_rejected() {
        LineItem::new(Uuid::new_v4(), "Pizza".to_string(), Money::new(18_99), 0).unwrap();
    }
}
