//! Bill participants.
//!
//! One row per (bill, user). Identity itself is external; the engine only
//! records membership and the join order used as the default remainder
//! order for equal splits.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bill_participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub bill_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub active: bool,
    pub joined_at: DateTimeUtc,
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
}

impl Related<super::bills::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bills.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
