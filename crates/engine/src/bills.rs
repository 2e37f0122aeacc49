//! The `Bill` is one shared-expense record: a scanned or hand-entered
//! receipt with a single designated payer, priced line items, and the
//! participants splitting it.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, money::validate_totals};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    #[default]
    Active,
    Settled,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Settled => "settled",
            Self::Cancelled => "cancelled",
        }
    }

    /// `settled` and `cancelled` are terminal; the bill is immutable there.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled)
    }
}

impl TryFrom<&str> for BillStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "settled" => Ok(Self::Settled),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidStatus(format!(
                "invalid bill status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub name: String,
    pub payer_id: String,
    pub subtotal: Money,
    pub tax: Money,
    pub tip: Money,
    pub total: Money,
    pub status: BillStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Builds a new active bill after checking that the stated totals
    /// reconcile (`subtotal + tax + tip == total` within tolerance).
    pub fn new(
        name: String,
        payer_id: String,
        subtotal: Money,
        tax: Money,
        tip: Money,
        total: Money,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if subtotal.is_negative() || tax.is_negative() || tip.is_negative() {
            return Err(EngineError::InvalidAmount(
                "bill components must not be negative".to_string(),
            ));
        }
        validate_totals(subtotal, tax, tip, total)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            payer_id,
            subtotal,
            tax,
            tip,
            total,
            status: BillStatus::Active,
            created_by,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub payer_id: String,
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub tip_minor: i64,
    pub total_minor: i64,
    pub status: String,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::line_items::Entity")]
    LineItems,
    #[sea_orm(has_many = "super::participants::Entity")]
    Participants,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
}

impl Related<super::line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
    }
}

impl Related<super::participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Bill> for ActiveModel {
    fn from(bill: &Bill) -> Self {
        Self {
            id: ActiveValue::Set(bill.id.to_string()),
            name: ActiveValue::Set(bill.name.clone()),
            payer_id: ActiveValue::Set(bill.payer_id.clone()),
            subtotal_minor: ActiveValue::Set(bill.subtotal.minor()),
            tax_minor: ActiveValue::Set(bill.tax.minor()),
            tip_minor: ActiveValue::Set(bill.tip.minor()),
            total_minor: ActiveValue::Set(bill.total.minor()),
            status: ActiveValue::Set(bill.status.as_str().to_string()),
            created_by: ActiveValue::Set(bill.created_by.clone()),
            created_at: ActiveValue::Set(bill.created_at),
        }
    }
}

impl TryFrom<Model> for Bill {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("bill not exists".to_string()))?,
            name: model.name,
            payer_id: model.payer_id,
            subtotal: Money::new(model.subtotal_minor),
            tax: Money::new(model.tax_minor),
            tip: Money::new(model.tip_minor),
            total: Money::new(model.total_minor),
            status: BillStatus::try_from(model.status.as_str())?,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
