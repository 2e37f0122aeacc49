//! Participant balances.
//!
//! A [`ParticipantBalance`] is derived state: one row per (bill, user)
//! holding what that participant owes, what they have paid, and what
//! remains. Rows are only ever written by the balance fold in
//! `ops::balances` as a replace-current-snapshot upsert; nothing increments
//! them in place.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, money::TOLERANCE_MINOR};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Paid => "paid",
        }
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "partial" => Ok(Self::Partial),
            "paid" => Ok(Self::Paid),
            other => Err(EngineError::InvalidStatus(format!(
                "invalid payment status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantBalance {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub user_id: String,
    pub total_owed: Money,
    pub amount_paid: Money,
    pub balance_remaining: Money,
    pub payment_status: PaymentStatus,
}

impl ParticipantBalance {
    /// Derives a balance row from its two source sums.
    ///
    /// `balance_remaining = max(0, total_owed - amount_paid)`; the status
    /// rules are applied in order: settled within tolerance wins, then any
    /// payment at all marks the row partial.
    pub fn derive(
        bill_id: Uuid,
        user_id: String,
        total_owed: Money,
        amount_paid: Money,
    ) -> Self {
        let balance_remaining = total_owed.saturating_remainder(amount_paid);
        let payment_status = if balance_remaining.minor() <= TOLERANCE_MINOR {
            PaymentStatus::Paid
        } else if amount_paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        };
        Self {
            id: Uuid::new_v4(),
            bill_id,
            user_id,
            total_owed,
            amount_paid,
            balance_remaining,
            payment_status,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "participant_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub bill_id: String,
    pub user_id: String,
    pub total_owed_minor: i64,
    pub amount_paid_minor: i64,
    pub balance_remaining_minor: i64,
    pub payment_status: String,
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

impl From<&ParticipantBalance> for ActiveModel {
    fn from(balance: &ParticipantBalance) -> Self {
        Self {
            id: ActiveValue::Set(balance.id.to_string()),
            bill_id: ActiveValue::Set(balance.bill_id.to_string()),
            user_id: ActiveValue::Set(balance.user_id.clone()),
            total_owed_minor: ActiveValue::Set(balance.total_owed.minor()),
            amount_paid_minor: ActiveValue::Set(balance.amount_paid.minor()),
            balance_remaining_minor: ActiveValue::Set(balance.balance_remaining.minor()),
            payment_status: ActiveValue::Set(balance.payment_status.as_str().to_string()),
        }
    }
}

impl TryFrom<Model> for ParticipantBalance {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("balance not exists".to_string()))?,
            bill_id: Uuid::parse_str(&model.bill_id)
                .map_err(|_| EngineError::KeyNotFound("bill not exists".to_string()))?,
            user_id: model.user_id,
            total_owed: Money::new(model.total_owed_minor),
            amount_paid: Money::new(model.amount_paid_minor),
            balance_remaining: Money::new(model.balance_remaining_minor),
            payment_status: PaymentStatus::try_from(model.payment_status.as_str())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(owed: i64, paid: i64) -> ParticipantBalance {
        ParticipantBalance::derive(
            Uuid::new_v4(),
            "bob".to_string(),
            Money::new(owed),
            Money::new(paid),
        )
    }

    #[test]
    fn unpaid_balance_is_pending() {
        let balance = derive(20_50, 0);
        assert_eq!(balance.balance_remaining, Money::new(20_50));
        assert_eq!(balance.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn partial_payment_keeps_remainder() {
        let balance = derive(20_50, 5_00);
        assert_eq!(balance.balance_remaining, Money::new(15_50));
        assert_eq!(balance.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn full_payment_is_paid_with_zero_remaining() {
        let balance = derive(20_50, 20_50);
        assert_eq!(balance.balance_remaining, Money::ZERO);
        assert_eq!(balance.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn overpayment_never_goes_negative() {
        let balance = derive(20_50, 30_00);
        assert_eq!(balance.balance_remaining, Money::ZERO);
        assert_eq!(balance.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn remainder_within_tolerance_counts_as_paid() {
        let balance = derive(20_50, 20_49);
        assert_eq!(balance.payment_status, PaymentStatus::Paid);
    }
}
