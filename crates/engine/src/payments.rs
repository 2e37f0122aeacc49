//! Payments.
//!
//! A [`Payment`] is a recorded transfer from a participant toward the
//! bill's payer. State transitions are one-directional: a payment starts
//! `pending` and ends in exactly one of `completed`, `failed` or
//! `cancelled`; terminal states never change again. Only `completed`
//! payments count toward a participant's balance.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    Mobile,
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Mobile => "mobile",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "bank_transfer" => Ok(Self::BankTransfer),
            "mobile" => Ok(Self::Mobile),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidStatus(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Checks a one-directional transition; there is no resurrecting a
    /// failed or cancelled payment.
    pub fn ensure_can_become(self, next: PaymentState) -> ResultEngine<()> {
        if self == Self::Pending && next != Self::Pending {
            return Ok(());
        }
        Err(EngineError::InvalidStatus(format!(
            "payment cannot move from {} to {}",
            self.as_str(),
            next.as_str()
        )))
    }
}

impl TryFrom<&str> for PaymentState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidStatus(format!(
                "invalid payment state: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub from_user_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub state: PaymentState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
}

impl Payment {
    pub fn new(
        bill_id: Uuid,
        from_user_id: String,
        amount: Money,
        method: PaymentMethod,
        created_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "payment amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            bill_id,
            from_user_id,
            amount,
            method,
            state: PaymentState::Pending,
            created_at,
            completed_at: None,
            idempotency_key,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub bill_id: String,
    pub from_user_id: String,
    pub amount_minor: i64,
    pub method: String,
    pub state: String,
    pub created_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub idempotency_key: Option<String>,
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

impl From<&Payment> for ActiveModel {
    fn from(payment: &Payment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id.to_string()),
            bill_id: ActiveValue::Set(payment.bill_id.to_string()),
            from_user_id: ActiveValue::Set(payment.from_user_id.clone()),
            amount_minor: ActiveValue::Set(payment.amount.minor()),
            method: ActiveValue::Set(payment.method.as_str().to_string()),
            state: ActiveValue::Set(payment.state.as_str().to_string()),
            created_at: ActiveValue::Set(payment.created_at),
            completed_at: ActiveValue::Set(payment.completed_at),
            idempotency_key: ActiveValue::Set(payment.idempotency_key.clone()),
        }
    }
}

impl TryFrom<Model> for Payment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("payment not exists".to_string()))?,
            bill_id: Uuid::parse_str(&model.bill_id)
                .map_err(|_| EngineError::KeyNotFound("bill not exists".to_string()))?,
            from_user_id: model.from_user_id,
            amount: Money::new(model.amount_minor),
            method: PaymentMethod::try_from(model.method.as_str())?,
            state: PaymentState::try_from(model.state.as_str())?,
            created_at: model.created_at,
            completed_at: model.completed_at,
            idempotency_key: model.idempotency_key,
        })
    }
}
