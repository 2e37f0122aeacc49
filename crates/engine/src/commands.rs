//! Command structs for engine operations.
//!
//! These types group parameters for write operations (bill creation,
//! claiming, payments), keeping call sites readable and avoiding long
//! argument lists. Required fields go through `new`; optional ones through
//! builder methods.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Money, payments::PaymentMethod};

/// Create a bill from a scanned or hand-entered receipt.
#[derive(Clone, Debug)]
pub struct CreateBillCmd {
    pub name: String,
    pub payer_id: String,
    pub subtotal: Money,
    pub tax: Money,
    pub tip: Money,
    pub total: Money,
    /// Defaults to the payer; set when someone else enters the receipt.
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CreateBillCmd {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        payer_id: impl Into<String>,
        subtotal: Money,
        tax: Money,
        tip: Money,
        total: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            payer_id: payer_id.into(),
            subtotal,
            tax,
            tip,
            total,
            created_by: None,
            created_at,
        }
    }

    #[must_use]
    pub fn created_by(mut self, user_id: impl Into<String>) -> Self {
        self.created_by = Some(user_id.into());
        self
    }
}

/// Add a line item to an active bill.
#[derive(Clone, Debug)]
pub struct AddItemCmd {
    pub bill_id: Uuid,
    pub name: String,
    pub unit_price: Money,
    pub total_quantity: i64,
    pub user_id: String,
}

impl AddItemCmd {
    #[must_use]
    pub fn new(
        bill_id: Uuid,
        user_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        total_quantity: i64,
    ) -> Self {
        Self {
            bill_id,
            name: name.into(),
            unit_price,
            total_quantity,
            user_id: user_id.into(),
        }
    }
}

/// Claim a quantity of a line item for a participant.
#[derive(Clone, Debug)]
pub struct AssignCmd {
    pub bill_id: Uuid,
    pub item_id: Uuid,
    pub user_id: String,
    pub quantity: i64,
    /// The amount the caller believes the claim is worth; must reconcile
    /// with `quantity × unit_price` within tolerance.
    pub claimed_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

impl AssignCmd {
    #[must_use]
    pub fn new(
        bill_id: Uuid,
        item_id: Uuid,
        user_id: impl Into<String>,
        quantity: i64,
        claimed_amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            bill_id,
            item_id,
            user_id: user_id.into(),
            quantity,
            claimed_amount,
            occurred_at,
        }
    }
}

/// Record a payment from a participant toward the bill's payer.
#[derive(Clone, Debug)]
pub struct RecordPaymentCmd {
    pub bill_id: Uuid,
    pub from_user_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RecordPaymentCmd {
    #[must_use]
    pub fn new(
        bill_id: Uuid,
        from_user_id: impl Into<String>,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            bill_id,
            from_user_id: from_user_id.into(),
            amount,
            method: PaymentMethod::default(),
            idempotency_key: None,
            created_at,
        }
    }

    #[must_use]
    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}
