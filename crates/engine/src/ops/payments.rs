use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ParticipantBalance, Payment, PaymentState, RecordPaymentCmd, ResultEngine,
    payments,
};

use super::{Engine, with_tx};

/// Filters for listing payments.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct PaymentListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, acts as an allow-list of states to return.
    pub states: Option<Vec<PaymentState>>,
}

fn validate_list_filter(filter: &PaymentListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidAmount(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.states.as_ref().is_some_and(|s| s.is_empty()) {
        return Err(EngineError::InvalidAmount(
            "states must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PaymentsCursor {
    created_at: DateTime<Utc>,
    payment_id: String,
}

impl PaymentsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidId("invalid payments cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidId("invalid payments cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidId("invalid payments cursor".to_string()))
    }
}

impl Engine {
    /// Records a payment from a participant toward the bill's payer.
    ///
    /// The payment starts `pending`; it only counts toward the sender's
    /// balance once completed. Re-sending the same `idempotency_key` for
    /// the same (bill, sender) returns the already-recorded payment.
    pub async fn record_payment(&self, cmd: RecordPaymentCmd) -> ResultEngine<Payment> {
        let payment = Payment::new(
            cmd.bill_id,
            cmd.from_user_id.clone(),
            cmd.amount,
            cmd.method,
            cmd.created_at,
            cmd.idempotency_key.clone(),
        )?;

        with_tx!(self, |db_tx| {
            self.require_bill_active(&db_tx, cmd.bill_id).await?;
            self.require_active_participant(&db_tx, cmd.bill_id, &cmd.from_user_id)
                .await?;

            if let Some(key) = cmd.idempotency_key.as_deref() {
                let existing = payments::Entity::find()
                    .filter(payments::Column::BillId.eq(cmd.bill_id.to_string()))
                    .filter(payments::Column::FromUserId.eq(cmd.from_user_id.clone()))
                    .filter(payments::Column::IdempotencyKey.eq(key.to_string()))
                    .one(&db_tx)
                    .await?;
                if let Some(existing) = existing {
                    return Payment::try_from(existing);
                }
            }

            payments::ActiveModel::from(&payment).insert(&db_tx).await?;
            tracing::info!(
                bill_id = %cmd.bill_id,
                payment_id = %payment.id,
                from = %cmd.from_user_id,
                amount = %cmd.amount,
                "payment recorded"
            );
            Ok(payment)
        })
    }

    /// Marks a pending payment completed and refolds the sender's balance.
    ///
    /// The single-row fold is the routine path after one payment; the full
    /// [`Engine::recompute_balances`] remains the authority and can heal
    /// any drift.
    pub async fn complete_payment(
        &self,
        bill_id: Uuid,
        payment_id: Uuid,
        user_id: &str,
        completed_at: DateTime<Utc>,
    ) -> ResultEngine<ParticipantBalance> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_payment(&db_tx, bill_id, payment_id, user_id)
                .await?;
            PaymentState::try_from(model.state.as_str())?
                .ensure_can_become(PaymentState::Completed)?;

            let active = payments::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                state: ActiveValue::Set(PaymentState::Completed.as_str().to_string()),
                completed_at: ActiveValue::Set(Some(completed_at)),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            let balance = self
                .fold_participant_balance(&db_tx, bill_id, &model.from_user_id)
                .await?;
            tracing::info!(
                %bill_id,
                %payment_id,
                from = %model.from_user_id,
                "payment completed"
            );
            Ok(balance)
        })
    }

    /// Marks a pending payment failed. Terminal; the payment never counts.
    pub async fn fail_payment(
        &self,
        bill_id: Uuid,
        payment_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        self.finish_payment(bill_id, payment_id, user_id, PaymentState::Failed)
            .await
    }

    /// Cancels a pending payment. Terminal, like failing.
    pub async fn cancel_payment(
        &self,
        bill_id: Uuid,
        payment_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        self.finish_payment(bill_id, payment_id, user_id, PaymentState::Cancelled)
            .await
    }

    async fn finish_payment(
        &self,
        bill_id: Uuid,
        payment_id: Uuid,
        user_id: &str,
        next: PaymentState,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_payment(&db_tx, bill_id, payment_id, user_id)
                .await?;
            PaymentState::try_from(model.state.as_str())?.ensure_can_become(next)?;

            let active = payments::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                state: ActiveValue::Set(next.as_str().to_string()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            tracing::info!(%bill_id, %payment_id, state = next.as_str(), "payment closed");
            Ok(())
        })
    }

    /// Lists a bill's payments, newest first.
    pub async fn list_payments(
        &self,
        bill_id: Uuid,
        user_id: &str,
        limit: u64,
        filter: &PaymentListFilter,
    ) -> ResultEngine<Vec<Payment>> {
        let (items, _next) = self
            .list_payments_page(bill_id, user_id, limit, None, filter)
            .await?;
        Ok(items)
    }

    /// Lists a bill's payments with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(created_at DESC, id DESC)`; the
    /// returned cursor, when present, fetches the next page.
    pub async fn list_payments_page(
        &self,
        bill_id: Uuid,
        user_id: &str,
        limit: u64,
        cursor: Option<String>,
        filter: &PaymentListFilter,
    ) -> ResultEngine<(Vec<Payment>, Option<String>)> {
        validate_list_filter(filter)?;
        if limit == 0 {
            return Err(EngineError::InvalidAmount("limit must be > 0".to_string()));
        }
        let cursor = cursor.as_deref().map(PaymentsCursor::decode).transpose()?;

        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;

            let mut query = payments::Entity::find()
                .filter(payments::Column::BillId.eq(bill_id.to_string()))
                .order_by_desc(payments::Column::CreatedAt)
                .order_by_desc(payments::Column::Id)
                .limit(limit + 1);

            if let Some(from) = filter.from {
                query = query.filter(payments::Column::CreatedAt.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(payments::Column::CreatedAt.lt(to));
            }
            if let Some(states) = &filter.states {
                let states: Vec<String> =
                    states.iter().map(|s| s.as_str().to_string()).collect();
                query = query.filter(payments::Column::State.is_in(states));
            }
            if let Some(cursor) = &cursor {
                query = query.filter(
                    Condition::any()
                        .add(payments::Column::CreatedAt.lt(cursor.created_at))
                        .add(
                            Condition::all()
                                .add(payments::Column::CreatedAt.eq(cursor.created_at))
                                .add(payments::Column::Id.lt(cursor.payment_id.clone())),
                        ),
                );
            }

            let mut models = query.all(&db_tx).await?;
            let next = if models.len() as u64 > limit {
                models.truncate(limit as usize);
                models.last().map(|m| PaymentsCursor {
                    created_at: m.created_at,
                    payment_id: m.id.clone(),
                })
            } else {
                None
            };

            let mut out = Vec::with_capacity(models.len());
            for model in models {
                out.push(Payment::try_from(model)?);
            }
            let next = next.map(|c| c.encode()).transpose()?;
            Ok((out, next))
        })
    }

    /// Loads a payment scoped to its bill; visible to its sender and to the
    /// payer, hidden from everyone else.
    async fn require_payment(
        &self,
        db_tx: &sea_orm::DatabaseTransaction,
        bill_id: Uuid,
        payment_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<payments::Model> {
        let model = payments::Entity::find_by_id(payment_id.to_string())
            .filter(payments::Column::BillId.eq(bill_id.to_string()))
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("payment not exists".to_string()))?;

        if model.from_user_id != user_id
            && self.require_payer(db_tx, bill_id, user_id).await.is_err()
        {
            return Err(EngineError::KeyNotFound("payment not exists".to_string()));
        }
        Ok(model)
    }
}
