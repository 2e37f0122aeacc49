use std::collections::HashMap;

use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Money, ParticipantBalance, PaymentState, ResultEngine, assignments, balances,
    payments,
};

use super::{Engine, with_tx};

fn accumulate(
    sums: &mut HashMap<String, Money>,
    user_id: &str,
    amount: Money,
) -> ResultEngine<()> {
    let entry = sums.entry(user_id.to_string()).or_insert(Money::ZERO);
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
    Ok(())
}

impl Engine {
    /// Recomputes every participant balance of a bill from scratch.
    ///
    /// A pure fold over the current assignments and completed payments:
    /// sums per participant, derives remaining/status, and overwrites one
    /// row per (bill, user). Never incremental, so running it twice with no
    /// intervening change produces identical rows, and it can be re-run at
    /// any time to heal drift.
    pub async fn recompute_balances(
        &self,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<ParticipantBalance>> {
        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let rows = self.fold_bill_balances(&db_tx, bill_id).await?;
            tracing::debug!(%bill_id, rows = rows.len(), "balances recomputed");
            Ok(rows)
        })
    }

    /// Current balance rows for a bill, one per participant.
    pub async fn list_balances(
        &self,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<ParticipantBalance>> {
        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let models = balances::Entity::find()
                .filter(balances::Column::BillId.eq(bill_id.to_string()))
                .all(&db_tx)
                .await?;
            let mut rows = Vec::with_capacity(models.len());
            for model in models {
                rows.push(ParticipantBalance::try_from(model)?);
            }
            rows.sort_by(|a, b| a.user_id.cmp(&b.user_id));
            Ok(rows)
        })
    }

    /// One participant's current balance row.
    pub async fn participant_balance(
        &self,
        bill_id: Uuid,
        participant_id: &str,
        user_id: &str,
    ) -> ResultEngine<ParticipantBalance> {
        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let model = balances::Entity::find()
                .filter(balances::Column::BillId.eq(bill_id.to_string()))
                .filter(balances::Column::UserId.eq(participant_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("balance not exists".to_string()))?;
            ParticipantBalance::try_from(model)
        })
    }

    /// The full fold: one derived row per active participant, stale rows of
    /// departed participants removed.
    pub(super) async fn fold_bill_balances(
        &self,
        db_tx: &DatabaseTransaction,
        bill_id: Uuid,
    ) -> ResultEngine<Vec<ParticipantBalance>> {
        let members = self.active_participants(db_tx, bill_id).await?;

        let assignment_models = assignments::Entity::find()
            .filter(assignments::Column::BillId.eq(bill_id.to_string()))
            .all(db_tx)
            .await?;
        let mut owed: HashMap<String, Money> = HashMap::new();
        for model in assignment_models {
            accumulate(&mut owed, &model.user_id, Money::new(model.assigned_amount_minor))?;
        }

        let payment_models = payments::Entity::find()
            .filter(payments::Column::BillId.eq(bill_id.to_string()))
            .filter(payments::Column::State.eq(PaymentState::Completed.as_str()))
            .all(db_tx)
            .await?;
        let mut paid: HashMap<String, Money> = HashMap::new();
        for model in payment_models {
            accumulate(&mut paid, &model.from_user_id, Money::new(model.amount_minor))?;
        }

        let mut rows = Vec::with_capacity(members.len());
        for member in &members {
            let row = ParticipantBalance::derive(
                bill_id,
                member.user_id.clone(),
                owed.get(&member.user_id).copied().unwrap_or(Money::ZERO),
                paid.get(&member.user_id).copied().unwrap_or(Money::ZERO),
            );
            rows.push(self.upsert_balance_row(db_tx, row).await?);
        }

        // Replace-current-snapshot: rows for users no longer on the bill
        // would otherwise survive forever.
        let member_ids: Vec<String> = members.into_iter().map(|m| m.user_id).collect();
        balances::Entity::delete_many()
            .filter(balances::Column::BillId.eq(bill_id.to_string()))
            .filter(balances::Column::UserId.is_not_in(member_ids))
            .exec(db_tx)
            .await?;

        rows.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(rows)
    }

    /// The single-row fold used after a payment completes: same derivation
    /// as [`Engine::fold_bill_balances`], filtered to one participant.
    pub(super) async fn fold_participant_balance(
        &self,
        db_tx: &DatabaseTransaction,
        bill_id: Uuid,
        participant_id: &str,
    ) -> ResultEngine<ParticipantBalance> {
        let assignment_models = assignments::Entity::find()
            .filter(assignments::Column::BillId.eq(bill_id.to_string()))
            .filter(assignments::Column::UserId.eq(participant_id.to_string()))
            .all(db_tx)
            .await?;
        let mut owed = Money::ZERO;
        for model in assignment_models {
            owed = owed
                .checked_add(Money::new(model.assigned_amount_minor))
                .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
        }

        let payment_models = payments::Entity::find()
            .filter(payments::Column::BillId.eq(bill_id.to_string()))
            .filter(payments::Column::FromUserId.eq(participant_id.to_string()))
            .filter(payments::Column::State.eq(PaymentState::Completed.as_str()))
            .all(db_tx)
            .await?;
        let mut paid = Money::ZERO;
        for model in payment_models {
            paid = paid
                .checked_add(Money::new(model.amount_minor))
                .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
        }

        let row = ParticipantBalance::derive(bill_id, participant_id.to_string(), owed, paid);
        self.upsert_balance_row(db_tx, row).await
    }

    /// Upsert keyed on (bill, user): an existing row keeps its id and gets
    /// its value columns overwritten; nothing is ever appended.
    async fn upsert_balance_row(
        &self,
        db_tx: &DatabaseTransaction,
        row: ParticipantBalance,
    ) -> ResultEngine<ParticipantBalance> {
        let existing = balances::Entity::find()
            .filter(balances::Column::BillId.eq(row.bill_id.to_string()))
            .filter(balances::Column::UserId.eq(row.user_id.clone()))
            .one(db_tx)
            .await?;

        match existing {
            Some(model) => {
                let keep_id = crate::util::parse_uuid(&model.id, "balance")?;
                let active = balances::ActiveModel {
                    id: ActiveValue::Set(model.id),
                    total_owed_minor: ActiveValue::Set(row.total_owed.minor()),
                    amount_paid_minor: ActiveValue::Set(row.amount_paid.minor()),
                    balance_remaining_minor: ActiveValue::Set(row.balance_remaining.minor()),
                    payment_status: ActiveValue::Set(row.payment_status.as_str().to_string()),
                    ..Default::default()
                };
                active.update(db_tx).await?;
                Ok(ParticipantBalance { id: keep_id, ..row })
            }
            None => {
                balances::ActiveModel::from(&row).insert(db_tx).await?;
                Ok(row)
            }
        }
    }
}
