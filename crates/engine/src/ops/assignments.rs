use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AssignCmd, Assignment, EngineError, Money, ResultEngine, assignments,
    assignments::split_quantities,
    util::{ensure_positive_quantity, parse_uuid},
};

use super::{Engine, with_tx};

impl Engine {
    /// Claims `quantity` units of a line item for a participant.
    ///
    /// The pool reservation is the first write of the transaction: the
    /// conditional UPDATE either books the units atomically or reports
    /// [`EngineError::QuantityExceeded`] with what is left. Every later
    /// validation failure rolls the transaction back, which releases the
    /// reservation with it. One assignment per (item, participant): a
    /// repeated claim is [`EngineError::AlreadyAssigned`] and must go
    /// through [`Engine::update_assignment`].
    pub async fn assign(&self, cmd: AssignCmd) -> ResultEngine<Assignment> {
        ensure_positive_quantity(cmd.quantity, "quantity")?;

        with_tx!(self, |db_tx| {
            self.try_reserve_quantity(&db_tx, cmd.item_id, cmd.quantity)
                .await?;

            let item = self
                .require_item_in_bill(&db_tx, cmd.bill_id, cmd.item_id)
                .await?;
            self.require_bill_active(&db_tx, cmd.bill_id).await?;
            self.require_active_participant(&db_tx, cmd.bill_id, &cmd.user_id)
                .await?;

            let existing = assignments::Entity::find()
                .filter(assignments::Column::ItemId.eq(cmd.item_id.to_string()))
                .filter(assignments::Column::UserId.eq(cmd.user_id.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::AlreadyAssigned);
            }

            let expected = Money::new(item.unit_price_minor)
                .checked_mul(cmd.quantity)
                .ok_or_else(|| {
                    EngineError::InvalidAmount("assignment amount overflow".to_string())
                })?;
            if !expected.approximately_equal(cmd.claimed_amount) {
                return Err(EngineError::AmountMismatch {
                    expected,
                    provided: cmd.claimed_amount,
                });
            }

            let assignment = Assignment::new(
                cmd.item_id,
                cmd.bill_id,
                cmd.user_id.clone(),
                cmd.quantity,
                expected,
                cmd.occurred_at,
            );
            assignments::ActiveModel::from(&assignment)
                .insert(&db_tx)
                .await?;

            self.fold_participant_balance(&db_tx, cmd.bill_id, &cmd.user_id)
                .await?;

            tracing::debug!(
                bill_id = %cmd.bill_id,
                item_id = %cmd.item_id,
                user = %cmd.user_id,
                quantity = cmd.quantity,
                "quantity assigned"
            );
            Ok(assignment)
        })
    }

    /// Changes the claimed quantity of an existing assignment.
    ///
    /// Growing the claim must win a pool reservation for the difference;
    /// shrinking always releases. The assigned amount is recomputed from
    /// the item's unit price.
    pub async fn update_assignment(
        &self,
        bill_id: Uuid,
        assignment_id: Uuid,
        new_quantity: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> ResultEngine<Assignment> {
        ensure_positive_quantity(new_quantity, "quantity")?;

        with_tx!(self, |db_tx| {
            let model = self
                .require_assignment(&db_tx, bill_id, assignment_id, user_id)
                .await?;
            self.require_bill_active(&db_tx, bill_id).await?;
            self.require_active_participant(&db_tx, bill_id, user_id)
                .await?;

            let item_id = parse_uuid(&model.item_id, "line_item")?;
            let delta = new_quantity - model.quantity;
            if delta > 0 {
                self.try_reserve_quantity(&db_tx, item_id, delta).await?;
            } else if delta < 0 {
                self.release_quantity(&db_tx, item_id, -delta).await?;
            }

            let item = self.require_item_in_bill(&db_tx, bill_id, item_id).await?;
            let new_amount = Money::new(item.unit_price_minor)
                .checked_mul(new_quantity)
                .ok_or_else(|| {
                    EngineError::InvalidAmount("assignment amount overflow".to_string())
                })?;

            let owner = model.user_id.clone();
            let active = assignments::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                quantity: ActiveValue::Set(new_quantity),
                assigned_amount_minor: ActiveValue::Set(new_amount.minor()),
                updated_at: ActiveValue::Set(at),
                ..Default::default()
            };
            let updated = active.update(&db_tx).await?;

            self.fold_participant_balance(&db_tx, bill_id, &owner).await?;

            tracing::debug!(
                %bill_id,
                %assignment_id,
                quantity = new_quantity,
                "assignment updated"
            );
            Assignment::try_from(updated)
        })
    }

    /// Removes an assignment and returns its quantity to the item's pool.
    pub async fn unassign(
        &self,
        bill_id: Uuid,
        assignment_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_assignment(&db_tx, bill_id, assignment_id, user_id)
                .await?;
            self.require_bill_active(&db_tx, bill_id).await?;
            self.require_active_participant(&db_tx, bill_id, user_id)
                .await?;

            let item_id = parse_uuid(&model.item_id, "line_item")?;
            let owner = model.user_id.clone();
            let quantity = model.quantity;

            assignments::Entity::delete_by_id(model.id.clone())
                .exec(&db_tx)
                .await?;
            self.release_quantity(&db_tx, item_id, quantity).await?;
            self.fold_participant_balance(&db_tx, bill_id, &owner).await?;

            tracing::debug!(%bill_id, %assignment_id, quantity, "assignment removed");
            Ok(())
        })
    }

    /// Splits an item equally across the given participants, replacing any
    /// existing assignments on it.
    ///
    /// `base = total / n`. The first `total mod n` participants in the
    /// caller-supplied order (typically ascending join order) receive one
    /// extra unit, so the assigned quantities always sum to exactly the
    /// item's total quantity. Participants whose share works out to zero
    /// get no assignment.
    pub async fn split_equally(
        &self,
        bill_id: Uuid,
        item_id: Uuid,
        participant_ids: &[String],
        user_id: &str,
        at: DateTime<Utc>,
    ) -> ResultEngine<Vec<Assignment>> {
        if participant_ids.is_empty() {
            return Err(EngineError::InvalidAmount(
                "participant_ids must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for id in participant_ids {
            if !seen.insert(id.as_str()) {
                return Err(EngineError::InvalidAmount(
                    "participant_ids must not repeat".to_string(),
                ));
            }
        }

        with_tx!(self, |db_tx| {
            self.require_bill_active(&db_tx, bill_id).await?;
            self.require_active_participant(&db_tx, bill_id, user_id)
                .await?;
            for member in participant_ids {
                self.require_active_participant(&db_tx, bill_id, member)
                    .await?;
            }

            let item = self.require_item_in_bill(&db_tx, bill_id, item_id).await?;

            // Clear previous claims on the item; the split re-distributes
            // the whole quantity.
            let previous = assignments::Entity::find()
                .filter(assignments::Column::ItemId.eq(item_id.to_string()))
                .all(&db_tx)
                .await?;
            let released: i64 = previous.iter().map(|m| m.quantity).sum();
            if !previous.is_empty() {
                assignments::Entity::delete_many()
                    .filter(assignments::Column::ItemId.eq(item_id.to_string()))
                    .exec(&db_tx)
                    .await?;
                self.release_quantity(&db_tx, item_id, released).await?;
            }

            let quantities = split_quantities(item.total_quantity, participant_ids.len());
            let unit_price = Money::new(item.unit_price_minor);
            let mut created = Vec::new();
            for (member, quantity) in participant_ids.iter().zip(quantities) {
                if quantity == 0 {
                    continue;
                }
                self.try_reserve_quantity(&db_tx, item_id, quantity).await?;
                let amount = unit_price.checked_mul(quantity).ok_or_else(|| {
                    EngineError::InvalidAmount("assignment amount overflow".to_string())
                })?;
                let assignment =
                    Assignment::new(item_id, bill_id, member.clone(), quantity, amount, at);
                assignments::ActiveModel::from(&assignment)
                    .insert(&db_tx)
                    .await?;
                created.push(assignment);
            }

            self.fold_bill_balances(&db_tx, bill_id).await?;

            tracing::debug!(
                %bill_id,
                %item_id,
                participants = participant_ids.len(),
                "item split equally"
            );
            Ok(created)
        })
    }

    /// A bill's live assignments, grouped by item then participant.
    pub async fn list_assignments(
        &self,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Assignment>> {
        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let models = assignments::Entity::find()
                .filter(assignments::Column::BillId.eq(bill_id.to_string()))
                .order_by_asc(assignments::Column::ItemId)
                .order_by_asc(assignments::Column::UserId)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                out.push(Assignment::try_from(model)?);
            }
            Ok(out)
        })
    }

    /// Loads an assignment scoped to its bill; visible to its owner and to
    /// the payer, hidden from everyone else.
    async fn require_assignment(
        &self,
        db_tx: &sea_orm::DatabaseTransaction,
        bill_id: Uuid,
        assignment_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<assignments::Model> {
        let model = assignments::Entity::find_by_id(assignment_id.to_string())
            .filter(assignments::Column::BillId.eq(bill_id.to_string()))
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("assignment not exists".to_string()))?;

        if model.user_id != user_id
            && self.require_payer(db_tx, bill_id, user_id).await.is_err()
        {
            return Err(EngineError::KeyNotFound("assignment not exists".to_string()));
        }
        Ok(model)
    }
}
