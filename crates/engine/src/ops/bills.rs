use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Bill, BillStatus, CreateBillCmd, EngineError, Money, PaymentStatus, ResultEngine, assignments,
    bills, money::validate_totals, participants,
};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Creates a bill from a receipt after validating that its stated
    /// totals reconcile. The payer (and the creator, when different) are
    /// registered as the first participants.
    pub async fn create_bill(&self, cmd: CreateBillCmd) -> ResultEngine<Bill> {
        let name = normalize_required_name(&cmd.name, "bill")?;
        let created_by = cmd.created_by.clone().unwrap_or_else(|| cmd.payer_id.clone());
        let bill = Bill::new(
            name,
            cmd.payer_id.clone(),
            cmd.subtotal,
            cmd.tax,
            cmd.tip,
            cmd.total,
            created_by.clone(),
            cmd.created_at,
        )?;

        with_tx!(self, |db_tx| {
            bills::ActiveModel::from(&bill).insert(&db_tx).await?;

            let payer_row = participants::ActiveModel {
                bill_id: ActiveValue::Set(bill.id.to_string()),
                user_id: ActiveValue::Set(bill.payer_id.clone()),
                active: ActiveValue::Set(true),
                joined_at: ActiveValue::Set(bill.created_at),
            };
            payer_row.insert(&db_tx).await?;

            if created_by != bill.payer_id {
                let creator_row = participants::ActiveModel {
                    bill_id: ActiveValue::Set(bill.id.to_string()),
                    user_id: ActiveValue::Set(created_by.clone()),
                    active: ActiveValue::Set(true),
                    joined_at: ActiveValue::Set(bill.created_at),
                };
                creator_row.insert(&db_tx).await?;
            }

            tracing::info!(bill_id = %bill.id, payer = %bill.payer_id, "bill created");
            Ok(bill)
        })
    }

    /// Return a [`Bill`].
    pub async fn bill(&self, bill_id: Uuid, user_id: &str) -> ResultEngine<Bill> {
        with_tx!(self, |db_tx| {
            let model = self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            Bill::try_from(model)
        })
    }

    /// Re-states the bill's totals; the same reconciliation rule as at
    /// creation applies.
    pub async fn update_bill_totals(
        &self,
        bill_id: Uuid,
        user_id: &str,
        subtotal: Money,
        tax: Money,
        tip: Money,
        total: Money,
    ) -> ResultEngine<Bill> {
        if subtotal.is_negative() || tax.is_negative() || tip.is_negative() {
            return Err(EngineError::InvalidAmount(
                "bill components must not be negative".to_string(),
            ));
        }
        validate_totals(subtotal, tax, tip, total)?;

        with_tx!(self, |db_tx| {
            self.require_bill_writable(&db_tx, bill_id, user_id).await?;
            let active = bills::ActiveModel {
                id: ActiveValue::Set(bill_id.to_string()),
                subtotal_minor: ActiveValue::Set(subtotal.minor()),
                tax_minor: ActiveValue::Set(tax.minor()),
                tip_minor: ActiveValue::Set(tip.minor()),
                total_minor: ActiveValue::Set(total.minor()),
                ..Default::default()
            };
            let model = active.update(&db_tx).await?;
            Bill::try_from(model)
        })
    }

    /// Marks the bill settled (payer-only). Balances are refolded first
    /// and every participant must have paid up; the bill is immutable
    /// afterwards.
    pub async fn settle_bill(&self, bill_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_payer(&db_tx, bill_id, user_id).await?;
            let status = BillStatus::try_from(model.status.as_str())?;
            if status.is_terminal() {
                return Err(EngineError::InvalidStatus(format!(
                    "bill is already {}",
                    status.as_str()
                )));
            }

            let rows = self.fold_bill_balances(&db_tx, bill_id).await?;
            if let Some(open) = rows
                .iter()
                .find(|row| row.payment_status != PaymentStatus::Paid)
            {
                return Err(EngineError::InvalidStatus(format!(
                    "participant {} still owes {}",
                    open.user_id, open.balance_remaining
                )));
            }

            let active = bills::ActiveModel {
                id: ActiveValue::Set(bill_id.to_string()),
                status: ActiveValue::Set(BillStatus::Settled.as_str().to_string()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            tracing::info!(%bill_id, "bill settled");
            Ok(())
        })
    }

    /// Cancels an active bill (payer-only); terminal like settling.
    pub async fn cancel_bill(&self, bill_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_payer(&db_tx, bill_id, user_id).await?;
            let status = BillStatus::try_from(model.status.as_str())?;
            if status.is_terminal() {
                return Err(EngineError::InvalidStatus(format!(
                    "bill is already {}",
                    status.as_str()
                )));
            }

            let active = bills::ActiveModel {
                id: ActiveValue::Set(bill_id.to_string()),
                status: ActiveValue::Set(BillStatus::Cancelled.as_str().to_string()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            tracing::info!(%bill_id, "bill cancelled");
            Ok(())
        })
    }

    /// Adds a participant, or reactivates one who left (payer-only).
    pub async fn add_participant(
        &self,
        bill_id: Uuid,
        member_id: &str,
        user_id: &str,
        joined_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let member_id = member_id.to_string();
        with_tx!(self, |db_tx| {
            let model = self.require_payer(&db_tx, bill_id, user_id).await?;
            if BillStatus::try_from(model.status.as_str())?.is_terminal() {
                return Err(EngineError::InvalidStatus(format!(
                    "bill is {}, not active",
                    model.status
                )));
            }

            let active = participants::ActiveModel {
                bill_id: ActiveValue::Set(bill_id.to_string()),
                user_id: ActiveValue::Set(member_id.clone()),
                active: ActiveValue::Set(true),
                joined_at: ActiveValue::Set(joined_at),
            };

            // Upsert: insert if missing, otherwise reactivate keeping the
            // original join order.
            match participants::Entity::find_by_id((bill_id.to_string(), member_id.clone()))
                .one(&db_tx)
                .await?
            {
                Some(existing) => {
                    let reactivate = participants::ActiveModel {
                        bill_id: ActiveValue::Set(existing.bill_id),
                        user_id: ActiveValue::Set(existing.user_id),
                        active: ActiveValue::Set(true),
                        ..Default::default()
                    };
                    reactivate.update(&db_tx).await?;
                }
                None => {
                    active.insert(&db_tx).await?;
                }
            }

            Ok(())
        })
    }

    /// Deactivates a participant (payer-only). Refused while they still
    /// hold assignments; the payer themselves cannot leave.
    pub async fn deactivate_participant(
        &self,
        bill_id: Uuid,
        member_id: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let member_id = member_id.to_string();
        with_tx!(self, |db_tx| {
            let model = self.require_payer(&db_tx, bill_id, user_id).await?;
            if member_id == model.payer_id {
                return Err(EngineError::InvalidStatus(
                    "cannot deactivate the payer".to_string(),
                ));
            }

            let claims = assignments::Entity::find()
                .filter(assignments::Column::BillId.eq(bill_id.to_string()))
                .filter(assignments::Column::UserId.eq(member_id.clone()))
                .count(&db_tx)
                .await?;
            if claims > 0 {
                return Err(EngineError::InvalidStatus(
                    "participant still has assignments".to_string(),
                ));
            }

            let existing = participants::Entity::find_by_id((bill_id.to_string(), member_id.clone()))
                .one(&db_tx)
                .await?
                .ok_or(EngineError::NotParticipant)?;
            let deactivate = participants::ActiveModel {
                bill_id: ActiveValue::Set(existing.bill_id),
                user_id: ActiveValue::Set(existing.user_id),
                active: ActiveValue::Set(false),
                ..Default::default()
            };
            deactivate.update(&db_tx).await?;

            self.fold_bill_balances(&db_tx, bill_id).await?;
            Ok(())
        })
    }

    /// Lists participants as `(user_id, active)` in join order.
    pub async fn list_participants(
        &self,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<(String, bool)>> {
        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let rows = participants::Entity::find()
                .filter(participants::Column::BillId.eq(bill_id.to_string()))
                .order_by_asc(participants::Column::JoinedAt)
                .order_by_asc(participants::Column::UserId)
                .all(&db_tx)
                .await?;
            Ok(rows.into_iter().map(|m| (m.user_id, m.active)).collect())
        })
    }
}
