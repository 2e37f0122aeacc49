use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, bills, line_items, participants};

use super::Engine;

impl Engine {
    async fn find_bill_by_id(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
    ) -> ResultEngine<Option<bills::Model>> {
        bills::Entity::find_by_id(bill_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Membership check: does (bill, user) have a live participant row?
    ///
    /// The payer is inserted as the first participant at bill creation, so
    /// this single lookup covers everyone.
    pub(super) async fn is_active_participant(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bool> {
        let row = participants::Entity::find_by_id((bill_id.to_string(), user_id.to_string()))
            .one(db)
            .await?;
        Ok(row.is_some_and(|m| m.active))
    }

    pub(super) async fn require_active_participant(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        if !self.is_active_participant(db, bill_id, user_id).await? {
            return Err(EngineError::NotParticipant);
        }
        Ok(())
    }

    /// Read access: the bill exists and the user is (or was) on it.
    pub(super) async fn require_bill_by_id(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bills::Model> {
        let model = self
            .find_bill_by_id(db, bill_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("bill not exists".to_string()))?;
        if model.payer_id != user_id {
            let membership =
                participants::Entity::find_by_id((bill_id.to_string(), user_id.to_string()))
                    .one(db)
                    .await?;
            if membership.is_none() {
                return Err(EngineError::KeyNotFound("bill not exists".to_string()));
            }
        }
        Ok(model)
    }

    /// Write access: read access, an active membership, and a bill that is
    /// still `active` (settled/cancelled bills are immutable).
    pub(super) async fn require_bill_writable(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bills::Model> {
        let model = self.require_bill_by_id(db, bill_id, user_id).await?;
        self.require_active_participant(db, bill_id, user_id)
            .await?;
        if model.status != crate::BillStatus::Active.as_str() {
            return Err(EngineError::InvalidStatus(format!(
                "bill is {}, not active",
                model.status
            )));
        }
        Ok(model)
    }

    /// The bill exists and is still `active`, with no caller check.
    ///
    /// Used on paths that report membership failures as
    /// [`EngineError::NotParticipant`] instead of hiding the bill.
    pub(super) async fn require_bill_active(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
    ) -> ResultEngine<bills::Model> {
        let model = self
            .find_bill_by_id(db, bill_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("bill not exists".to_string()))?;
        if model.status != crate::BillStatus::Active.as_str() {
            return Err(EngineError::InvalidStatus(format!(
                "bill is {}, not active",
                model.status
            )));
        }
        Ok(model)
    }

    /// Payer-only operations (settle, cancel, totals edits on behalf of the
    /// table).
    pub(super) async fn require_payer(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bills::Model> {
        let model = self
            .find_bill_by_id(db, bill_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("bill not exists".to_string()))?;
        if model.payer_id != user_id {
            return Err(EngineError::KeyNotFound("bill not exists".to_string()));
        }
        Ok(model)
    }

    pub(super) async fn require_item_in_bill(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
        item_id: Uuid,
    ) -> ResultEngine<line_items::Model> {
        line_items::Entity::find_by_id(item_id.to_string())
            .filter(line_items::Column::BillId.eq(bill_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("line_item not exists".to_string()))
    }

    /// Active participants in join order; the default remainder order for
    /// equal splits.
    pub(super) async fn active_participants(
        &self,
        db: &DatabaseTransaction,
        bill_id: Uuid,
    ) -> ResultEngine<Vec<participants::Model>> {
        participants::Entity::find()
            .filter(participants::Column::BillId.eq(bill_id.to_string()))
            .filter(participants::Column::Active.eq(true))
            .order_by_asc(participants::Column::JoinedAt)
            .order_by_asc(participants::Column::UserId)
            .all(db)
            .await
            .map_err(Into::into)
    }
}
