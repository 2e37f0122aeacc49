use sea_orm::{ConnectionTrait, DatabaseTransaction, Statement, prelude::*};
use uuid::Uuid;

use crate::{AllocationPool, EngineError, ResultEngine, line_items};

use super::Engine;

impl Engine {
    /// Reserves `delta` more units of an item's allocation pool.
    ///
    /// The check and the increment are a single conditional UPDATE, so two
    /// concurrent claims can never both pass a stale check and double-book
    /// the last unit: the loser's statement matches zero rows and comes
    /// back as [`EngineError::QuantityExceeded`] with the quantity still
    /// available.
    pub(super) async fn try_reserve_quantity(
        &self,
        db: &DatabaseTransaction,
        item_id: Uuid,
        delta: i64,
    ) -> ResultEngine<()> {
        let backend = db.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "UPDATE line_items \
             SET reserved_quantity = reserved_quantity + ? \
             WHERE id = ? AND reserved_quantity + ? <= total_quantity",
            [delta.into(), item_id.to_string().into(), delta.into()],
        );
        let result = db.execute(stmt).await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Zero rows: either the item is gone or the pool is short. Re-read
        // to tell the two apart and report the exact shortfall.
        let item = line_items::Entity::find_by_id(item_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("line_item not exists".to_string()))?;
        let pool = AllocationPool {
            total_quantity: item.total_quantity,
            reserved_quantity: item.reserved_quantity,
        };
        Err(EngineError::QuantityExceeded {
            requested: delta,
            available: pool.available(),
        })
    }

    /// Releases `delta` units back to an item's pool, floored at zero.
    ///
    /// Used when an assignment is removed or reduced; always succeeds for
    /// an existing item.
    pub(super) async fn release_quantity(
        &self,
        db: &DatabaseTransaction,
        item_id: Uuid,
        delta: i64,
    ) -> ResultEngine<()> {
        let backend = db.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "UPDATE line_items \
             SET reserved_quantity = MAX(reserved_quantity - ?, 0) \
             WHERE id = ?",
            [delta.max(0).into(), item_id.to_string().into()],
        );
        let result = db.execute(stmt).await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::KeyNotFound("line_item not exists".to_string()));
        }
        Ok(())
    }
}
