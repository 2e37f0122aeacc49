use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{AddItemCmd, LineItem, ResultEngine, assignments, line_items};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Adds a priced, quantity-bounded line item to an active bill.
    pub async fn add_line_item(&self, cmd: AddItemCmd) -> ResultEngine<LineItem> {
        let name = normalize_required_name(&cmd.name, "item")?;
        with_tx!(self, |db_tx| {
            self.require_bill_writable(&db_tx, cmd.bill_id, &cmd.user_id)
                .await?;

            let item = LineItem::new(cmd.bill_id, name, cmd.unit_price, cmd.total_quantity)?;
            line_items::ActiveModel::from(&item).insert(&db_tx).await?;
            tracing::debug!(
                bill_id = %cmd.bill_id,
                item_id = %item.id,
                quantity = item.total_quantity,
                "line item added"
            );
            Ok(item)
        })
    }

    /// Return a [`LineItem`].
    pub async fn line_item(
        &self,
        bill_id: Uuid,
        item_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<LineItem> {
        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let model = self.require_item_in_bill(&db_tx, bill_id, item_id).await?;
            LineItem::try_from(model)
        })
    }

    /// A bill's items in insertion-stable name order.
    pub async fn list_line_items(
        &self,
        bill_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<LineItem>> {
        with_tx!(self, |db_tx| {
            self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let models = line_items::Entity::find()
                .filter(line_items::Column::BillId.eq(bill_id.to_string()))
                .order_by_asc(line_items::Column::Name)
                .order_by_asc(line_items::Column::Id)
                .all(&db_tx)
                .await?;
            let mut items = Vec::with_capacity(models.len());
            for model in models {
                items.push(LineItem::try_from(model)?);
            }
            Ok(items)
        })
    }

    /// Removes a line item. Its assignments are deleted with it and the
    /// affected balances refolded, all in one transaction.
    pub async fn remove_line_item(
        &self,
        bill_id: Uuid,
        item_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_bill_writable(&db_tx, bill_id, user_id).await?;
            self.require_item_in_bill(&db_tx, bill_id, item_id).await?;

            let removed = assignments::Entity::delete_many()
                .filter(assignments::Column::ItemId.eq(item_id.to_string()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            line_items::Entity::delete_by_id(item_id.to_string())
                .exec(&db_tx)
                .await?;

            if removed > 0 {
                self.fold_bill_balances(&db_tx, bill_id).await?;
            }
            tracing::debug!(%bill_id, %item_id, cascaded = removed, "line item removed");
            Ok(())
        })
    }
}
