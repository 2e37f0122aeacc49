use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AuditIssue, ConsistencyReport, EngineError, Money, ResultEngine, assignments, line_items,
    money::validate_totals,
    util::parse_uuid,
};

use super::{Engine, with_tx};

impl Engine {
    /// Read-only diagnostic pass over one bill.
    ///
    /// Re-derives every invariant from the stored rows and accumulates all
    /// findings into a [`ConsistencyReport`]; nothing is mutated and the
    /// pass never stops at the first problem. Write operations are gated
    /// synchronously elsewhere; this exists for after-the-fact verification
    /// and as a test oracle.
    pub async fn audit_consistency(
        &self,
        bill_id: Uuid,
        user_id: &str,
        audited_at: DateTime<Utc>,
    ) -> ResultEngine<ConsistencyReport> {
        with_tx!(self, |db_tx| {
            let bill = self.require_bill_by_id(&db_tx, bill_id, user_id).await?;
            let mut issues = Vec::new();

            match validate_totals(
                Money::new(bill.subtotal_minor),
                Money::new(bill.tax_minor),
                Money::new(bill.tip_minor),
                Money::new(bill.total_minor),
            ) {
                Ok(()) => {}
                Err(EngineError::TotalMismatch { expected, actual }) => {
                    issues.push(AuditIssue::TotalMismatch { expected, actual });
                }
                Err(err) => return Err(err),
            }

            let items = line_items::Entity::find()
                .filter(line_items::Column::BillId.eq(bill_id.to_string()))
                .all(&db_tx)
                .await?;
            let assignment_models = assignments::Entity::find()
                .filter(assignments::Column::BillId.eq(bill_id.to_string()))
                .all(&db_tx)
                .await?;

            let mut assigned_per_item: HashMap<String, i64> = HashMap::new();
            for model in &assignment_models {
                *assigned_per_item.entry(model.item_id.clone()).or_insert(0) += model.quantity;
            }

            let mut unit_prices: HashMap<String, Money> = HashMap::new();
            for item in &items {
                unit_prices.insert(item.id.clone(), Money::new(item.unit_price_minor));
                let item_id = parse_uuid(&item.id, "line_item")?;
                let assigned = assigned_per_item.get(&item.id).copied().unwrap_or(0);

                // Over-assignment should be unreachable while writes go
                // through the pool, but the audit never assumes that.
                if assigned > item.total_quantity {
                    issues.push(AuditIssue::OverAssigned {
                        item_id,
                        assigned,
                        total_quantity: item.total_quantity,
                    });
                } else if assigned > 0 && assigned < item.total_quantity {
                    issues.push(AuditIssue::PartiallyAssigned {
                        item_id,
                        assigned,
                        total_quantity: item.total_quantity,
                    });
                }

                if item.reserved_quantity != assigned {
                    issues.push(AuditIssue::PoolDrift {
                        item_id,
                        reserved_quantity: item.reserved_quantity,
                        assigned,
                    });
                }
            }

            for model in &assignment_models {
                let Some(unit_price) = unit_prices.get(&model.item_id).copied() else {
                    // Orphaned rows cannot happen under the cascade FK;
                    // without a price there is nothing to recompute anyway.
                    continue;
                };
                let assignment_id = parse_uuid(&model.id, "assignment")?;
                let stored = Money::new(model.assigned_amount_minor);
                let expected = unit_price.checked_mul(model.quantity).ok_or_else(|| {
                    EngineError::InvalidAmount("assignment amount overflow".to_string())
                })?;
                if !expected.approximately_equal(stored) {
                    issues.push(AuditIssue::AmountMismatch {
                        assignment_id,
                        expected,
                        stored,
                    });
                }
            }

            Ok(ConsistencyReport {
                bill_id,
                issues,
                audited_at,
            })
        })
    }
}
