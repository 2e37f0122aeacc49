//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for Conto:
//!
//! - `bills`: one shared-expense record per receipt, with a single payer
//! - `bill_participants`: who is splitting the bill, in join order
//! - `line_items`: priced, quantity-bounded entries, carrying the
//!   allocation pool counter
//! - `assignments`: per-participant claims on item quantities
//! - `participant_balances`: derived owed/paid/remaining rows
//! - `payments`: transfers from participants toward the payer

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Bills {
    Table,
    Id,
    Name,
    PayerId,
    SubtotalMinor,
    TaxMinor,
    TipMinor,
    TotalMinor,
    Status,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum BillParticipants {
    Table,
    BillId,
    UserId,
    Active,
    JoinedAt,
}

#[derive(Iden)]
enum LineItems {
    Table,
    Id,
    BillId,
    Name,
    UnitPriceMinor,
    TotalQuantity,
    ReservedQuantity,
    AmountMinor,
}

#[derive(Iden)]
enum Assignments {
    Table,
    Id,
    ItemId,
    BillId,
    UserId,
    Quantity,
    AssignedAmountMinor,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ParticipantBalances {
    Table,
    Id,
    BillId,
    UserId,
    TotalOwedMinor,
    AmountPaidMinor,
    BalanceRemainingMinor,
    PaymentStatus,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    BillId,
    FromUserId,
    AmountMinor,
    Method,
    State,
    CreatedAt,
    CompletedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Bills
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Bills::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bills::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Bills::Name).string().not_null())
                    .col(ColumnDef::new(Bills::PayerId).string().not_null())
                    .col(ColumnDef::new(Bills::SubtotalMinor).big_integer().not_null())
                    .col(ColumnDef::new(Bills::TaxMinor).big_integer().not_null())
                    .col(ColumnDef::new(Bills::TipMinor).big_integer().not_null())
                    .col(ColumnDef::new(Bills::TotalMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Bills::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Bills::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Bills::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bills-payer_id")
                    .table(Bills::Table)
                    .col(Bills::PayerId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Bill participants
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BillParticipants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BillParticipants::BillId).string().not_null())
                    .col(ColumnDef::new(BillParticipants::UserId).string().not_null())
                    .col(
                        ColumnDef::new(BillParticipants::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BillParticipants::JoinedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(BillParticipants::BillId)
                            .col(BillParticipants::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bill_participants-bill_id")
                            .from(BillParticipants::Table, BillParticipants::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bill_participants-user_id")
                    .table(BillParticipants::Table)
                    .col(BillParticipants::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Line items
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LineItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LineItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LineItems::BillId).string().not_null())
                    .col(ColumnDef::new(LineItems::Name).string().not_null())
                    .col(
                        ColumnDef::new(LineItems::UnitPriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LineItems::TotalQuantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LineItems::ReservedQuantity)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(LineItems::AmountMinor).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-line_items-bill_id")
                            .from(LineItems::Table, LineItems::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-line_items-bill_id")
                    .table(LineItems::Table)
                    .col(LineItems::BillId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Assignments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Assignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Assignments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Assignments::ItemId).string().not_null())
                    .col(ColumnDef::new(Assignments::BillId).string().not_null())
                    .col(ColumnDef::new(Assignments::UserId).string().not_null())
                    .col(ColumnDef::new(Assignments::Quantity).big_integer().not_null())
                    .col(
                        ColumnDef::new(Assignments::AssignedAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Assignments::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Assignments::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assignments-item_id")
                            .from(Assignments::Table, Assignments::ItemId)
                            .to(LineItems::Table, LineItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assignments-bill_id")
                            .from(Assignments::Table, Assignments::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One claim per (item, participant); repeated claims must update.
        manager
            .create_index(
                Index::create()
                    .name("idx-assignments-item_id-user_id-unique")
                    .table(Assignments::Table)
                    .col(Assignments::ItemId)
                    .col(Assignments::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-assignments-bill_id-user_id")
                    .table(Assignments::Table)
                    .col(Assignments::BillId)
                    .col(Assignments::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Participant balances
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ParticipantBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ParticipantBalances::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ParticipantBalances::BillId).string().not_null())
                    .col(ColumnDef::new(ParticipantBalances::UserId).string().not_null())
                    .col(
                        ColumnDef::new(ParticipantBalances::TotalOwedMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantBalances::AmountPaidMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantBalances::BalanceRemainingMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantBalances::PaymentStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-participant_balances-bill_id")
                            .from(ParticipantBalances::Table, ParticipantBalances::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One derived row per (bill, participant); upserted, never appended.
        manager
            .create_index(
                Index::create()
                    .name("idx-participant_balances-bill_id-user_id-unique")
                    .table(ParticipantBalances::Table)
                    .col(ParticipantBalances::BillId)
                    .col(ParticipantBalances::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Payments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::BillId).string().not_null())
                    .col(ColumnDef::new(Payments::FromUserId).string().not_null())
                    .col(ColumnDef::new(Payments::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Payments::Method).string().not_null())
                    .col(
                        ColumnDef::new(Payments::State)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Payments::CompletedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-bill_id")
                            .from(Payments::Table, Payments::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-bill_id-created_at")
                    .table(Payments::Table)
                    .col(Payments::BillId)
                    .col(Payments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-bill_id-from_user_id")
                    .table(Payments::Table)
                    .col(Payments::BillId)
                    .col(Payments::FromUserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ParticipantBalances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Assignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LineItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BillParticipants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bills::Table).to_owned())
            .await?;
        Ok(())
    }
}
