//! Adds simplified-accounting state to groups and the group-level
//! settlement table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    IsSimplified,
    SimplificationExpenseId,
}

#[derive(Iden)]
enum GroupPayments {
    Table,
    Id,
    GroupId,
    FromId,
    ToId,
    Amount,
    CreatorId,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Groups::Table)
                    .add_column(
                        ColumnDef::new(Groups::IsSimplified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Groups::Table)
                    .add_column(ColumnDef::new(Groups::SimplificationExpenseId).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupPayments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupPayments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupPayments::GroupId).string().not_null())
                    .col(ColumnDef::new(GroupPayments::FromId).string().not_null())
                    .col(ColumnDef::new(GroupPayments::ToId).string().not_null())
                    .col(
                        ColumnDef::new(GroupPayments::Amount)
                            .decimal_len(14, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GroupPayments::CreatorId).string().not_null())
                    .col(
                        ColumnDef::new(GroupPayments::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_payments-group_id")
                            .from(GroupPayments::Table, GroupPayments::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-group_payments-group_id")
                    .table(GroupPayments::Table)
                    .col(GroupPayments::GroupId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupPayments::Table).to_owned())
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Groups::Table)
                    .drop_column(Groups::SimplificationExpenseId)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Groups::Table)
                    .drop_column(Groups::IsSimplified)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
