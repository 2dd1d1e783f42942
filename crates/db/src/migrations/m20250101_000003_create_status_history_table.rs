//! Create status history table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StatusHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StatusHistory::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StatusHistory::IssueId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StatusHistory::FromStatus).string_len(16))
                    .col(
                        ColumnDef::new(StatusHistory::ToStatus)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StatusHistory::Note).text())
                    .col(ColumnDef::new(StatusHistory::ChangedBy).string_len(32))
                    .col(
                        ColumnDef::new(StatusHistory::ChangedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_history_issue")
                            .from(StatusHistory::Table, StatusHistory::IssueId)
                            .to(Issue::Table, Issue::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (issue_id, changed_at) for reading an issue's log in order
        manager
            .create_index(
                Index::create()
                    .name("idx_status_history_issue_changed")
                    .table(StatusHistory::Table)
                    .col(StatusHistory::IssueId)
                    .col(StatusHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StatusHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StatusHistory {
    Table,
    Id,
    IssueId,
    FromStatus,
    ToStatus,
    Note,
    ChangedBy,
    ChangedAt,
}

#[derive(Iden)]
enum Issue {
    Table,
    Id,
}
