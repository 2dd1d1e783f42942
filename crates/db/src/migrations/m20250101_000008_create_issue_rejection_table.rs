//! Create issue rejection log table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IssueRejection::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IssueRejection::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IssueRejection::IssueId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IssueRejection::AuthorId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(IssueRejection::Title).string_len(200).not_null())
                    .col(ColumnDef::new(IssueRejection::Reason).text().not_null())
                    .col(
                        ColumnDef::new(IssueRejection::RejectedBy)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IssueRejection::RejectedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issue_rejection_issue_id")
                    .table(IssueRejection::Table)
                    .col(IssueRejection::IssueId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issue_rejection_rejected_at")
                    .table(IssueRejection::Table)
                    .col(IssueRejection::RejectedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IssueRejection::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum IssueRejection {
    Table,
    Id,
    IssueId,
    AuthorId,
    Title,
    Reason,
    RejectedBy,
    RejectedAt,
}
