//! Create attachment table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Attachment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attachment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Attachment::IssueId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Attachment::UploaderId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attachment::FileType).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Attachment::OriginalName)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Attachment::ContentType)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attachment::Size).big_integer().not_null())
                    .col(
                        ColumnDef::new(Attachment::StorageKey)
                            .string_len(1024)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attachment::FileUrl).text().not_null())
                    .col(
                        ColumnDef::new(Attachment::IsApproved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Attachment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachment_issue")
                            .from(Attachment::Table, Attachment::IssueId)
                            .to(Issue::Table, Issue::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachment_uploader")
                            .from(Attachment::Table, Attachment::UploaderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attachment_issue_id")
                    .table(Attachment::Table)
                    .col(Attachment::IssueId)
                    .to_owned(),
            )
            .await?;

        // Index: (is_approved, created_at) for the pending queue
        manager
            .create_index(
                Index::create()
                    .name("idx_attachment_approved_created")
                    .table(Attachment::Table)
                    .col(Attachment::IsApproved)
                    .col(Attachment::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attachment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Attachment {
    Table,
    Id,
    IssueId,
    UploaderId,
    FileType,
    OriginalName,
    ContentType,
    Size,
    StorageKey,
    FileUrl,
    IsApproved,
    CreatedAt,
}

#[derive(Iden)]
enum Issue {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
