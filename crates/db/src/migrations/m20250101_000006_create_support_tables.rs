//! Create issue_support and comment_support tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IssueSupport::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IssueSupport::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IssueSupport::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(IssueSupport::IssueId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IssueSupport::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issue_support_user")
                            .from(IssueSupport::Table, IssueSupport::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issue_support_issue")
                            .from(IssueSupport::Table, IssueSupport::IssueId)
                            .to(Issue::Table, Issue::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one support per user per issue
        manager
            .create_index(
                Index::create()
                    .name("idx_issue_support_user_issue")
                    .table(IssueSupport::Table)
                    .col(IssueSupport::UserId)
                    .col(IssueSupport::IssueId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CommentSupport::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommentSupport::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommentSupport::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommentSupport::CommentId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommentSupport::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_support_user")
                            .from(CommentSupport::Table, CommentSupport::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_support_comment")
                            .from(CommentSupport::Table, CommentSupport::CommentId)
                            .to(Comment::Table, Comment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one support per user per comment
        manager
            .create_index(
                Index::create()
                    .name("idx_comment_support_user_comment")
                    .table(CommentSupport::Table)
                    .col(CommentSupport::UserId)
                    .col(CommentSupport::CommentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommentSupport::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IssueSupport::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum IssueSupport {
    Table,
    Id,
    UserId,
    IssueId,
    CreatedAt,
}

#[derive(Iden)]
enum CommentSupport {
    Table,
    Id,
    UserId,
    CommentId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Issue {
    Table,
    Id,
}

#[derive(Iden)]
enum Comment {
    Table,
    Id,
}
