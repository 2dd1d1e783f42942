//! Create issue table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Issue::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Issue::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Issue::AuthorId).string_len(32).not_null())
                    .col(ColumnDef::new(Issue::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Issue::Summary).text().not_null())
                    .col(
                        ColumnDef::new(Issue::EnforcementType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Issue::FieldCategory).string_len(64).not_null())
                    .col(ColumnDef::new(Issue::Region).string_len(64).not_null())
                    .col(ColumnDef::new(Issue::OccurredAt).date().not_null())
                    .col(ColumnDef::new(Issue::ContentOverview).text().not_null())
                    .col(ColumnDef::new(Issue::ContentProblem).text().not_null())
                    .col(ColumnDef::new(Issue::ContentCommonSense).text().not_null())
                    .col(ColumnDef::new(Issue::ContentComparison).text())
                    .col(ColumnDef::new(Issue::ContentStatus).text())
                    .col(
                        ColumnDef::new(Issue::RequestTypes)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Issue::Agencies)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Issue::Status)
                            .string_len(16)
                            .not_null()
                            .default("접수됨"),
                    )
                    .col(ColumnDef::new(Issue::Conclusion).string_len(16))
                    .col(
                        ColumnDef::new(Issue::IsPublished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Issue::PublishedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Issue::SupportCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Issue::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Issue::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issue_author")
                            .from(Issue::Table, Issue::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: moderation queue and public listing
        manager
            .create_index(
                Index::create()
                    .name("idx_issue_published_created")
                    .table(Issue::Table)
                    .col(Issue::IsPublished)
                    .col(Issue::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issue_published_at")
                    .table(Issue::Table)
                    .col(Issue::PublishedAt)
                    .to_owned(),
            )
            .await?;

        // Index: ranking
        manager
            .create_index(
                Index::create()
                    .name("idx_issue_support_count")
                    .table(Issue::Table)
                    .col(Issue::SupportCount)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issue_author_id")
                    .table(Issue::Table)
                    .col(Issue::AuthorId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Issue::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Issue {
    Table,
    Id,
    AuthorId,
    Title,
    Summary,
    EnforcementType,
    FieldCategory,
    Region,
    OccurredAt,
    ContentOverview,
    ContentProblem,
    ContentCommonSense,
    ContentComparison,
    ContentStatus,
    RequestTypes,
    Agencies,
    Status,
    Conclusion,
    IsPublished,
    PublishedAt,
    SupportCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
