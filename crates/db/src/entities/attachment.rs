//! Attachment entity (evidence files bound to an issue).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of document an attachment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AttachmentFileType {
    #[sea_orm(string_value = "판결문")]
    #[serde(rename = "판결문")]
    Judgment,
    #[sea_orm(string_value = "처분서")]
    #[serde(rename = "처분서")]
    Disposition,
    #[sea_orm(string_value = "공문")]
    #[serde(rename = "공문")]
    OfficialLetter,
    #[sea_orm(string_value = "녹취요약")]
    #[serde(rename = "녹취요약")]
    RecordingSummary,
    #[sea_orm(string_value = "언론기사")]
    #[serde(rename = "언론기사")]
    NewsArticle,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub issue_id: String,

    pub uploader_id: String,

    pub file_type: AttachmentFileType,

    /// Name as supplied by the uploader (before sanitizing)
    pub original_name: String,

    pub content_type: String,

    pub size: i64,

    /// Blob store key
    pub storage_key: String,

    /// Time-limited signed reference
    #[sea_orm(column_type = "Text")]
    pub file_url: String,

    #[sea_orm(default_value = false)]
    pub is_approved: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::issue::Entity",
        from = "Column::IssueId",
        to = "super::issue::Column::Id",
        on_delete = "Cascade"
    )]
    Issue,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UploaderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Uploader,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
