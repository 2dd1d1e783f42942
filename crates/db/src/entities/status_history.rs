//! Status history entity (append-only log of issue status transitions).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::issue::IssueStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "status_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub issue_id: String,

    /// NULL for the entry written when the issue is first published
    #[sea_orm(nullable)]
    pub from_status: Option<IssueStatus>,

    pub to_status: IssueStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,

    /// Admin who applied the transition
    #[sea_orm(nullable)]
    pub changed_by: Option<String>,

    pub changed_at: DateTimeWithTimeZone,
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
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
