//! Issue rejection entity.
//!
//! Rejected issues are hard-deleted; this log keeps who rejected what and why.
//! Rows outlive the issue, so there is no foreign key to `issue`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issue_rejection")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Id of the deleted issue
    pub issue_id: String,

    pub author_id: String,

    /// Title at the time of rejection
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub reason: String,

    pub rejected_by: String,

    pub rejected_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
