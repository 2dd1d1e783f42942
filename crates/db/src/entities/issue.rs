//! Issue entity (a citizen-submitted enforcement case).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Workflow status of an issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[derive(Default)]
pub enum IssueStatus {
    #[sea_orm(string_value = "접수됨")]
    #[serde(rename = "접수됨")]
    #[default]
    Received,
    #[sea_orm(string_value = "검토중")]
    #[serde(rename = "검토중")]
    UnderReview,
    #[sea_orm(string_value = "공론화")]
    #[serde(rename = "공론화")]
    PublicDiscussion,
    #[sea_orm(string_value = "기관전달")]
    #[serde(rename = "기관전달")]
    ForwardedToAgency,
    #[sea_orm(string_value = "종결")]
    #[serde(rename = "종결")]
    Concluded,
}

impl IssueStatus {
    /// Position along the workflow, starting at 0 for `Received`.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Received => 0,
            Self::UnderReview => 1,
            Self::PublicDiscussion => 2,
            Self::ForwardedToAgency => 3,
            Self::Concluded => 4,
        }
    }
}

/// Outcome recorded on a concluded issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Conclusion {
    #[sea_orm(string_value = "개선")]
    #[serde(rename = "개선")]
    Improved,
    #[sea_orm(string_value = "기각")]
    #[serde(rename = "기각")]
    Dismissed,
    #[sea_orm(string_value = "보류")]
    #[serde(rename = "보류")]
    Held,
}

/// An agency involved in the case, stored inside the `agencies` JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    pub agency_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issue")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The citizen who submitted the issue
    pub author_id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub summary: String,

    pub enforcement_type: String,

    pub field_category: String,

    pub region: String,

    /// When the enforcement happened
    pub occurred_at: Date,

    #[sea_orm(column_type = "Text")]
    pub content_overview: String,

    #[sea_orm(column_type = "Text")]
    pub content_problem: String,

    #[sea_orm(column_type = "Text")]
    pub content_common_sense: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub content_comparison: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub content_status: Option<String>,

    /// What the citizen asks for, as a JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub request_types: Json,

    /// JSON array of [`Agency`]
    #[sea_orm(column_type = "JsonBinary")]
    pub agencies: Json,

    pub status: IssueStatus,

    #[sea_orm(nullable)]
    pub conclusion: Option<Conclusion>,

    #[sea_orm(default_value = false)]
    pub is_published: bool,

    #[sea_orm(nullable)]
    pub published_at: Option<DateTimeWithTimeZone>,

    /// Denormalized count of `issue_support` rows
    #[sea_orm(default_value = 0)]
    pub support_count: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Decode the `agencies` column, skipping malformed entries.
    #[must_use]
    pub fn agency_list(&self) -> Vec<Agency> {
        self.agencies
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Decode the `request_types` column.
    #[must_use]
    pub fn request_type_list(&self) -> Vec<String> {
        self.request_types
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(has_many = "super::status_history::Entity")]
    StatusHistory,

    #[sea_orm(has_many = "super::attachment::Entity")]
    Attachments,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,

    #[sea_orm(has_many = "super::report::Entity")]
    Reports,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachments.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::report::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reports.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_status_serializes_as_korean_label() {
        assert_eq!(
            serde_json::to_string(&IssueStatus::ForwardedToAgency).unwrap(),
            "\"기관전달\""
        );
        let parsed: Conclusion = serde_json::from_str("\"보류\"").unwrap();
        assert_eq!(parsed, Conclusion::Held);
    }

    #[test]
    fn test_status_ordinals_follow_workflow() {
        let ordinals: Vec<u8> = IssueStatus::iter().map(IssueStatus::ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4]);
    }
}
