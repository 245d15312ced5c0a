//! Dispute message entity.
//!
//! Messages are append-only: rows are never updated or deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    #[sea_orm(string_value = "buyer")]
    Buyer,
    #[sea_orm(string_value = "seller")]
    Seller,
    #[sea_orm(string_value = "influencer")]
    Influencer,
    #[sea_orm(string_value = "moderator")]
    Moderator,
    #[sea_orm(string_value = "system")]
    System,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "nombre")]
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub url: String,
    /// Storage key, known only while the upload is being written.
    #[serde(default, skip_serializing)]
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispute_message")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub dispute_id: String,

    pub author_role: AuthorRole,

    /// Null for system messages
    #[sea_orm(nullable)]
    pub author_id: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub text: String,

    /// JSON array of [`Attachment`]
    #[sea_orm(column_type = "JsonBinary")]
    pub attachments: Json,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Decode the attachment list. Malformed entries yield an empty list.
    #[must_use]
    pub fn attachment_list(&self) -> Vec<Attachment> {
        serde_json::from_value(self.attachments.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dispute::Entity",
        from = "Column::DisputeId",
        to = "super::dispute::Column::Id",
        on_delete = "Cascade"
    )]
    Dispute,
}

impl Related<super::dispute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dispute.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
