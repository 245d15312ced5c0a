//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[sea_orm(string_value = "dispute_created")]
    DisputeCreated,
    #[sea_orm(string_value = "dispute_message")]
    DisputeMessage,
    #[sea_orm(string_value = "dispute_info_requested")]
    DisputeInfoRequested,
    #[sea_orm(string_value = "dispute_proposal")]
    DisputeProposal,
    #[sea_orm(string_value = "dispute_proposal_decision")]
    DisputeProposalDecision,
    #[sea_orm(string_value = "dispute_mediation")]
    DisputeMediation,
    #[sea_orm(string_value = "dispute_state_changed")]
    DisputeStateChanged,
    #[sea_orm(string_value = "dispute_moderator_assigned")]
    DisputeModeratorAssigned,
    #[sea_orm(string_value = "dispute_expired")]
    DisputeExpired,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user receiving the notification
    pub notifiee_id: String,

    pub notification_type: NotificationType,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    #[sea_orm(nullable)]
    pub entity_type: Option<String>,

    #[sea_orm(nullable)]
    pub entity_id: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub data: Option<Json>,

    /// Has this notification been read?
    #[sea_orm(default_value = false)]
    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::NotifieeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Notifiee,
}

impl ActiveModelBehavior for ActiveModel {}
