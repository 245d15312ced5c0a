//! Audit log entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Null when the scheduler acted.
    #[sea_orm(nullable)]
    pub actor_id: Option<String>,

    /// Dotted action name, e.g. `dispute.state.update`
    pub action: String,

    pub entity_type: String,

    pub entity_id: String,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub before: Option<Json>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub after: Option<Json>,

    /// Request context such as IP and user agent.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
