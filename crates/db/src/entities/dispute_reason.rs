//! Dispute reason catalogue entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispute_reason")]
pub struct Model {
    /// Reason code stored on disputes as `reason_code`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub clave: String,

    pub titulo: String,

    /// `order`, `campaign` or `application`
    pub categoria: String,

    /// Sort position
    pub orden: i32,

    pub activo: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
