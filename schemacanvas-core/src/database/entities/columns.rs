use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A field of a modeled table
///
/// `order` is dense (0..N-1) within a table once the table has been
/// reordered; creation accepts whatever the caller supplies.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "columns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub data_type: String,
    pub type_category: String, // boolean, array, numeric, text, datetime, json, uuid, enum, other
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub is_unique: bool,
    pub default_value: Option<String>,
    pub array_base_type: Option<String>,
    pub enum_type_id: Option<String>,
    pub order: i32,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tables::Entity",
        from = "Column::TableId",
        to = "super::tables::Column::Id"
    )]
    Tables,
    #[sea_orm(
        belongs_to = "super::enum_types::Entity",
        from = "Column::EnumTypeId",
        to = "super::enum_types::Column::Id"
    )]
    EnumTypes,
}

impl Related<super::tables::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tables.def()
    }
}

impl Related<super::enum_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnumTypes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
