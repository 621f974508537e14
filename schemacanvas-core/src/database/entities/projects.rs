use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[sea_orm(unique)]
    pub share_link: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tables::Entity")]
    Tables,
    #[sea_orm(has_many = "super::relationships::Entity")]
    Relationships,
    #[sea_orm(has_many = "super::enum_types::Entity")]
    EnumTypes,
    #[sea_orm(has_many = "super::snapshots::Entity")]
    Snapshots,
    #[sea_orm(has_many = "super::project_collaborators::Entity")]
    ProjectCollaborators,
}

impl Related<super::tables::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tables.def()
    }
}

impl Related<super::relationships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Relationships.def()
    }
}

impl Related<super::enum_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnumTypes.def()
    }
}

impl Related<super::snapshots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Snapshots.def()
    }
}

impl Related<super::project_collaborators::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectCollaborators.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
