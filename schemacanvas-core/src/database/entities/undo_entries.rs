use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One step of a per-(project, user) undo stack
///
/// `before_state` and `after_state` hold serialized graph patches. Entries are
/// never deleted; a new push above an undone head marks the abandoned branch
/// as superseded.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "undo_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub action_type: String,
    #[sea_orm(column_type = "Json")]
    pub before_state: Json,
    #[sea_orm(column_type = "Json")]
    pub after_state: Json,
    pub position: i32,
    pub superseded: bool,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id"
    )]
    Projects,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
