use sea_orm::DbErr;
use serde::{Deserialize, Serialize};

use crate::errors::{SchemaError, SchemaResult};
use crate::graph_types::{
    ColumnUpdate, EnumTypeUpdate, GraphEntities, RelationshipTypeUpdate, TableUpdate,
};

/// Reference to one removable graph entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum EntityRef {
    Table(String),
    Column(String),
    Relationship(String),
    EnumType(String),
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Table(id)
            | EntityRef::Column(id)
            | EntityRef::Relationship(id)
            | EntityRef::EnumType(id) => id,
        }
    }
}

/// Field-level change of one existing entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChange<U> {
    pub id: String,
    pub fields: U,
}

impl<U> EntityChange<U> {
    pub fn new(id: impl Into<String>, fields: U) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphChanges {
    pub tables: Vec<EntityChange<TableUpdate>>,
    pub enum_types: Vec<EntityChange<EnumTypeUpdate>>,
    pub columns: Vec<EntityChange<ColumnUpdate>>,
    pub relationships: Vec<EntityChange<RelationshipTypeUpdate>>,
}

impl GraphChanges {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.enum_types.is_empty()
            && self.columns.is_empty()
            && self.relationships.is_empty()
    }
}

/// State change stored on both sides of an undo entry
///
/// Applying a patch removes the referenced entities, writes the upserted
/// records as given, then changes only the listed fields of entities that
/// must still exist. Updates are recorded as changes so that undoing one
/// never rewrites fields another user has touched since.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphPatch {
    pub upsert: GraphEntities,
    pub remove: Vec<EntityRef>,
    pub change: GraphChanges,
}

impl GraphPatch {
    pub fn upserting(entities: GraphEntities) -> Self {
        Self {
            upsert: entities,
            ..Default::default()
        }
    }

    pub fn removing(refs: Vec<EntityRef>) -> Self {
        Self {
            remove: refs,
            ..Default::default()
        }
    }

    pub fn changing(changes: GraphChanges) -> Self {
        Self {
            change: changes,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty() && self.change.is_empty()
    }

    pub fn to_json(&self) -> SchemaResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| SchemaError::from(DbErr::Json(e.to_string())))
    }

    pub fn from_json(value: serde_json::Value) -> SchemaResult<Self> {
        serde_json::from_value(value).map_err(|e| SchemaError::from(DbErr::Json(e.to_string())))
    }
}

impl GraphEntities {
    /// Refs of every entity in the set
    pub fn refs(&self) -> Vec<EntityRef> {
        self.relationships
            .iter()
            .map(|r| EntityRef::Relationship(r.id.clone()))
            .chain(self.columns.iter().map(|c| EntityRef::Column(c.id.clone())))
            .chain(self.tables.iter().map(|t| EntityRef::Table(t.id.clone())))
            .chain(self.enum_types.iter().map(|e| EntityRef::EnumType(e.id.clone())))
            .collect()
    }
}
