//! Domain records of the schema graph
//!
//! Services hand these out instead of entity models. Closed variant columns
//! (`type_category`, `relation_type`, collaborator `role`) are stored as text
//! and parsed here; an unknown stored value surfaces as a store failure.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::database::entities::{
    columns, enum_types, project_collaborators, projects, relationships, snapshots, tables,
    undo_entries,
};
use crate::errors::SchemaError;
use crate::graph_patch::GraphPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    Boolean,
    Array,
    Numeric,
    Text,
    Datetime,
    Json,
    Uuid,
    Enum,
    Other,
}

impl TypeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::Boolean => "boolean",
            TypeCategory::Array => "array",
            TypeCategory::Numeric => "numeric",
            TypeCategory::Text => "text",
            TypeCategory::Datetime => "datetime",
            TypeCategory::Json => "json",
            TypeCategory::Uuid => "uuid",
            TypeCategory::Enum => "enum",
            TypeCategory::Other => "other",
        }
    }
}

impl FromStr for TypeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(TypeCategory::Boolean),
            "array" => Ok(TypeCategory::Array),
            "numeric" => Ok(TypeCategory::Numeric),
            "text" => Ok(TypeCategory::Text),
            "datetime" => Ok(TypeCategory::Datetime),
            "json" => Ok(TypeCategory::Json),
            "uuid" => Ok(TypeCategory::Uuid),
            "enum" => Ok(TypeCategory::Enum),
            "other" => Ok(TypeCategory::Other),
            other => Err(format!("Invalid type category: {}", other)),
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::OneToOne => "one-to-one",
            RelationType::OneToMany => "one-to-many",
            RelationType::ManyToMany => "many-to-many",
        }
    }

    /// Many-to-many edges are modeled through a junction table
    pub fn requires_junction(&self) -> bool {
        matches!(self, RelationType::ManyToMany)
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one-to-one" => Ok(RelationType::OneToOne),
            "one-to-many" => Ok(RelationType::OneToMany),
            "many-to-many" => Ok(RelationType::ManyToMany),
            other => Err(format!("Invalid relation type: {}", other)),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorRole {
    Editor,
    Viewer,
}

impl CollaboratorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaboratorRole::Editor => "editor",
            CollaboratorRole::Viewer => "viewer",
        }
    }
}

impl FromStr for CollaboratorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "editor" => Ok(CollaboratorRole::Editor),
            "viewer" => Ok(CollaboratorRole::Viewer),
            other => Err(format!("Invalid collaborator role: {}", other)),
        }
    }
}

impl From<CollaboratorRole> for String {
    fn from(role: CollaboratorRole) -> Self {
        role.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub share_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<projects::Model> for ProjectRecord {
    fn from(model: projects::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            owner_id: model.owner_id,
            share_link: model.share_link,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorRecord {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: CollaboratorRole,
    pub invited_by: String,
    pub invited_at: DateTime<Utc>,
}

impl TryFrom<project_collaborators::Model> for CollaboratorRecord {
    type Error = SchemaError;

    fn try_from(model: project_collaborators::Model) -> Result<Self, Self::Error> {
        let role = model
            .role
            .parse()
            .map_err(|e| SchemaError::corrupt_record(format!("collaborator {}: {}", model.id, e)))?;
        Ok(Self {
            id: model.id,
            project_id: model.project_id,
            user_id: model.user_id,
            role,
            invited_by: model.invited_by,
            invited_at: model.invited_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub position_x: f64,
    pub position_y: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<tables::Model> for TableRecord {
    fn from(model: tables::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            name: model.name,
            position_x: model.position_x,
            position_y: model.position_y,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl TableRecord {
    pub fn to_active_model(&self) -> tables::ActiveModel {
        tables::ActiveModel {
            id: Set(self.id.clone()),
            project_id: Set(self.project_id.clone()),
            name: Set(self.name.clone()),
            position_x: Set(self.position_x),
            position_y: Set(self.position_y),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRecord {
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub data_type: String,
    pub type_category: TypeCategory,
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub is_unique: bool,
    pub default_value: Option<String>,
    pub array_base_type: Option<String>,
    pub enum_type_id: Option<String>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<columns::Model> for ColumnRecord {
    type Error = SchemaError;

    fn try_from(model: columns::Model) -> Result<Self, Self::Error> {
        let type_category = model
            .type_category
            .parse()
            .map_err(|e| SchemaError::corrupt_record(format!("column {}: {}", model.id, e)))?;
        Ok(Self {
            id: model.id,
            table_id: model.table_id,
            name: model.name,
            data_type: model.data_type,
            type_category,
            is_primary_key: model.is_primary_key,
            is_nullable: model.is_nullable,
            is_unique: model.is_unique,
            default_value: model.default_value,
            array_base_type: model.array_base_type,
            enum_type_id: model.enum_type_id,
            order: model.order,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl ColumnRecord {
    pub fn to_active_model(&self) -> columns::ActiveModel {
        columns::ActiveModel {
            id: Set(self.id.clone()),
            table_id: Set(self.table_id.clone()),
            name: Set(self.name.clone()),
            data_type: Set(self.data_type.clone()),
            type_category: Set(self.type_category.as_str().to_string()),
            is_primary_key: Set(self.is_primary_key),
            is_nullable: Set(self.is_nullable),
            is_unique: Set(self.is_unique),
            default_value: Set(self.default_value.clone()),
            array_base_type: Set(self.array_base_type.clone()),
            enum_type_id: Set(self.enum_type_id.clone()),
            order: Set(self.order),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    pub id: String,
    pub project_id: String,
    pub source_table_id: String,
    pub source_column_id: String,
    pub target_table_id: String,
    pub target_column_id: String,
    pub relation_type: RelationType,
    pub junction_table_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<relationships::Model> for RelationshipRecord {
    type Error = SchemaError;

    fn try_from(model: relationships::Model) -> Result<Self, Self::Error> {
        let relation_type = model
            .relation_type
            .parse()
            .map_err(|e| SchemaError::corrupt_record(format!("relationship {}: {}", model.id, e)))?;
        Ok(Self {
            id: model.id,
            project_id: model.project_id,
            source_table_id: model.source_table_id,
            source_column_id: model.source_column_id,
            target_table_id: model.target_table_id,
            target_column_id: model.target_column_id,
            relation_type,
            junction_table_id: model.junction_table_id,
            created_at: model.created_at,
        })
    }
}

impl RelationshipRecord {
    pub fn to_active_model(&self) -> relationships::ActiveModel {
        relationships::ActiveModel {
            id: Set(self.id.clone()),
            project_id: Set(self.project_id.clone()),
            source_table_id: Set(self.source_table_id.clone()),
            source_column_id: Set(self.source_column_id.clone()),
            target_table_id: Set(self.target_table_id.clone()),
            target_column_id: Set(self.target_column_id.clone()),
            relation_type: Set(self.relation_type.as_str().to_string()),
            junction_table_id: Set(self.junction_table_id.clone()),
            created_at: Set(self.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumTypeRecord {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub values: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<enum_types::Model> for EnumTypeRecord {
    type Error = SchemaError;

    fn try_from(model: enum_types::Model) -> Result<Self, Self::Error> {
        let values = serde_json::from_value(model.values)
            .map_err(|e| SchemaError::corrupt_record(format!("enum type {}: {}", model.id, e)))?;
        Ok(Self {
            id: model.id,
            project_id: model.project_id,
            name: model.name,
            values,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl EnumTypeRecord {
    pub fn to_active_model(&self) -> enum_types::ActiveModel {
        enum_types::ActiveModel {
            id: Set(self.id.clone()),
            project_id: Set(self.project_id.clone()),
            name: Set(self.name.clone()),
            values: Set(serde_json::Value::from(self.values.clone())),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub id: String,
    pub project_id: String,
    pub description: String,
    pub data: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<snapshots::Model> for SnapshotRecord {
    fn from(model: snapshots::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            description: model.description,
            data: model.data,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoEntryRecord {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub action_type: String,
    pub before_state: GraphPatch,
    pub after_state: GraphPatch,
    pub position: i32,
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<undo_entries::Model> for UndoEntryRecord {
    type Error = SchemaError;

    fn try_from(model: undo_entries::Model) -> Result<Self, Self::Error> {
        let before_state = GraphPatch::from_json(model.before_state)?;
        let after_state = GraphPatch::from_json(model.after_state)?;
        Ok(Self {
            id: model.id,
            project_id: model.project_id,
            user_id: model.user_id,
            action_type: model.action_type,
            before_state,
            after_state,
            position: model.position,
            superseded: model.superseded,
            created_at: model.created_at,
        })
    }
}

/// Flat entity sets of one project, used by patches and snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphEntities {
    pub tables: Vec<TableRecord>,
    pub columns: Vec<ColumnRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub enum_types: Vec<EnumTypeRecord>,
}

impl GraphEntities {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.columns.is_empty()
            && self.relationships.is_empty()
            && self.enum_types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len() + self.columns.len() + self.relationships.len() + self.enum_types.len()
    }

    pub fn sort_by_id(&mut self) {
        self.tables.sort_by(|a, b| a.id.cmp(&b.id));
        self.columns.sort_by(|a, b| a.id.cmp(&b.id));
        self.relationships.sort_by(|a, b| a.id.cmp(&b.id));
        self.enum_types.sort_by(|a, b| a.id.cmp(&b.id));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableWithColumns {
    #[serde(flatten)]
    pub table: TableRecord,
    pub columns: Vec<ColumnRecord>,
}

/// Read model of a whole project: tables with their ordered columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGraph {
    pub project: ProjectRecord,
    pub tables: Vec<TableWithColumns>,
    pub relationships: Vec<RelationshipRecord>,
    pub enum_types: Vec<EnumTypeRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewColumn {
    pub table_id: String,
    pub name: String,
    pub data_type: String,
    pub type_category: TypeCategory,
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub is_unique: bool,
    pub order: i32,
    pub default_value: Option<String>,
    pub array_base_type: Option<String>,
    pub enum_type_id: Option<String>,
}

impl NewColumn {
    /// Plain nullable column; adjust the public fields for anything else
    pub fn new(
        table_id: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
        type_category: TypeCategory,
        order: i32,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            name: name.into(),
            data_type: data_type.into(),
            type_category,
            is_primary_key: false,
            is_nullable: true,
            is_unique: false,
            order,
            default_value: None,
            array_base_type: None,
            enum_type_id: None,
        }
    }
}

/// Partial table update
///
/// Also the field-level state of `table.update` undo entries, so only
/// supplied fields are serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
}

impl TableUpdate {
    /// The fields supplied here, with their values taken from `table`
    pub fn values_of(&self, table: &TableRecord) -> TableUpdate {
        TableUpdate {
            name: self.name.as_ref().map(|_| table.name.clone()),
            position_x: self.position_x.map(|_| table.position_x),
            position_y: self.position_y.map(|_| table.position_y),
        }
    }
}

/// Partial column update. The outer `Option` of a nullable field tells
/// whether it was supplied, the inner one carries an explicit clear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_category: Option<TypeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_unique: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "supplied"
    )]
    pub default_value: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "supplied"
    )]
    pub array_base_type: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "supplied"
    )]
    pub enum_type_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl ColumnUpdate {
    pub fn order_only(order: i32) -> Self {
        Self {
            order: Some(order),
            ..Default::default()
        }
    }

    /// The fields supplied here, with their values taken from `column`
    pub fn values_of(&self, column: &ColumnRecord) -> ColumnUpdate {
        ColumnUpdate {
            name: self.name.as_ref().map(|_| column.name.clone()),
            data_type: self.data_type.as_ref().map(|_| column.data_type.clone()),
            type_category: self.type_category.map(|_| column.type_category),
            is_primary_key: self.is_primary_key.map(|_| column.is_primary_key),
            is_nullable: self.is_nullable.map(|_| column.is_nullable),
            is_unique: self.is_unique.map(|_| column.is_unique),
            default_value: self
                .default_value
                .as_ref()
                .map(|_| column.default_value.clone()),
            array_base_type: self
                .array_base_type
                .as_ref()
                .map(|_| column.array_base_type.clone()),
            enum_type_id: self
                .enum_type_id
                .as_ref()
                .map(|_| column.enum_type_id.clone()),
            order: self.order.map(|_| column.order),
        }
    }
}

/// A present key, `null` included, deserializes as supplied
fn supplied<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRelationship {
    pub project_id: String,
    pub source_table_id: String,
    pub source_column_id: String,
    pub target_table_id: String,
    pub target_column_id: String,
    pub relation_type: RelationType,
    pub junction_table_id: Option<String>,
}

/// Cardinality of a relationship together with its junction table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipTypeUpdate {
    pub relation_type: RelationType,
    #[serde(default)]
    pub junction_table_id: Option<String>,
}

impl From<&RelationshipRecord> for RelationshipTypeUpdate {
    fn from(relationship: &RelationshipRecord) -> Self {
        Self {
            relation_type: relationship.relation_type,
            junction_table_id: relationship.junction_table_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumTypeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl EnumTypeUpdate {
    /// The fields supplied here, with their values taken from `enum_type`
    pub fn values_of(&self, enum_type: &EnumTypeRecord) -> EnumTypeUpdate {
        EnumTypeUpdate {
            name: self.name.as_ref().map(|_| enum_type.name.clone()),
            values: self.values.as_ref().map(|_| enum_type.values.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_variants_round_trip_through_text() {
        for category in [
            TypeCategory::Boolean,
            TypeCategory::Array,
            TypeCategory::Numeric,
            TypeCategory::Text,
            TypeCategory::Datetime,
            TypeCategory::Json,
            TypeCategory::Uuid,
            TypeCategory::Enum,
            TypeCategory::Other,
        ] {
            assert_eq!(category.as_str().parse::<TypeCategory>(), Ok(category));
        }
        assert!("varchar".parse::<TypeCategory>().is_err());
        assert_eq!(
            "many-to-many".parse::<RelationType>(),
            Ok(RelationType::ManyToMany)
        );
    }

    #[test]
    fn test_only_many_to_many_requires_junction() {
        assert!(RelationType::ManyToMany.requires_junction());
        assert!(!RelationType::OneToMany.requires_junction());
        assert!(!RelationType::OneToOne.requires_junction());
    }

    #[test]
    fn test_unknown_stored_category_is_a_store_failure() {
        let now = Utc::now();
        let model = columns::Model {
            id: "c1".into(),
            table_id: "t1".into(),
            name: "id".into(),
            data_type: "int".into(),
            type_category: "integer".into(),
            is_primary_key: true,
            is_nullable: false,
            is_unique: true,
            default_value: None,
            array_base_type: None,
            enum_type_id: None,
            order: 0,
            created_at: now,
            updated_at: now,
        };

        let err = ColumnRecord::try_from(model).expect_err("unknown category");
        assert!(matches!(err, SchemaError::StoreFailure { .. }));
    }

    #[test]
    fn test_records_serialize_camel_case() {
        let now = Utc::now();
        let relationship = RelationshipRecord {
            id: "r1".into(),
            project_id: "p1".into(),
            source_table_id: "t1".into(),
            source_column_id: "c1".into(),
            target_table_id: "t2".into(),
            target_column_id: "c2".into(),
            relation_type: RelationType::OneToMany,
            junction_table_id: None,
            created_at: now,
        };

        let value = serde_json::to_value(&relationship).expect("serializes");
        assert_eq!(value["sourceColumnId"], "c1");
        assert_eq!(value["relationType"], "one-to-many");
    }

    #[test]
    fn test_column_update_keeps_only_supplied_fields() {
        let now = Utc::now();
        let column = ColumnRecord {
            id: "c1".into(),
            table_id: "t1".into(),
            name: "email".into(),
            data_type: "text".into(),
            type_category: TypeCategory::Text,
            is_primary_key: false,
            is_nullable: true,
            is_unique: false,
            default_value: Some("''".into()),
            array_base_type: None,
            enum_type_id: None,
            order: 3,
            created_at: now,
            updated_at: now,
        };
        let update = ColumnUpdate {
            name: Some("mail".into()),
            default_value: Some(None),
            ..Default::default()
        };

        let prior = update.values_of(&column);
        assert_eq!(prior.name.as_deref(), Some("email"));
        assert_eq!(prior.default_value, Some(Some("''".to_string())));
        assert_eq!(prior.order, None);

        let value = serde_json::to_value(&update).expect("serializes");
        assert_eq!(value, serde_json::json!({"name": "mail", "defaultValue": null}));
        let parsed: ColumnUpdate = serde_json::from_value(value).expect("deserializes");
        assert_eq!(parsed, update);
    }
}
