//! Versioned JSON encoding of a project's schema graph
//!
//! ```json
//! {"format":"schemacanvas/snapshot","version":1,"projectId":"...",
//!  "tables":[...],"columns":[...],"relationships":[...],"enumTypes":[...]}
//! ```
//!
//! Entities are sorted by id, so equal graphs encode to equal text.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::{SchemaError, SchemaResult};
use crate::graph_types::{
    ColumnRecord, EnumTypeRecord, GraphEntities, RelationshipRecord, TableRecord,
};

pub const SNAPSHOT_FORMAT: &str = "schemacanvas/snapshot";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub format: String,
    pub version: u32,
    pub project_id: String,
    pub tables: Vec<TableRecord>,
    pub columns: Vec<ColumnRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub enum_types: Vec<EnumTypeRecord>,
}

impl SnapshotPayload {
    pub fn from_entities(project_id: &str, mut entities: GraphEntities) -> Self {
        entities.sort_by_id();
        Self {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            project_id: project_id.to_string(),
            tables: entities.tables,
            columns: entities.columns,
            relationships: entities.relationships,
            enum_types: entities.enum_types,
        }
    }

    pub fn into_entities(self) -> GraphEntities {
        GraphEntities {
            tables: self.tables,
            columns: self.columns,
            relationships: self.relationships,
            enum_types: self.enum_types,
        }
    }

    pub fn encode(&self) -> SchemaResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SchemaError::invalid(format!("snapshot cannot be encoded: {}", e)))
    }

    /// Parse and validate; every failure is `CorruptSnapshot`
    pub fn decode(text: &str) -> SchemaResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SchemaError::CorruptSnapshot(format!("malformed JSON: {}", e)))?;

        match value.get("format").and_then(|f| f.as_str()) {
            Some(SNAPSHOT_FORMAT) => {}
            Some(other) => {
                return Err(SchemaError::CorruptSnapshot(format!(
                    "unknown format {}",
                    other
                )))
            }
            None => return Err(SchemaError::CorruptSnapshot("missing format".to_string())),
        }
        match value.get("version").and_then(|v| v.as_u64()) {
            Some(version) if version == u64::from(SNAPSHOT_VERSION) => {}
            Some(version) => {
                return Err(SchemaError::CorruptSnapshot(format!(
                    "unsupported version {}",
                    version
                )))
            }
            None => return Err(SchemaError::CorruptSnapshot("missing version".to_string())),
        }

        let payload: SnapshotPayload = serde_json::from_value(value)
            .map_err(|e| SchemaError::CorruptSnapshot(format!("invalid payload: {}", e)))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Internal consistency: ownership, unique ids and names, no dangling references
    pub fn validate(&self) -> SchemaResult<()> {
        let corrupt = |message: String| Err(SchemaError::CorruptSnapshot(message));

        let mut table_projects: HashMap<&str, &str> = HashMap::new();
        for table in &self.tables {
            if table.project_id != self.project_id {
                return corrupt(format!("table {} belongs to another project", table.id));
            }
            if table_projects
                .insert(table.id.as_str(), table.project_id.as_str())
                .is_some()
            {
                return corrupt(format!("duplicate table {}", table.id));
            }
        }

        let mut enum_ids = HashSet::new();
        let mut enum_names = HashSet::new();
        for enum_type in &self.enum_types {
            if enum_type.project_id != self.project_id {
                return corrupt(format!("enum type {} belongs to another project", enum_type.id));
            }
            if !enum_ids.insert(enum_type.id.as_str()) {
                return corrupt(format!("duplicate enum type {}", enum_type.id));
            }
            if !enum_names.insert(enum_type.name.as_str()) {
                return corrupt(format!("duplicate enum name {}", enum_type.name));
            }
        }

        let mut column_tables: HashMap<&str, &str> = HashMap::new();
        for column in &self.columns {
            if !table_projects.contains_key(column.table_id.as_str()) {
                return corrupt(format!(
                    "column {} references missing table {}",
                    column.id, column.table_id
                ));
            }
            if let Some(enum_type_id) = &column.enum_type_id {
                if !enum_ids.contains(enum_type_id.as_str()) {
                    return corrupt(format!(
                        "column {} references missing enum type {}",
                        column.id, enum_type_id
                    ));
                }
            }
            if column_tables
                .insert(column.id.as_str(), column.table_id.as_str())
                .is_some()
            {
                return corrupt(format!("duplicate column {}", column.id));
            }
        }

        let mut relationship_ids = HashSet::new();
        for relationship in &self.relationships {
            if relationship.project_id != self.project_id {
                return corrupt(format!(
                    "relationship {} belongs to another project",
                    relationship.id
                ));
            }
            if !relationship_ids.insert(relationship.id.as_str()) {
                return corrupt(format!("duplicate relationship {}", relationship.id));
            }
            for (table_id, column_id) in [
                (&relationship.source_table_id, &relationship.source_column_id),
                (&relationship.target_table_id, &relationship.target_column_id),
            ] {
                if column_tables.get(column_id.as_str()) != Some(&table_id.as_str()) {
                    return corrupt(format!(
                        "relationship {} references column {} outside table {}",
                        relationship.id, column_id, table_id
                    ));
                }
            }
            match &relationship.junction_table_id {
                Some(junction) if !table_projects.contains_key(junction.as_str()) => {
                    return corrupt(format!(
                        "relationship {} references missing junction table {}",
                        relationship.id, junction
                    ));
                }
                Some(_) if !relationship.relation_type.requires_junction() => {
                    return corrupt(format!(
                        "{} relationship {} has a junction table",
                        relationship.relation_type, relationship.id
                    ));
                }
                None if relationship.relation_type.requires_junction() => {
                    return corrupt(format!(
                        "relationship {} lacks its junction table",
                        relationship.id
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
