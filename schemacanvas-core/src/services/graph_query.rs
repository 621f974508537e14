use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::database::entities::{columns, enum_types, relationships, tables};
use crate::errors::SchemaResult;
use crate::graph_types::{
    ColumnRecord, EnumTypeRecord, GraphEntities, ProjectGraph, ProjectRecord, RelationshipRecord,
    TableRecord, TableWithColumns,
};

/// Columns of a table by `order`, ties by creation time then id
pub async fn load_table_columns<C: ConnectionTrait>(
    conn: &C,
    table_id: &str,
) -> SchemaResult<Vec<ColumnRecord>> {
    columns::Entity::find()
        .filter(columns::Column::TableId.eq(table_id))
        .order_by_asc(columns::Column::Order)
        .order_by_asc(columns::Column::CreatedAt)
        .order_by_asc(columns::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(ColumnRecord::try_from)
        .collect()
}

/// Every table, column, relationship and enum type of a project
pub async fn load_entities<C: ConnectionTrait>(
    conn: &C,
    project_id: &str,
) -> SchemaResult<GraphEntities> {
    let tables: Vec<TableRecord> = tables::Entity::find()
        .filter(tables::Column::ProjectId.eq(project_id))
        .order_by_asc(tables::Column::CreatedAt)
        .order_by_asc(tables::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(TableRecord::from)
        .collect();

    let table_ids: Vec<String> = tables.iter().map(|t| t.id.clone()).collect();
    let columns = columns::Entity::find()
        .filter(columns::Column::TableId.is_in(table_ids))
        .order_by_asc(columns::Column::Order)
        .order_by_asc(columns::Column::CreatedAt)
        .order_by_asc(columns::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(ColumnRecord::try_from)
        .collect::<SchemaResult<Vec<_>>>()?;

    let relationships = relationships::Entity::find()
        .filter(relationships::Column::ProjectId.eq(project_id))
        .order_by_asc(relationships::Column::CreatedAt)
        .order_by_asc(relationships::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(RelationshipRecord::try_from)
        .collect::<SchemaResult<Vec<_>>>()?;

    let enum_types = enum_types::Entity::find()
        .filter(enum_types::Column::ProjectId.eq(project_id))
        .order_by_asc(enum_types::Column::Name)
        .all(conn)
        .await?
        .into_iter()
        .map(EnumTypeRecord::try_from)
        .collect::<SchemaResult<Vec<_>>>()?;

    Ok(GraphEntities {
        tables,
        columns,
        relationships,
        enum_types,
    })
}

/// Group flat entities into the nested read model, keeping column order
pub fn assemble_graph(project: ProjectRecord, entities: GraphEntities) -> ProjectGraph {
    let mut columns_by_table: HashMap<String, Vec<ColumnRecord>> = HashMap::new();
    for column in entities.columns {
        columns_by_table
            .entry(column.table_id.clone())
            .or_default()
            .push(column);
    }

    let tables = entities
        .tables
        .into_iter()
        .map(|table| {
            let columns = columns_by_table.remove(&table.id).unwrap_or_default();
            TableWithColumns { table, columns }
        })
        .collect();

    ProjectGraph {
        project,
        tables,
        relationships: entities.relationships,
        enum_types: entities.enum_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_types::TypeCategory;
    use chrono::Utc;

    fn column(id: &str, table_id: &str, order: i32) -> ColumnRecord {
        let now = Utc::now();
        ColumnRecord {
            id: id.into(),
            table_id: table_id.into(),
            name: id.into(),
            data_type: "text".into(),
            type_category: TypeCategory::Text,
            is_primary_key: false,
            is_nullable: true,
            is_unique: false,
            default_value: None,
            array_base_type: None,
            enum_type_id: None,
            order,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_assemble_graph_groups_columns_by_table() {
        let now = Utc::now();
        let project = ProjectRecord {
            id: "p1".into(),
            name: "Shop".into(),
            owner_id: "u1".into(),
            share_link: None,
            created_at: now,
            updated_at: now,
        };
        let table = |id: &str| TableRecord {
            id: id.into(),
            project_id: "p1".into(),
            name: id.into(),
            position_x: 0.0,
            position_y: 0.0,
            created_at: now,
            updated_at: now,
        };

        let graph = assemble_graph(
            project,
            GraphEntities {
                tables: vec![table("t1"), table("t2")],
                columns: vec![column("a", "t1", 0), column("b", "t2", 0), column("c", "t1", 1)],
                ..Default::default()
            },
        );

        assert_eq!(graph.tables.len(), 2);
        let first: Vec<&str> = graph.tables[0].columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(first, vec!["a", "c"]);
        assert_eq!(graph.tables[1].columns.len(), 1);
    }
}
