use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};

use crate::auth::Actor;
use crate::common::{clean_name, new_id, with_retry, RetryPolicy};
use crate::database::entities::{columns, relationships, tables};
use crate::errors::SchemaResult;
use crate::graph_patch::{EntityChange, EntityRef, GraphChanges, GraphPatch};
use crate::graph_types::{
    GraphEntities, RelationshipRecord, TableRecord, TableUpdate, TableWithColumns,
};
use crate::services::authorization::{read_or_none, AuthorizationService, Capability};
use crate::services::graph_query::load_table_columns;
use crate::services::undo_service::UndoService;

pub struct TableService {
    db: DatabaseConnection,
    auth: AuthorizationService,
    retry: RetryPolicy,
}

impl TableService {
    pub fn new(db: DatabaseConnection, auth: AuthorizationService, retry: RetryPolicy) -> Self {
        Self { db, auth, retry }
    }

    /// Names are not unique within a project
    pub async fn create_table(
        &self,
        actor: &Actor,
        project_id: &str,
        name: &str,
        position_x: f64,
        position_y: f64,
    ) -> SchemaResult<TableRecord> {
        with_retry(&self.retry, "create table", move || {
            self.create_table_once(actor, project_id, name, position_x, position_y)
        })
        .await
    }

    async fn create_table_once(
        &self,
        actor: &Actor,
        project_id: &str,
        name: &str,
        position_x: f64,
        position_y: f64,
    ) -> SchemaResult<TableRecord> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, project_id, Capability::Write)
            .await?;
        let name = clean_name("table", name)?;

        let now = Utc::now();
        let table = TableRecord::from(
            tables::ActiveModel {
                id: Set(new_id()),
                project_id: Set(project_id.to_string()),
                name: Set(name),
                position_x: Set(position_x),
                position_y: Set(position_y),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?,
        );

        UndoService::record(
            &txn,
            project_id,
            &authorized.user_id,
            "table.create",
            &GraphPatch::removing(vec![EntityRef::Table(table.id.clone())]),
            &GraphPatch::upserting(GraphEntities {
                tables: vec![table.clone()],
                ..Default::default()
            }),
        )
        .await?;
        txn.commit().await?;

        info!("Created table {} in project {}", table.id, project_id);
        Ok(table)
    }

    pub async fn get_table(&self, actor: &Actor, id: &str) -> SchemaResult<Option<TableRecord>> {
        let found = read_or_none(
            self.auth
                .authorize_table(&self.db, actor, id, Capability::Read)
                .await,
        )?;
        Ok(found.map(|(table, _)| TableRecord::from(table)))
    }

    /// Tables of a project with their ordered columns
    pub async fn list_tables(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Vec<TableWithColumns>> {
        if self
            .auth
            .authorize_read(&self.db, actor, project_id)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        let tables = tables::Entity::find()
            .filter(tables::Column::ProjectId.eq(project_id))
            .order_by_asc(tables::Column::CreatedAt)
            .order_by_asc(tables::Column::Id)
            .all(&self.db)
            .await?;

        let mut result = Vec::with_capacity(tables.len());
        for table in tables {
            let columns = load_table_columns(&self.db, &table.id).await?;
            result.push(TableWithColumns {
                table: TableRecord::from(table),
                columns,
            });
        }
        Ok(result)
    }

    /// Only supplied fields change
    pub async fn update_table(
        &self,
        actor: &Actor,
        id: &str,
        update: &TableUpdate,
    ) -> SchemaResult<TableRecord> {
        with_retry(&self.retry, "update table", move || {
            self.update_table_once(actor, id, update)
        })
        .await
    }

    async fn update_table_once(
        &self,
        actor: &Actor,
        id: &str,
        update: &TableUpdate,
    ) -> SchemaResult<TableRecord> {
        let txn = self.db.begin().await?;
        let (table, authorized) = self
            .auth
            .authorize_table(&txn, actor, id, Capability::Write)
            .await?;
        let before = TableRecord::from(table.clone());
        let after = apply_table_update(&txn, table, update, Utc::now()).await?;

        let changes = |table: &TableRecord| {
            GraphPatch::changing(GraphChanges {
                tables: vec![EntityChange::new(id, update.values_of(table))],
                ..Default::default()
            })
        };
        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "table.update",
            &changes(&before),
            &changes(&after),
        )
        .await?;
        txn.commit().await?;

        info!("Updated table {}", id);
        Ok(after)
    }

    /// Deletes the table, its columns, and every relationship that touches
    /// either of them, in one transaction
    pub async fn delete_table(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        with_retry(&self.retry, "delete table", move || {
            self.delete_table_once(actor, id)
        })
        .await
    }

    async fn delete_table_once(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        let txn = self.db.begin().await?;
        let (table, authorized) = self
            .auth
            .authorize_table(&txn, actor, id, Capability::Write)
            .await?;

        let columns = load_table_columns(&txn, id).await?;
        let column_ids: Vec<String> = columns.iter().map(|c| c.id.clone()).collect();

        let dependent = relationships::Entity::find()
            .filter(
                Condition::any()
                    .add(relationships::Column::SourceTableId.eq(id))
                    .add(relationships::Column::TargetTableId.eq(id))
                    .add(relationships::Column::JunctionTableId.eq(id))
                    .add(relationships::Column::SourceColumnId.is_in(column_ids.clone()))
                    .add(relationships::Column::TargetColumnId.is_in(column_ids.clone())),
            )
            .order_by_asc(relationships::Column::CreatedAt)
            .all(&txn)
            .await?
            .into_iter()
            .map(RelationshipRecord::try_from)
            .collect::<SchemaResult<Vec<_>>>()?;
        let relationship_ids: Vec<String> = dependent.iter().map(|r| r.id.clone()).collect();

        if !relationship_ids.is_empty() {
            debug!(
                "Cascading delete of table {} to {} relationships",
                id,
                relationship_ids.len()
            );
            relationships::Entity::delete_many()
                .filter(relationships::Column::Id.is_in(relationship_ids))
                .exec(&txn)
                .await?;
        }
        columns::Entity::delete_many()
            .filter(columns::Column::TableId.eq(id))
            .exec(&txn)
            .await?;
        tables::Entity::delete_by_id(id).exec(&txn).await?;

        let removed = GraphEntities {
            tables: vec![TableRecord::from(table)],
            columns,
            relationships: dependent,
            enum_types: Vec::new(),
        };
        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "table.delete",
            &GraphPatch::upserting(removed.clone()),
            &GraphPatch::removing(removed.refs()),
        )
        .await?;
        txn.commit().await?;

        info!(
            "Deleted table {} with {} columns and {} relationships",
            id,
            removed.columns.len(),
            removed.relationships.len()
        );
        Ok(())
    }
}

/// Write the supplied fields onto a stored table
pub(crate) async fn apply_table_update<C: ConnectionTrait>(
    conn: &C,
    table: tables::Model,
    update: &TableUpdate,
    now: DateTime<Utc>,
) -> SchemaResult<TableRecord> {
    let mut active: tables::ActiveModel = table.into();
    if let Some(name) = &update.name {
        active.name = Set(clean_name("table", name)?);
    }
    if let Some(x) = update.position_x {
        active.position_x = Set(x);
    }
    if let Some(y) = update.position_y {
        active.position_y = Set(y);
    }
    active.updated_at = Set(now);
    Ok(TableRecord::from(active.update(conn).await?))
}
