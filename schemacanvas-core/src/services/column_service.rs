use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait,
};
use tracing::{debug, info, warn};

use crate::auth::Actor;
use crate::common::{clean_name, new_id, with_retry, RetryPolicy};
use crate::database::entities::{columns, enum_types};
use crate::errors::{SchemaError, SchemaResult};
use crate::graph_patch::{EntityChange, EntityRef, GraphChanges, GraphPatch};
use crate::graph_types::{ColumnRecord, ColumnUpdate, GraphEntities, NewColumn};
use crate::services::authorization::{read_or_none, AuthorizationService, Capability};
use crate::services::graph_patch_applicator::column_reference;
use crate::services::graph_query::load_table_columns;
use crate::services::undo_service::UndoService;

/// Columns of modeled tables: creation, partial updates, guarded deletes and
/// the reorder that restores dense ordering
pub struct ColumnService {
    db: DatabaseConnection,
    auth: AuthorizationService,
    retry: RetryPolicy,
}

impl ColumnService {
    pub fn new(db: DatabaseConnection, auth: AuthorizationService, retry: RetryPolicy) -> Self {
        Self { db, auth, retry }
    }

    /// `order` is taken as supplied; siblings are not renumbered
    pub async fn create_column(
        &self,
        actor: &Actor,
        input: &NewColumn,
    ) -> SchemaResult<ColumnRecord> {
        with_retry(&self.retry, "create column", move || {
            self.create_column_once(actor, input)
        })
        .await
    }

    async fn create_column_once(
        &self,
        actor: &Actor,
        input: &NewColumn,
    ) -> SchemaResult<ColumnRecord> {
        let txn = self.db.begin().await?;
        let (table, authorized) = self
            .auth
            .authorize_table(&txn, actor, &input.table_id, Capability::Write)
            .await?;
        let name = clean_name("column", &input.name)?;
        if let Some(enum_type_id) = &input.enum_type_id {
            ensure_enum_in_project(&txn, enum_type_id, &table.project_id).await?;
        }

        let now = Utc::now();
        let column = ColumnRecord {
            id: new_id(),
            table_id: input.table_id.clone(),
            name,
            data_type: input.data_type.clone(),
            type_category: input.type_category,
            is_primary_key: input.is_primary_key,
            is_nullable: input.is_nullable,
            is_unique: input.is_unique,
            default_value: input.default_value.clone(),
            array_base_type: input.array_base_type.clone(),
            enum_type_id: input.enum_type_id.clone(),
            order: input.order,
            created_at: now,
            updated_at: now,
        };
        column.to_active_model().insert(&txn).await?;

        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "column.create",
            &GraphPatch::removing(vec![EntityRef::Column(column.id.clone())]),
            &GraphPatch::upserting(GraphEntities {
                columns: vec![column.clone()],
                ..Default::default()
            }),
        )
        .await?;
        txn.commit().await?;

        info!(
            "Created column {} in table {} at order {}",
            column.id, column.table_id, column.order
        );
        Ok(column)
    }

    pub async fn get_column(&self, actor: &Actor, id: &str) -> SchemaResult<Option<ColumnRecord>> {
        let found = read_or_none(
            self.auth
                .authorize_column(&self.db, actor, id, Capability::Read)
                .await,
        )?;
        found
            .map(|(column, _, _)| ColumnRecord::try_from(column))
            .transpose()
    }

    /// Ascending by `order`; ties keep creation order
    pub async fn list_columns(
        &self,
        actor: &Actor,
        table_id: &str,
    ) -> SchemaResult<Vec<ColumnRecord>> {
        let found = read_or_none(
            self.auth
                .authorize_table(&self.db, actor, table_id, Capability::Read)
                .await,
        )?;
        match found {
            Some(_) => load_table_columns(&self.db, table_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Only supplied fields change; `created_at` is kept and `updated_at` advances
    pub async fn update_column(
        &self,
        actor: &Actor,
        id: &str,
        update: &ColumnUpdate,
    ) -> SchemaResult<ColumnRecord> {
        with_retry(&self.retry, "update column", move || {
            self.update_column_once(actor, id, update)
        })
        .await
    }

    async fn update_column_once(
        &self,
        actor: &Actor,
        id: &str,
        update: &ColumnUpdate,
    ) -> SchemaResult<ColumnRecord> {
        let txn = self.db.begin().await?;
        let (column, table, authorized) = self
            .auth
            .authorize_column(&txn, actor, id, Capability::Write)
            .await?;
        let before = ColumnRecord::try_from(column.clone())?;
        let after =
            apply_column_update(&txn, column, &table.project_id, update, Utc::now()).await?;

        let changes = |column: &ColumnRecord| {
            GraphPatch::changing(GraphChanges {
                columns: vec![EntityChange::new(id, update.values_of(column))],
                ..Default::default()
            })
        };
        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "column.update",
            &changes(&before),
            &changes(&after),
        )
        .await?;
        txn.commit().await?;

        info!("Updated column {}", id);
        Ok(after)
    }

    /// Rejected with a conflict while any relationship references the column
    pub async fn delete_column(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        with_retry(&self.retry, "delete column", move || {
            self.delete_column_once(actor, id)
        })
        .await
    }

    async fn delete_column_once(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        let txn = self.db.begin().await?;
        let (column, _, authorized) = self
            .auth
            .authorize_column(&txn, actor, id, Capability::Write)
            .await?;

        if let Some(reason) = column_reference(&txn, id).await? {
            warn!("Refusing to delete column {}: {}", id, reason);
            return Err(SchemaError::Conflict(reason));
        }

        let removed = ColumnRecord::try_from(column)?;
        columns::Entity::delete_by_id(id).exec(&txn).await?;

        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "column.delete",
            &GraphPatch::upserting(GraphEntities {
                columns: vec![removed],
                ..Default::default()
            }),
            &GraphPatch::removing(vec![EntityRef::Column(id.to_string())]),
        )
        .await?;
        txn.commit().await?;

        info!("Deleted column {}", id);
        Ok(())
    }

    /// Assign `order = index` to every column of the table, atomically
    ///
    /// The list must name each column of the table exactly once.
    pub async fn reorder_columns(
        &self,
        actor: &Actor,
        table_id: &str,
        ordered_column_ids: &[String],
    ) -> SchemaResult<Vec<ColumnRecord>> {
        with_retry(&self.retry, "reorder columns", move || {
            self.reorder_columns_once(actor, table_id, ordered_column_ids)
        })
        .await
    }

    async fn reorder_columns_once(
        &self,
        actor: &Actor,
        table_id: &str,
        ordered_column_ids: &[String],
    ) -> SchemaResult<Vec<ColumnRecord>> {
        let txn = self.db.begin().await?;
        let (_, authorized) = self
            .auth
            .authorize_table(&txn, actor, table_id, Capability::Write)
            .await?;

        let current = load_table_columns(&txn, table_id).await?;
        validate_reorder(table_id, &current, ordered_column_ids)?;

        let now = Utc::now();
        let mut by_id: HashMap<&str, &ColumnRecord> =
            current.iter().map(|c| (c.id.as_str(), c)).collect();
        let mut reordered = Vec::with_capacity(ordered_column_ids.len());
        for (index, id) in ordered_column_ids.iter().enumerate() {
            let Some(column) = by_id.remove(id.as_str()) else {
                continue;
            };
            let updated = ColumnRecord {
                order: index as i32,
                updated_at: now,
                ..column.clone()
            };
            columns::ActiveModel {
                id: Set(updated.id.clone()),
                order: Set(updated.order),
                updated_at: Set(now),
                ..Default::default()
            }
            .update(&txn)
            .await?;
            reordered.push(updated);
        }

        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "column.reorder",
            &order_changes(&current),
            &order_changes(&reordered),
        )
        .await?;
        txn.commit().await?;

        info!("Reordered {} columns of table {}", reordered.len(), table_id);
        Ok(reordered)
    }
}

/// Membership, uniqueness and full coverage of a reorder request
fn validate_reorder(
    table_id: &str,
    current: &[ColumnRecord],
    ordered_column_ids: &[String],
) -> SchemaResult<()> {
    let members: HashSet<&str> = current.iter().map(|c| c.id.as_str()).collect();
    let mut seen = HashSet::with_capacity(ordered_column_ids.len());

    for id in ordered_column_ids {
        if !members.contains(id.as_str()) {
            return Err(SchemaError::invalid(format!(
                "column {} does not belong to table {}",
                id, table_id
            )));
        }
        if !seen.insert(id.as_str()) {
            return Err(SchemaError::invalid(format!(
                "column {} appears more than once",
                id
            )));
        }
    }

    if seen.len() != members.len() {
        debug!(
            "Reorder of table {} names {} of {} columns",
            table_id,
            seen.len(),
            members.len()
        );
        return Err(SchemaError::invalid(format!(
            "reorder must list all {} columns of table {}",
            members.len(),
            table_id
        )));
    }
    Ok(())
}

/// Only `order` is recorded, so undoing a reorder leaves other fields alone
fn order_changes(columns: &[ColumnRecord]) -> GraphPatch {
    GraphPatch::changing(GraphChanges {
        columns: columns
            .iter()
            .map(|c| EntityChange::new(c.id.as_str(), ColumnUpdate::order_only(c.order)))
            .collect(),
        ..Default::default()
    })
}

/// Write the supplied fields onto a stored column of `project_id`
pub(crate) async fn apply_column_update<C: ConnectionTrait>(
    conn: &C,
    column: columns::Model,
    project_id: &str,
    update: &ColumnUpdate,
    now: DateTime<Utc>,
) -> SchemaResult<ColumnRecord> {
    let mut active: columns::ActiveModel = column.into();
    if let Some(name) = &update.name {
        active.name = Set(clean_name("column", name)?);
    }
    if let Some(data_type) = &update.data_type {
        active.data_type = Set(data_type.clone());
    }
    if let Some(type_category) = update.type_category {
        active.type_category = Set(type_category.as_str().to_string());
    }
    if let Some(is_primary_key) = update.is_primary_key {
        active.is_primary_key = Set(is_primary_key);
    }
    if let Some(is_nullable) = update.is_nullable {
        active.is_nullable = Set(is_nullable);
    }
    if let Some(is_unique) = update.is_unique {
        active.is_unique = Set(is_unique);
    }
    if let Some(default_value) = &update.default_value {
        active.default_value = Set(default_value.clone());
    }
    if let Some(array_base_type) = &update.array_base_type {
        active.array_base_type = Set(array_base_type.clone());
    }
    if let Some(enum_type_id) = &update.enum_type_id {
        if let Some(enum_type_id) = enum_type_id {
            ensure_enum_in_project(conn, enum_type_id, project_id).await?;
        }
        active.enum_type_id = Set(enum_type_id.clone());
    }
    if let Some(order) = update.order {
        active.order = Set(order);
    }
    active.updated_at = Set(now);
    ColumnRecord::try_from(active.update(conn).await?)
}

async fn ensure_enum_in_project<C: ConnectionTrait>(
    conn: &C,
    enum_type_id: &str,
    project_id: &str,
) -> SchemaResult<()> {
    let enum_type = enum_types::Entity::find_by_id(enum_type_id).one(conn).await?;
    match enum_type {
        Some(enum_type) if enum_type.project_id == project_id => Ok(()),
        _ => Err(SchemaError::invalid(format!(
            "enum type {} is not part of project {}",
            enum_type_id, project_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_types::TypeCategory;

    fn column(id: &str, order: i32) -> ColumnRecord {
        let now = Utc::now();
        ColumnRecord {
            id: id.into(),
            table_id: "t1".into(),
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

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_reorder_accepts_a_permutation() {
        let current = vec![column("a", 0), column("b", 0)];
        assert!(validate_reorder("t1", &current, &ids(&["b", "a"])).is_ok());
        assert!(validate_reorder("t1", &[], &[]).is_ok());
    }

    #[test]
    fn test_reorder_rejects_foreign_duplicate_and_partial_lists() {
        let current = vec![column("a", 0), column("b", 1)];

        for request in [
            ids(&["a", "b", "x"]),
            ids(&["a", "a", "b"]),
            ids(&["b"]),
        ] {
            assert!(matches!(
                validate_reorder("t1", &current, &request),
                Err(SchemaError::InvalidArgument(_))
            ));
        }
    }
}
