use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use tracing::{debug, warn};

use crate::database::entities::{columns, enum_types, relationships, tables};
use crate::errors::{ConflictReason, SchemaError, SchemaResult};
use crate::graph_patch::{EntityChange, EntityRef, GraphPatch};
use crate::graph_types::{
    ColumnRecord, ColumnUpdate, EnumTypeRecord, EnumTypeUpdate, RelationshipRecord,
    RelationshipTypeUpdate, TableRecord, TableUpdate,
};
use crate::services::column_service::apply_column_update;
use crate::services::enum_type_service::{apply_enum_type_update, validate_enum_values};
use crate::services::relationship_service::{
    apply_relationship_type_update, validate_relationship,
};
use crate::services::table_service::apply_table_update;

/// Counts of what a patch changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub upserted: usize,
    pub removed: usize,
    /// Field-level changes of existing entities
    pub changed: usize,
    /// Removals of entities that were already gone
    pub skipped: usize,
}

/// Applies graph patches to the live entities of one project
///
/// Removals run first (relationships, columns, tables, enum types), then
/// upserts (tables, enum types, columns, relationships), then field changes in
/// the same entity order. A change to an entity that no longer exists is a
/// `MissingReference` conflict, never a re-insert. Every step is checked
/// against the current state on the caller's connection; the first violation
/// aborts, and the caller's transaction discards the earlier steps.
pub struct GraphPatchApplicator<'a, C> {
    conn: &'a C,
    project_id: &'a str,
    now: DateTime<Utc>,
}

impl<'a, C: ConnectionTrait> GraphPatchApplicator<'a, C> {
    pub fn new(conn: &'a C, project_id: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            conn,
            project_id,
            now,
        }
    }

    pub async fn apply(&self, patch: &GraphPatch) -> SchemaResult<ApplySummary> {
        let mut summary = ApplySummary::default();

        for reference in patch
            .remove
            .iter()
            .filter(|r| matches!(r, EntityRef::Relationship(_)))
        {
            self.count_removal(&mut summary, self.remove_relationship(reference.id()).await?);
        }
        for reference in patch
            .remove
            .iter()
            .filter(|r| matches!(r, EntityRef::Column(_)))
        {
            self.count_removal(&mut summary, self.remove_column(reference.id()).await?);
        }
        for reference in patch
            .remove
            .iter()
            .filter(|r| matches!(r, EntityRef::Table(_)))
        {
            self.count_removal(&mut summary, self.remove_table(reference.id()).await?);
        }
        for reference in patch
            .remove
            .iter()
            .filter(|r| matches!(r, EntityRef::EnumType(_)))
        {
            self.count_removal(&mut summary, self.remove_enum_type(reference.id()).await?);
        }

        for table in &patch.upsert.tables {
            self.upsert_table(table).await?;
            summary.upserted += 1;
        }
        for enum_type in &patch.upsert.enum_types {
            self.upsert_enum_type(enum_type).await?;
            summary.upserted += 1;
        }
        for column in &patch.upsert.columns {
            self.upsert_column(column).await?;
            summary.upserted += 1;
        }
        for relationship in &patch.upsert.relationships {
            self.upsert_relationship(relationship).await?;
            summary.upserted += 1;
        }

        for change in &patch.change.tables {
            self.change_table(change).await?;
            summary.changed += 1;
        }
        for change in &patch.change.enum_types {
            self.change_enum_type(change).await?;
            summary.changed += 1;
        }
        for change in &patch.change.columns {
            self.change_column(change).await?;
            summary.changed += 1;
        }
        for change in &patch.change.relationships {
            self.change_relationship(change).await?;
            summary.changed += 1;
        }

        debug!(
            "Applied patch to project {}: {} upserted, {} changed, {} removed, {} skipped",
            self.project_id, summary.upserted, summary.changed, summary.removed, summary.skipped
        );
        Ok(summary)
    }

    fn count_removal(&self, summary: &mut ApplySummary, removed: bool) {
        if removed {
            summary.removed += 1;
        } else {
            summary.skipped += 1;
        }
    }

    fn ensure_project(&self, entity: &str, id: &str, project_id: &str) -> SchemaResult<()> {
        if project_id != self.project_id {
            return Err(SchemaError::invalid(format!(
                "{} {} belongs to project {}, not {}",
                entity, id, project_id, self.project_id
            )));
        }
        Ok(())
    }

    async fn remove_relationship(&self, id: &str) -> SchemaResult<bool> {
        let Some(relationship) = relationships::Entity::find_by_id(id).one(self.conn).await? else {
            return Ok(false);
        };
        self.ensure_project("relationship", id, &relationship.project_id)?;

        relationships::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(true)
    }

    async fn remove_column(&self, id: &str) -> SchemaResult<bool> {
        let Some(column) = columns::Entity::find_by_id(id).one(self.conn).await? else {
            return Ok(false);
        };
        let table = tables::Entity::find_by_id(column.table_id.as_str())
            .one(self.conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("table", column.table_id.as_str()))?;
        self.ensure_project("column", id, &table.project_id)?;

        if let Some(reason) = column_reference(self.conn, id).await? {
            warn!("Patch removal of column {} blocked: {}", id, reason);
            return Err(SchemaError::Conflict(reason));
        }

        columns::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(true)
    }

    async fn remove_table(&self, id: &str) -> SchemaResult<bool> {
        let Some(table) = tables::Entity::find_by_id(id).one(self.conn).await? else {
            return Ok(false);
        };
        self.ensure_project("table", id, &table.project_id)?;

        let remaining_columns = columns::Entity::find()
            .filter(columns::Column::TableId.eq(id))
            .count(self.conn)
            .await?;
        if remaining_columns > 0 {
            return Err(SchemaError::Conflict(ConflictReason::TableHasColumns));
        }

        let junction_uses = relationships::Entity::find()
            .filter(relationships::Column::JunctionTableId.eq(id))
            .count(self.conn)
            .await?;
        if junction_uses > 0 {
            return Err(SchemaError::Conflict(ConflictReason::RelationshipJunction));
        }

        tables::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(true)
    }

    async fn remove_enum_type(&self, id: &str) -> SchemaResult<bool> {
        let Some(enum_type) = enum_types::Entity::find_by_id(id).one(self.conn).await? else {
            return Ok(false);
        };
        self.ensure_project("enum type", id, &enum_type.project_id)?;

        let uses = columns::Entity::find()
            .filter(columns::Column::EnumTypeId.eq(id))
            .count(self.conn)
            .await?;
        if uses > 0 {
            return Err(SchemaError::Conflict(ConflictReason::EnumInUse));
        }

        enum_types::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(true)
    }

    async fn upsert_table(&self, table: &TableRecord) -> SchemaResult<()> {
        self.ensure_project("table", &table.id, &table.project_id)?;

        let existing = tables::Entity::find_by_id(table.id.as_str())
            .one(self.conn)
            .await?;
        if let Some(existing) = &existing {
            self.ensure_project("table", &existing.id, &existing.project_id)?;
        }

        let mut active = table.to_active_model();
        active.updated_at = sea_orm::Set(self.now);
        if existing.is_some() {
            active.update(self.conn).await?;
        } else {
            active.insert(self.conn).await?;
        }
        Ok(())
    }

    async fn upsert_enum_type(&self, enum_type: &EnumTypeRecord) -> SchemaResult<()> {
        self.ensure_project("enum type", &enum_type.id, &enum_type.project_id)?;
        validate_enum_values(&enum_type.values)?;

        let existing = enum_types::Entity::find_by_id(enum_type.id.as_str())
            .one(self.conn)
            .await?;
        if let Some(existing) = &existing {
            self.ensure_project("enum type", &existing.id, &existing.project_id)?;
        }

        let clash = enum_types::Entity::find()
            .filter(enum_types::Column::ProjectId.eq(self.project_id))
            .filter(enum_types::Column::Name.eq(enum_type.name.as_str()))
            .filter(enum_types::Column::Id.ne(enum_type.id.as_str()))
            .count(self.conn)
            .await?;
        if clash > 0 {
            return Err(SchemaError::Conflict(ConflictReason::DuplicateEnumName));
        }

        let mut active = enum_type.to_active_model();
        active.updated_at = sea_orm::Set(self.now);
        if existing.is_some() {
            active.update(self.conn).await?;
        } else {
            active.insert(self.conn).await?;
        }
        Ok(())
    }

    async fn upsert_column(&self, column: &ColumnRecord) -> SchemaResult<()> {
        let table = tables::Entity::find_by_id(column.table_id.as_str())
            .one(self.conn)
            .await?
            .ok_or(SchemaError::Conflict(ConflictReason::MissingReference))?;
        self.ensure_project("column", &column.id, &table.project_id)?;

        let existing = columns::Entity::find_by_id(column.id.as_str())
            .one(self.conn)
            .await?;
        if let Some(existing) = &existing {
            if existing.table_id != column.table_id {
                let previous_table = tables::Entity::find_by_id(existing.table_id.as_str())
                    .one(self.conn)
                    .await?
                    .ok_or_else(|| SchemaError::not_found("table", existing.table_id.as_str()))?;
                self.ensure_project("column", &existing.id, &previous_table.project_id)?;
            }
        }

        if let Some(enum_type_id) = &column.enum_type_id {
            let enum_type = enum_types::Entity::find_by_id(enum_type_id.as_str())
                .one(self.conn)
                .await?
                .ok_or(SchemaError::Conflict(ConflictReason::MissingReference))?;
            self.ensure_project("enum type", &enum_type.id, &enum_type.project_id)?;
        }

        let mut active = column.to_active_model();
        active.updated_at = sea_orm::Set(self.now);
        if existing.is_some() {
            active.update(self.conn).await?;
        } else {
            active.insert(self.conn).await?;
        }
        Ok(())
    }

    async fn upsert_relationship(&self, relationship: &RelationshipRecord) -> SchemaResult<()> {
        self.ensure_project("relationship", &relationship.id, &relationship.project_id)?;

        let existing = relationships::Entity::find_by_id(relationship.id.as_str())
            .one(self.conn)
            .await?;
        if let Some(existing) = &existing {
            self.ensure_project("relationship", &existing.id, &existing.project_id)?;
        }

        validate_relationship(self.conn, relationship)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    SchemaError::Conflict(ConflictReason::MissingReference)
                } else {
                    err
                }
            })?;

        let active = relationship.to_active_model();
        if existing.is_some() {
            active.update(self.conn).await?;
        } else {
            active.insert(self.conn).await?;
        }
        Ok(())
    }

    async fn change_table(&self, change: &EntityChange<TableUpdate>) -> SchemaResult<()> {
        let table = tables::Entity::find_by_id(change.id.as_str())
            .one(self.conn)
            .await?
            .ok_or_else(|| self.gone("table", &change.id))?;
        self.ensure_project("table", &table.id, &table.project_id)?;

        apply_table_update(self.conn, table, &change.fields, self.now).await?;
        Ok(())
    }

    async fn change_enum_type(&self, change: &EntityChange<EnumTypeUpdate>) -> SchemaResult<()> {
        let enum_type = enum_types::Entity::find_by_id(change.id.as_str())
            .one(self.conn)
            .await?
            .ok_or_else(|| self.gone("enum type", &change.id))?;
        self.ensure_project("enum type", &enum_type.id, &enum_type.project_id)?;

        let current = EnumTypeRecord::try_from(enum_type)?;
        apply_enum_type_update(self.conn, &current, &change.fields, self.now).await?;
        Ok(())
    }

    async fn change_column(&self, change: &EntityChange<ColumnUpdate>) -> SchemaResult<()> {
        let column = columns::Entity::find_by_id(change.id.as_str())
            .one(self.conn)
            .await?
            .ok_or_else(|| self.gone("column", &change.id))?;
        let table = tables::Entity::find_by_id(column.table_id.as_str())
            .one(self.conn)
            .await?
            .ok_or_else(|| self.gone("table", &column.table_id))?;
        self.ensure_project("column", &column.id, &table.project_id)?;

        if let Some(Some(enum_type_id)) = &change.fields.enum_type_id {
            let found = enum_types::Entity::find_by_id(enum_type_id.as_str())
                .one(self.conn)
                .await?;
            if found.is_none() {
                return Err(self.gone("enum type", enum_type_id));
            }
        }

        apply_column_update(self.conn, column, &table.project_id, &change.fields, self.now)
            .await?;
        Ok(())
    }

    async fn change_relationship(
        &self,
        change: &EntityChange<RelationshipTypeUpdate>,
    ) -> SchemaResult<()> {
        let relationship = relationships::Entity::find_by_id(change.id.as_str())
            .one(self.conn)
            .await?
            .ok_or_else(|| self.gone("relationship", &change.id))?;
        self.ensure_project("relationship", &relationship.id, &relationship.project_id)?;

        let current = RelationshipRecord::try_from(relationship)?;
        apply_relationship_type_update(self.conn, &current, &change.fields)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    SchemaError::Conflict(ConflictReason::MissingReference)
                } else {
                    err
                }
            })?;
        Ok(())
    }

    fn gone(&self, entity: &str, id: &str) -> SchemaError {
        warn!("Patch change of {} {} rejected: it no longer exists", entity, id);
        SchemaError::Conflict(ConflictReason::MissingReference)
    }
}

/// Why a column cannot be removed: target references are checked before
/// source references
pub(crate) async fn column_reference<C: ConnectionTrait>(
    conn: &C,
    column_id: &str,
) -> SchemaResult<Option<ConflictReason>> {
    let as_target = relationships::Entity::find()
        .filter(relationships::Column::TargetColumnId.eq(column_id))
        .count(conn)
        .await?;
    if as_target > 0 {
        return Ok(Some(ConflictReason::RelationshipTarget));
    }

    let as_source = relationships::Entity::find()
        .filter(relationships::Column::SourceColumnId.eq(column_id))
        .count(conn)
        .await?;
    if as_source > 0 {
        return Ok(Some(ConflictReason::RelationshipSource));
    }

    Ok(None)
}
