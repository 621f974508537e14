use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use tracing::{debug, info};

use crate::auth::Actor;
use crate::common::{new_id, with_retry, RetryPolicy};
use crate::database::entities::{columns, relationships, tables};
use crate::errors::{SchemaError, SchemaResult};
use crate::graph_patch::{EntityChange, EntityRef, GraphChanges, GraphPatch};
use crate::graph_types::{
    GraphEntities, NewRelationship, RelationType, RelationshipRecord, RelationshipTypeUpdate,
};
use crate::services::authorization::{AuthorizationService, Capability};
use crate::services::undo_service::UndoService;

pub struct RelationshipService {
    db: DatabaseConnection,
    auth: AuthorizationService,
    retry: RetryPolicy,
}

impl RelationshipService {
    pub fn new(db: DatabaseConnection, auth: AuthorizationService, retry: RetryPolicy) -> Self {
        Self { db, auth, retry }
    }

    pub async fn create_relationship(
        &self,
        actor: &Actor,
        input: &NewRelationship,
    ) -> SchemaResult<RelationshipRecord> {
        with_retry(&self.retry, "create relationship", move || {
            self.create_relationship_once(actor, input)
        })
        .await
    }

    async fn create_relationship_once(
        &self,
        actor: &Actor,
        input: &NewRelationship,
    ) -> SchemaResult<RelationshipRecord> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, &input.project_id, Capability::Write)
            .await?;

        let relationship = RelationshipRecord {
            id: new_id(),
            project_id: input.project_id.clone(),
            source_table_id: input.source_table_id.clone(),
            source_column_id: input.source_column_id.clone(),
            target_table_id: input.target_table_id.clone(),
            target_column_id: input.target_column_id.clone(),
            relation_type: input.relation_type,
            junction_table_id: input.junction_table_id.clone(),
            created_at: Utc::now(),
        };
        validate_relationship(&txn, &relationship).await?;
        relationship.to_active_model().insert(&txn).await?;

        UndoService::record(
            &txn,
            &input.project_id,
            &authorized.user_id,
            "relationship.create",
            &GraphPatch::removing(vec![EntityRef::Relationship(relationship.id.clone())]),
            &GraphPatch::upserting(GraphEntities {
                relationships: vec![relationship.clone()],
                ..Default::default()
            }),
        )
        .await?;
        txn.commit().await?;

        info!(
            "Created {} relationship {} from column {} to column {}",
            relationship.relation_type,
            relationship.id,
            relationship.source_column_id,
            relationship.target_column_id
        );
        Ok(relationship)
    }

    /// Change the cardinality; the junction rule applies to the new type
    pub async fn update_relationship_type(
        &self,
        actor: &Actor,
        id: &str,
        relation_type: RelationType,
        junction_table_id: Option<&str>,
    ) -> SchemaResult<RelationshipRecord> {
        with_retry(&self.retry, "update relationship", move || {
            self.update_relationship_type_once(actor, id, relation_type, junction_table_id)
        })
        .await
    }

    async fn update_relationship_type_once(
        &self,
        actor: &Actor,
        id: &str,
        relation_type: RelationType,
        junction_table_id: Option<&str>,
    ) -> SchemaResult<RelationshipRecord> {
        let txn = self.db.begin().await?;
        let (existing, authorized) = self
            .auth
            .authorize_relationship(&txn, actor, id, Capability::Write)
            .await?;
        let before = RelationshipRecord::try_from(existing)?;
        let after = apply_relationship_type_update(
            &txn,
            &before,
            &RelationshipTypeUpdate {
                relation_type,
                junction_table_id: junction_table_id.map(str::to_string),
            },
        )
        .await?;

        let changes = |relationship: &RelationshipRecord| {
            GraphPatch::changing(GraphChanges {
                relationships: vec![EntityChange::new(
                    id,
                    RelationshipTypeUpdate::from(relationship),
                )],
                ..Default::default()
            })
        };
        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "relationship.update",
            &changes(&before),
            &changes(&after),
        )
        .await?;
        txn.commit().await?;

        info!("Relationship {} is now {}", id, after.relation_type);
        Ok(after)
    }

    pub async fn delete_relationship(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        with_retry(&self.retry, "delete relationship", move || {
            self.delete_relationship_once(actor, id)
        })
        .await
    }

    async fn delete_relationship_once(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        let txn = self.db.begin().await?;
        let (existing, authorized) = self
            .auth
            .authorize_relationship(&txn, actor, id, Capability::Write)
            .await?;
        let removed = RelationshipRecord::try_from(existing)?;

        relationships::Entity::delete_by_id(id).exec(&txn).await?;

        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "relationship.delete",
            &GraphPatch::upserting(GraphEntities {
                relationships: vec![removed],
                ..Default::default()
            }),
            &GraphPatch::removing(vec![EntityRef::Relationship(id.to_string())]),
        )
        .await?;
        txn.commit().await?;

        info!("Deleted relationship {}", id);
        Ok(())
    }

    pub async fn list_relationships(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Vec<RelationshipRecord>> {
        if self
            .auth
            .authorize_read(&self.db, actor, project_id)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        relationships::Entity::find()
            .filter(relationships::Column::ProjectId.eq(project_id))
            .order_by_asc(relationships::Column::CreatedAt)
            .order_by_asc(relationships::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(RelationshipRecord::try_from)
            .collect()
    }
}

/// Change cardinality and junction table together, under the junction rule
pub(crate) async fn apply_relationship_type_update<C: ConnectionTrait>(
    conn: &C,
    current: &RelationshipRecord,
    update: &RelationshipTypeUpdate,
) -> SchemaResult<RelationshipRecord> {
    let after = RelationshipRecord {
        relation_type: update.relation_type,
        junction_table_id: update.junction_table_id.clone(),
        ..current.clone()
    };
    validate_relationship(conn, &after).await?;
    after.to_active_model().update(conn).await?;
    Ok(after)
}

/// Check a relationship against the live graph
///
/// The junction rule is checked first, then that each column exists and
/// belongs to the stated table, then that every table is in the
/// relationship's project.
pub(crate) async fn validate_relationship<C: ConnectionTrait>(
    conn: &C,
    relationship: &RelationshipRecord,
) -> SchemaResult<()> {
    match (
        relationship.relation_type.requires_junction(),
        &relationship.junction_table_id,
    ) {
        (true, None) => {
            return Err(SchemaError::invalid(
                "many-to-many relationship requires a junction table",
            ))
        }
        (false, Some(_)) => {
            return Err(SchemaError::invalid(format!(
                "{} relationship cannot have a junction table",
                relationship.relation_type
            )))
        }
        _ => {}
    }

    validate_endpoint(
        conn,
        &relationship.project_id,
        &relationship.source_table_id,
        &relationship.source_column_id,
    )
    .await?;
    validate_endpoint(
        conn,
        &relationship.project_id,
        &relationship.target_table_id,
        &relationship.target_column_id,
    )
    .await?;

    if let Some(junction_table_id) = &relationship.junction_table_id {
        let junction = tables::Entity::find_by_id(junction_table_id.as_str())
            .one(conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("table", junction_table_id.as_str()))?;
        if junction.project_id != relationship.project_id {
            return Err(SchemaError::invalid(format!(
                "junction table {} is not part of project {}",
                junction_table_id, relationship.project_id
            )));
        }
    }

    debug!("Relationship {} passed validation", relationship.id);
    Ok(())
}

async fn validate_endpoint<C: ConnectionTrait>(
    conn: &C,
    project_id: &str,
    table_id: &str,
    column_id: &str,
) -> SchemaResult<()> {
    let column = columns::Entity::find_by_id(column_id)
        .one(conn)
        .await?
        .ok_or_else(|| SchemaError::not_found("column", column_id))?;
    if column.table_id != table_id {
        return Err(SchemaError::invalid(format!(
            "column {} does not belong to table {}",
            column_id, table_id
        )));
    }

    let table = tables::Entity::find_by_id(table_id)
        .one(conn)
        .await?
        .ok_or_else(|| SchemaError::not_found("table", table_id))?;
    if table.project_id != project_id {
        return Err(SchemaError::invalid(format!(
            "table {} is not part of project {}",
            table_id, project_id
        )));
    }
    Ok(())
}
