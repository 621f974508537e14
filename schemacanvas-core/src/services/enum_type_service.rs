use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::{info, warn};

use crate::auth::Actor;
use crate::common::{clean_name, new_id, with_retry, RetryPolicy};
use crate::database::entities::{columns, enum_types};
use crate::errors::{ConflictReason, SchemaError, SchemaResult};
use crate::graph_patch::{EntityChange, EntityRef, GraphChanges, GraphPatch};
use crate::graph_types::{EnumTypeRecord, EnumTypeUpdate, GraphEntities};
use crate::services::authorization::{AuthorizationService, Capability};
use crate::services::undo_service::UndoService;

pub struct EnumTypeService {
    db: DatabaseConnection,
    auth: AuthorizationService,
    retry: RetryPolicy,
}

impl EnumTypeService {
    pub fn new(db: DatabaseConnection, auth: AuthorizationService, retry: RetryPolicy) -> Self {
        Self { db, auth, retry }
    }

    pub async fn create_enum_type(
        &self,
        actor: &Actor,
        project_id: &str,
        name: &str,
        values: &[String],
    ) -> SchemaResult<EnumTypeRecord> {
        with_retry(&self.retry, "create enum type", move || {
            self.create_enum_type_once(actor, project_id, name, values)
        })
        .await
    }

    async fn create_enum_type_once(
        &self,
        actor: &Actor,
        project_id: &str,
        name: &str,
        values: &[String],
    ) -> SchemaResult<EnumTypeRecord> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, project_id, Capability::Write)
            .await?;
        let name = clean_name("enum type", name)?;
        validate_enum_values(values)?;
        ensure_unique_name(&txn, project_id, &name, None).await?;

        let now = Utc::now();
        let enum_type = EnumTypeRecord {
            id: new_id(),
            project_id: project_id.to_string(),
            name,
            values: values.to_vec(),
            created_at: now,
            updated_at: now,
        };
        enum_type.to_active_model().insert(&txn).await?;

        UndoService::record(
            &txn,
            project_id,
            &authorized.user_id,
            "enumType.create",
            &GraphPatch::removing(vec![EntityRef::EnumType(enum_type.id.clone())]),
            &GraphPatch::upserting(GraphEntities {
                enum_types: vec![enum_type.clone()],
                ..Default::default()
            }),
        )
        .await?;
        txn.commit().await?;

        info!(
            "Created enum type {} ({}) in project {}",
            enum_type.name, enum_type.id, project_id
        );
        Ok(enum_type)
    }

    pub async fn update_enum_type(
        &self,
        actor: &Actor,
        id: &str,
        update: &EnumTypeUpdate,
    ) -> SchemaResult<EnumTypeRecord> {
        with_retry(&self.retry, "update enum type", move || {
            self.update_enum_type_once(actor, id, update)
        })
        .await
    }

    async fn update_enum_type_once(
        &self,
        actor: &Actor,
        id: &str,
        update: &EnumTypeUpdate,
    ) -> SchemaResult<EnumTypeRecord> {
        let txn = self.db.begin().await?;
        let (existing, authorized) = self
            .auth
            .authorize_enum_type(&txn, actor, id, Capability::Write)
            .await?;
        let before = EnumTypeRecord::try_from(existing)?;
        let after = apply_enum_type_update(&txn, &before, update, Utc::now()).await?;

        let changes = |enum_type: &EnumTypeRecord| {
            GraphPatch::changing(GraphChanges {
                enum_types: vec![EntityChange::new(id, update.values_of(enum_type))],
                ..Default::default()
            })
        };
        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "enumType.update",
            &changes(&before),
            &changes(&after),
        )
        .await?;
        txn.commit().await?;

        info!("Updated enum type {}", id);
        Ok(after)
    }

    /// Rejected while any column still uses the enum type
    pub async fn delete_enum_type(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        with_retry(&self.retry, "delete enum type", move || {
            self.delete_enum_type_once(actor, id)
        })
        .await
    }

    async fn delete_enum_type_once(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        let txn = self.db.begin().await?;
        let (existing, authorized) = self
            .auth
            .authorize_enum_type(&txn, actor, id, Capability::Write)
            .await?;

        let uses = columns::Entity::find()
            .filter(columns::Column::EnumTypeId.eq(id))
            .count(&txn)
            .await?;
        if uses > 0 {
            warn!("Refusing to delete enum type {}: used by {} columns", id, uses);
            return Err(SchemaError::Conflict(ConflictReason::EnumInUse));
        }

        let removed = EnumTypeRecord::try_from(existing)?;
        enum_types::Entity::delete_by_id(id).exec(&txn).await?;

        UndoService::record(
            &txn,
            authorized.project_id(),
            &authorized.user_id,
            "enumType.delete",
            &GraphPatch::upserting(GraphEntities {
                enum_types: vec![removed],
                ..Default::default()
            }),
            &GraphPatch::removing(vec![EntityRef::EnumType(id.to_string())]),
        )
        .await?;
        txn.commit().await?;

        info!("Deleted enum type {}", id);
        Ok(())
    }

    /// Sorted by name
    pub async fn list_enum_types(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Vec<EnumTypeRecord>> {
        if self
            .auth
            .authorize_read(&self.db, actor, project_id)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        enum_types::Entity::find()
            .filter(enum_types::Column::ProjectId.eq(project_id))
            .order_by_asc(enum_types::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(EnumTypeRecord::try_from)
            .collect()
    }
}

/// Values must be non-blank and distinct; their order is significant
pub fn validate_enum_values(values: &[String]) -> SchemaResult<()> {
    let mut seen = HashSet::with_capacity(values.len());
    for value in values {
        if value.trim().is_empty() {
            return Err(SchemaError::invalid("enum values cannot be empty"));
        }
        if !seen.insert(value.as_str()) {
            return Err(SchemaError::invalid(format!(
                "enum value {} appears more than once",
                value
            )));
        }
    }
    Ok(())
}

/// Write the supplied fields onto a stored enum type, keeping names unique
pub(crate) async fn apply_enum_type_update<C: ConnectionTrait>(
    conn: &C,
    current: &EnumTypeRecord,
    update: &EnumTypeUpdate,
    now: DateTime<Utc>,
) -> SchemaResult<EnumTypeRecord> {
    let mut after = current.clone();
    if let Some(name) = &update.name {
        after.name = clean_name("enum type", name)?;
        ensure_unique_name(conn, &current.project_id, &after.name, Some(&current.id)).await?;
    }
    if let Some(values) = &update.values {
        validate_enum_values(values)?;
        after.values = values.clone();
    }
    after.updated_at = now;
    after.to_active_model().update(conn).await?;
    Ok(after)
}

async fn ensure_unique_name<C: ConnectionTrait>(
    conn: &C,
    project_id: &str,
    name: &str,
    except_id: Option<&str>,
) -> SchemaResult<()> {
    let mut query = enum_types::Entity::find()
        .filter(enum_types::Column::ProjectId.eq(project_id))
        .filter(enum_types::Column::Name.eq(name));
    if let Some(id) = except_id {
        query = query.filter(enum_types::Column::Id.ne(id));
    }

    if query.count(conn).await? > 0 {
        return Err(SchemaError::Conflict(ConflictReason::DuplicateEnumName));
    }
    Ok(())
}
