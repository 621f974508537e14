use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};

use crate::auth::Actor;
use crate::common::{new_id, with_retry, RetryPolicy};
use crate::database::entities::undo_cursors;
use crate::database::entities::undo_entries::{self, Entity as UndoEntries};
use crate::errors::{SchemaError, SchemaResult};
use crate::graph_patch::GraphPatch;
use crate::graph_types::UndoEntryRecord;
use crate::services::authorization::{AuthorizationService, Capability};
use crate::services::graph_patch_applicator::GraphPatchApplicator;

/// Per-(project, user) undo/redo ledger
///
/// Entries are append-only. A cursor row holds the position of the last
/// applied entry; undo and redo move it and apply the stored patch.
pub struct UndoService {
    db: DatabaseConnection,
    auth: AuthorizationService,
    retry: RetryPolicy,
}

impl UndoService {
    pub fn new(db: DatabaseConnection, auth: AuthorizationService, retry: RetryPolicy) -> Self {
        Self { db, auth, retry }
    }

    /// Append an entry inside the caller's transaction
    ///
    /// The position is `max + 1` over the whole stack (0 for the first entry),
    /// guarded by the unique (project, user, position) index. Entries above the
    /// current head are superseded and the head moves to the new entry.
    pub async fn record<C: ConnectionTrait>(
        conn: &C,
        project_id: &str,
        user_id: &str,
        action_type: &str,
        before: &GraphPatch,
        after: &GraphPatch,
    ) -> SchemaResult<UndoEntryRecord> {
        let last = UndoEntries::find()
            .filter(undo_entries::Column::ProjectId.eq(project_id))
            .filter(undo_entries::Column::UserId.eq(user_id))
            .order_by_desc(undo_entries::Column::Position)
            .one(conn)
            .await?;
        let position = last.map(|e| e.position + 1).unwrap_or(0);

        let cursor = find_cursor(conn, project_id, user_id).await?;
        let head = cursor.as_ref().and_then(|c| c.head_position);

        let mut abandoned = UndoEntries::update_many()
            .col_expr(undo_entries::Column::Superseded, Expr::value(true))
            .filter(undo_entries::Column::ProjectId.eq(project_id))
            .filter(undo_entries::Column::UserId.eq(user_id))
            .filter(undo_entries::Column::Superseded.eq(false));
        if let Some(head) = head {
            abandoned = abandoned.filter(undo_entries::Column::Position.gt(head));
        }
        let superseded = abandoned.exec(conn).await?.rows_affected;
        if superseded > 0 {
            debug!(
                "Superseded {} undone entries for user {} on project {}",
                superseded, user_id, project_id
            );
        }

        let now = Utc::now();
        let entry = undo_entries::ActiveModel {
            id: Set(new_id()),
            project_id: Set(project_id.to_string()),
            user_id: Set(user_id.to_string()),
            action_type: Set(action_type.to_string()),
            before_state: Set(before.to_json()?),
            after_state: Set(after.to_json()?),
            position: Set(position),
            superseded: Set(false),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        save_cursor(conn, cursor, project_id, user_id, Some(position)).await?;

        debug!(
            "Recorded {} at position {} for user {} on project {}",
            action_type, position, user_id, project_id
        );
        UndoEntryRecord::try_from(entry)
    }

    /// Push an entry for the acting user without applying anything
    pub async fn push(
        &self,
        actor: &Actor,
        project_id: &str,
        action_type: &str,
        before: &GraphPatch,
        after: &GraphPatch,
    ) -> SchemaResult<UndoEntryRecord> {
        with_retry(&self.retry, "push undo entry", move || {
            self.push_once(actor, project_id, action_type, before, after)
        })
        .await
    }

    async fn push_once(
        &self,
        actor: &Actor,
        project_id: &str,
        action_type: &str,
        before: &GraphPatch,
        after: &GraphPatch,
    ) -> SchemaResult<UndoEntryRecord> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, project_id, Capability::Write)
            .await?;

        let entry = Self::record(
            &txn,
            project_id,
            &authorized.user_id,
            action_type,
            before,
            after,
        )
        .await?;
        txn.commit().await?;
        Ok(entry)
    }

    /// Apply the head entry's before-state; `None` when nothing is left to undo
    pub async fn undo(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Option<UndoEntryRecord>> {
        with_retry(&self.retry, "undo", move || self.undo_once(actor, project_id)).await
    }

    async fn undo_once(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Option<UndoEntryRecord>> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, project_id, Capability::Write)
            .await?;
        let user_id = authorized.user_id.as_str();

        let cursor = find_cursor(&txn, project_id, user_id).await?;
        let Some(head) = cursor.as_ref().and_then(|c| c.head_position) else {
            debug!("Nothing to undo for user {} on project {}", user_id, project_id);
            return Ok(None);
        };

        let entry = UndoEntries::find()
            .filter(undo_entries::Column::ProjectId.eq(project_id))
            .filter(undo_entries::Column::UserId.eq(user_id))
            .filter(undo_entries::Column::Position.eq(head))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                SchemaError::corrupt_record(format!("undo cursor points at missing position {}", head))
            })?;
        let entry = UndoEntryRecord::try_from(entry)?;

        GraphPatchApplicator::new(&txn, project_id, Utc::now())
            .apply(&entry.before_state)
            .await?;

        let previous = UndoEntries::find()
            .filter(undo_entries::Column::ProjectId.eq(project_id))
            .filter(undo_entries::Column::UserId.eq(user_id))
            .filter(undo_entries::Column::Superseded.eq(false))
            .filter(undo_entries::Column::Position.lt(head))
            .order_by_desc(undo_entries::Column::Position)
            .one(&txn)
            .await?
            .map(|e| e.position);

        save_cursor(&txn, cursor, project_id, user_id, previous).await?;
        txn.commit().await?;

        info!(
            "Undid {} (position {}) for user {} on project {}",
            entry.action_type, entry.position, user_id, project_id
        );
        Ok(Some(entry))
    }

    /// Re-apply the next undone entry's after-state; `None` when nothing is left to redo
    pub async fn redo(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Option<UndoEntryRecord>> {
        with_retry(&self.retry, "redo", move || self.redo_once(actor, project_id)).await
    }

    async fn redo_once(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Option<UndoEntryRecord>> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, project_id, Capability::Write)
            .await?;
        let user_id = authorized.user_id.as_str();

        let cursor = find_cursor(&txn, project_id, user_id).await?;
        let head = cursor.as_ref().and_then(|c| c.head_position);

        let mut next = UndoEntries::find()
            .filter(undo_entries::Column::ProjectId.eq(project_id))
            .filter(undo_entries::Column::UserId.eq(user_id))
            .filter(undo_entries::Column::Superseded.eq(false));
        if let Some(head) = head {
            next = next.filter(undo_entries::Column::Position.gt(head));
        }
        let Some(entry) = next
            .order_by_asc(undo_entries::Column::Position)
            .one(&txn)
            .await?
        else {
            debug!("Nothing to redo for user {} on project {}", user_id, project_id);
            return Ok(None);
        };
        let entry = UndoEntryRecord::try_from(entry)?;

        GraphPatchApplicator::new(&txn, project_id, Utc::now())
            .apply(&entry.after_state)
            .await?;

        save_cursor(&txn, cursor, project_id, user_id, Some(entry.position)).await?;
        txn.commit().await?;

        info!(
            "Redid {} (position {}) for user {} on project {}",
            entry.action_type, entry.position, user_id, project_id
        );
        Ok(Some(entry))
    }

    /// The acting user's stack, including superseded entries, by position
    pub async fn history(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Vec<UndoEntryRecord>> {
        let Some(authorized) = self.auth.authorize_read(&self.db, actor, project_id).await? else {
            return Ok(Vec::new());
        };

        UndoEntries::find()
            .filter(undo_entries::Column::ProjectId.eq(project_id))
            .filter(undo_entries::Column::UserId.eq(authorized.user_id.as_str()))
            .order_by_asc(undo_entries::Column::Position)
            .all(&self.db)
            .await?
            .into_iter()
            .map(UndoEntryRecord::try_from)
            .collect()
    }

    /// Position of the last applied entry, if any
    pub async fn head_position(&self, actor: &Actor, project_id: &str) -> SchemaResult<Option<i32>> {
        let Some(authorized) = self.auth.authorize_read(&self.db, actor, project_id).await? else {
            return Ok(None);
        };
        Ok(find_cursor(&self.db, project_id, &authorized.user_id)
            .await?
            .and_then(|c| c.head_position))
    }
}

async fn find_cursor<C: ConnectionTrait>(
    conn: &C,
    project_id: &str,
    user_id: &str,
) -> SchemaResult<Option<undo_cursors::Model>> {
    Ok(
        undo_cursors::Entity::find_by_id((project_id.to_string(), user_id.to_string()))
            .one(conn)
            .await?,
    )
}

async fn save_cursor<C: ConnectionTrait>(
    conn: &C,
    existing: Option<undo_cursors::Model>,
    project_id: &str,
    user_id: &str,
    head_position: Option<i32>,
) -> SchemaResult<()> {
    let now = Utc::now();
    match existing {
        Some(cursor) => {
            let mut active: undo_cursors::ActiveModel = cursor.into();
            active.head_position = Set(head_position);
            active.updated_at = Set(now);
            active.update(conn).await?;
        }
        None => {
            undo_cursors::ActiveModel {
                project_id: Set(project_id.to_string()),
                user_id: Set(user_id.to_string()),
                head_position: Set(head_position),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}
