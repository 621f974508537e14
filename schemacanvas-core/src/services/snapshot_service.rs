use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, warn};

use crate::auth::Actor;
use crate::common::{new_id, with_retry, RetryPolicy};
use crate::database::entities::snapshots;
use crate::errors::{SchemaError, SchemaResult};
use crate::graph_patch::GraphPatch;
use crate::graph_types::SnapshotRecord;
use crate::services::authorization::{read_or_none, AuthorizationService, Capability};
use crate::services::graph_patch_applicator::{ApplySummary, GraphPatchApplicator};
use crate::services::graph_query::load_entities;
use crate::services::snapshot_codec::SnapshotPayload;
use crate::services::undo_service::UndoService;

/// Captures and restores point-in-time copies of a project's schema graph
pub struct SnapshotService {
    db: DatabaseConnection,
    auth: AuthorizationService,
    retry: RetryPolicy,
    max_snapshot_bytes: usize,
}

impl SnapshotService {
    pub fn new(
        db: DatabaseConnection,
        auth: AuthorizationService,
        retry: RetryPolicy,
        max_snapshot_bytes: usize,
    ) -> Self {
        Self {
            db,
            auth,
            retry,
            max_snapshot_bytes,
        }
    }

    pub async fn capture(
        &self,
        actor: &Actor,
        project_id: &str,
        description: &str,
    ) -> SchemaResult<SnapshotRecord> {
        with_retry(&self.retry, "capture snapshot", move || {
            self.capture_once(actor, project_id, description)
        })
        .await
    }

    async fn capture_once(
        &self,
        actor: &Actor,
        project_id: &str,
        description: &str,
    ) -> SchemaResult<SnapshotRecord> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, project_id, Capability::Write)
            .await?;

        let entities = load_entities(&txn, project_id).await?;
        let entity_count = entities.len();
        let data = SnapshotPayload::from_entities(project_id, entities).encode()?;
        if data.len() > self.max_snapshot_bytes {
            warn!(
                "Snapshot of project {} is {} bytes, limit is {}",
                project_id,
                data.len(),
                self.max_snapshot_bytes
            );
            return Err(SchemaError::invalid(format!(
                "snapshot of {} bytes exceeds the {} byte limit",
                data.len(),
                self.max_snapshot_bytes
            )));
        }

        let snapshot = snapshots::ActiveModel {
            id: Set(new_id()),
            project_id: Set(project_id.to_string()),
            description: Set(description.trim().to_string()),
            data: Set(data),
            created_by: Set(authorized.user_id.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(
            "Captured snapshot {} of project {} ({} entities)",
            snapshot.id, project_id, entity_count
        );
        Ok(SnapshotRecord::from(snapshot))
    }

    /// Replace the live graph of the snapshot's project with its payload
    ///
    /// The payload is decoded before anything is written; a corrupt payload
    /// leaves the live graph untouched. Entity ids and creation times are
    /// kept, `updated_at` becomes the restore time.
    pub async fn restore(&self, actor: &Actor, snapshot_id: &str) -> SchemaResult<ApplySummary> {
        with_retry(&self.retry, "restore snapshot", move || {
            self.restore_once(actor, snapshot_id)
        })
        .await
    }

    async fn restore_once(&self, actor: &Actor, snapshot_id: &str) -> SchemaResult<ApplySummary> {
        let txn = self.db.begin().await?;
        let (snapshot, authorized) = self
            .auth
            .authorize_snapshot(&txn, actor, snapshot_id, Capability::Write)
            .await?;

        let payload = SnapshotPayload::decode(&snapshot.data)?;
        if payload.project_id != snapshot.project_id {
            return Err(SchemaError::CorruptSnapshot(format!(
                "payload belongs to project {}, snapshot to {}",
                payload.project_id, snapshot.project_id
            )));
        }
        let restored = payload.into_entities();
        let current = load_entities(&txn, &snapshot.project_id).await?;

        let after = GraphPatch {
            upsert: restored.clone(),
            remove: current.refs(),
            ..Default::default()
        };
        let before = GraphPatch {
            upsert: current,
            remove: restored.refs(),
            ..Default::default()
        };

        let summary = GraphPatchApplicator::new(&txn, &snapshot.project_id, Utc::now())
            .apply(&after)
            .await?;

        UndoService::record(
            &txn,
            &snapshot.project_id,
            &authorized.user_id,
            "snapshot.restore",
            &before,
            &after,
        )
        .await?;
        txn.commit().await?;

        info!(
            "Restored snapshot {} into project {} ({} upserted, {} removed)",
            snapshot_id, snapshot.project_id, summary.upserted, summary.removed
        );
        Ok(summary)
    }

    /// Newest first
    pub async fn list_snapshots(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Vec<SnapshotRecord>> {
        if self
            .auth
            .authorize_read(&self.db, actor, project_id)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        Ok(snapshots::Entity::find()
            .filter(snapshots::Column::ProjectId.eq(project_id))
            .order_by_desc(snapshots::Column::CreatedAt)
            .order_by_desc(snapshots::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(SnapshotRecord::from)
            .collect())
    }

    pub async fn get_snapshot(
        &self,
        actor: &Actor,
        id: &str,
    ) -> SchemaResult<Option<SnapshotRecord>> {
        let found = read_or_none(
            self.auth
                .authorize_snapshot(&self.db, actor, id, Capability::Read)
                .await,
        )?;
        Ok(found.map(|(snapshot, _)| SnapshotRecord::from(snapshot)))
    }
}
