use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::EngineConfig;
use crate::services::{
    AuthorizationService, ColumnService, EnumTypeService, ProjectService, RelationshipService,
    SnapshotService, TableService, UndoService,
};

/// Shared context exposing the schema graph services to callers
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    config: EngineConfig,
    project_service: Arc<ProjectService>,
    table_service: Arc<TableService>,
    column_service: Arc<ColumnService>,
    relationship_service: Arc<RelationshipService>,
    enum_type_service: Arc<EnumTypeService>,
    snapshot_service: Arc<SnapshotService>,
    undo_service: Arc<UndoService>,
}

impl AppContext {
    pub fn new(db: DatabaseConnection, config: EngineConfig) -> Self {
        let auth = AuthorizationService::new(config.access_policy);
        let retry = config.retry_policy();

        let project_service = Arc::new(ProjectService::new(db.clone(), auth.clone(), retry));
        let table_service = Arc::new(TableService::new(db.clone(), auth.clone(), retry));
        let column_service = Arc::new(ColumnService::new(db.clone(), auth.clone(), retry));
        let relationship_service =
            Arc::new(RelationshipService::new(db.clone(), auth.clone(), retry));
        let enum_type_service = Arc::new(EnumTypeService::new(db.clone(), auth.clone(), retry));
        let snapshot_service = Arc::new(SnapshotService::new(
            db.clone(),
            auth.clone(),
            retry,
            config.max_snapshot_bytes,
        ));
        let undo_service = Arc::new(UndoService::new(db.clone(), auth, retry));

        Self {
            db,
            config,
            project_service,
            table_service,
            column_service,
            relationship_service,
            enum_type_service,
            snapshot_service,
            undo_service,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn projects(&self) -> Arc<ProjectService> {
        self.project_service.clone()
    }

    pub fn tables(&self) -> Arc<TableService> {
        self.table_service.clone()
    }

    pub fn columns(&self) -> Arc<ColumnService> {
        self.column_service.clone()
    }

    pub fn relationships(&self) -> Arc<RelationshipService> {
        self.relationship_service.clone()
    }

    pub fn enum_types(&self) -> Arc<EnumTypeService> {
        self.enum_type_service.clone()
    }

    pub fn snapshots(&self) -> Arc<SnapshotService> {
        self.snapshot_service.clone()
    }

    pub fn undo(&self) -> Arc<UndoService> {
        self.undo_service.clone()
    }
}
