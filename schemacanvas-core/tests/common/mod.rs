#![allow(dead_code)]

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use schemacanvas::auth::Actor;
use schemacanvas::config::{AccessPolicy, EngineConfig};
use schemacanvas::database::{establish_connection, migrations::Migrator};
use schemacanvas::graph_types::{
    ColumnRecord, NewColumn, NewRelationship, ProjectRecord, RelationType, RelationshipRecord,
    TableRecord, TypeCategory,
};
use schemacanvas::AppContext;
use schemacanvas_test_utils::{TempDir, TestDb};

pub const OWNER: &str = "alice";
pub const STRANGER: &str = "mallory";

pub fn owner() -> Actor {
    Actor::user(OWNER)
}

pub fn stranger() -> Actor {
    Actor::user(STRANGER)
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        database_url: "sqlite::memory:".to_string(),
        store_retries: 50,
        retry_backoff_ms: 5,
        ..EngineConfig::default()
    }
}

pub async fn migrated_db(test_db: &TestDb) -> DatabaseConnection {
    let db = test_db.connect().await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn setup() -> AppContext {
    setup_with(test_config()).await
}

pub async fn setup_with(config: EngineConfig) -> AppContext {
    let db = migrated_db(&TestDb::new_in_memory()).await;
    AppContext::new(db, config)
}

pub async fn setup_with_policy(policy: AccessPolicy) -> AppContext {
    setup_with(EngineConfig {
        access_policy: policy,
        ..test_config()
    })
    .await
}

/// File-backed store with a real connection pool; the directory must outlive the context
pub async fn setup_file_backed() -> (TempDir, AppContext) {
    let dir = TempDir::new().unwrap();
    let test_db = TestDb::new_file(dir.path(), "schemacanvas.db");
    let db = establish_connection(test_db.url()).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let context = AppContext::new(db, test_config());
    (dir, context)
}

pub async fn create_project(ctx: &AppContext, name: &str) -> ProjectRecord {
    ctx.projects().create_project(&owner(), name).await.unwrap()
}

pub async fn create_table(ctx: &AppContext, project_id: &str, name: &str) -> TableRecord {
    ctx.tables()
        .create_table(&owner(), project_id, name, 0.0, 0.0)
        .await
        .unwrap()
}

pub async fn create_column(
    ctx: &AppContext,
    table_id: &str,
    name: &str,
    order: i32,
) -> ColumnRecord {
    ctx.columns()
        .create_column(
            &owner(),
            &NewColumn::new(table_id, name, "uuid", TypeCategory::Uuid, order),
        )
        .await
        .unwrap()
}

pub async fn link_columns(
    ctx: &AppContext,
    project_id: &str,
    source: &ColumnRecord,
    target: &ColumnRecord,
) -> RelationshipRecord {
    ctx.relationships()
        .create_relationship(
            &owner(),
            &NewRelationship {
                project_id: project_id.to_string(),
                source_table_id: source.table_id.clone(),
                source_column_id: source.id.clone(),
                target_table_id: target.table_id.clone(),
                target_column_id: target.id.clone(),
                relation_type: RelationType::OneToMany,
                junction_table_id: None,
            },
        )
        .await
        .unwrap()
}

pub fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
    items.iter().map(|item| id(item).to_string()).collect()
}
