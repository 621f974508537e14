mod common;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Set};

use common::{
    create_column, create_project, create_table, link_columns, owner, setup, setup_with,
    test_config, OWNER,
};
use schemacanvas::config::EngineConfig;
use schemacanvas::database::entities::{projects, snapshots};
use schemacanvas::errors::SchemaError;
use schemacanvas::graph_types::{
    ColumnUpdate, GraphEntities, NewColumn, ProjectGraph, TableUpdate, TypeCategory,
};
use schemacanvas::services::SnapshotPayload;
use schemacanvas::AppContext;
use schemacanvas_test_utils::{load_golden_json, load_golden_text};

const GOLDEN_PROJECT: &str = "11111111-1111-4111-8111-111111111111";

/// Graph content without timestamps, sorted by id
fn structure(graph: &ProjectGraph) -> GraphEntities {
    let mut entities = GraphEntities {
        tables: graph.tables.iter().map(|t| t.table.clone()).collect(),
        columns: graph
            .tables
            .iter()
            .flat_map(|t| t.columns.iter().cloned())
            .collect(),
        relationships: graph.relationships.clone(),
        enum_types: graph.enum_types.clone(),
    };
    entities.sort_by_id();

    let epoch = DateTime::<Utc>::default();
    for table in &mut entities.tables {
        table.updated_at = epoch;
    }
    for column in &mut entities.columns {
        column.updated_at = epoch;
    }
    for enum_type in &mut entities.enum_types {
        enum_type.updated_at = epoch;
    }
    entities
}

async fn graph(ctx: &AppContext, project_id: &str) -> ProjectGraph {
    ctx.projects()
        .load_graph(&owner(), project_id)
        .await
        .unwrap()
        .unwrap()
}

async fn build_sample(ctx: &AppContext, project_id: &str) {
    let users = create_table(ctx, project_id, "users").await;
    let posts = create_table(ctx, project_id, "posts").await;
    let status = ctx
        .enum_types()
        .create_enum_type(
            &owner(),
            project_id,
            "user_status",
            &["active".to_string(), "banned".to_string()],
        )
        .await
        .unwrap();

    let user_id = create_column(ctx, &users.id, "id", 0).await;
    let mut input = NewColumn::new(&users.id, "status", "user_status", TypeCategory::Enum, 1);
    input.enum_type_id = Some(status.id.clone());
    ctx.columns().create_column(&owner(), &input).await.unwrap();
    let author_id = create_column(ctx, &posts.id, "author_id", 0).await;
    link_columns(ctx, project_id, &author_id, &user_id).await;
}

#[tokio::test]
async fn capture_then_restore_reproduces_the_graph() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Roundtrip").await;
    build_sample(&ctx, &project.id).await;
    let captured = graph(&ctx, &project.id).await;

    let snapshot = ctx
        .snapshots()
        .capture(&owner(), &project.id, "  before refactor ")
        .await
        .unwrap();
    assert_eq!(snapshot.description, "before refactor");
    assert_eq!(snapshot.created_by, OWNER);

    // Diverge: rename, add, and delete
    let users = &captured.tables.iter().find(|t| t.table.name == "users").unwrap().table;
    ctx.tables()
        .update_table(
            &owner(),
            &users.id,
            &TableUpdate {
                name: Some("accounts".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let extra = create_table(&ctx, &project.id, "audit_log").await;
    create_column(&ctx, &extra.id, "id", 0).await;
    let posts = &captured.tables.iter().find(|t| t.table.name == "posts").unwrap().table;
    ctx.tables().delete_table(&owner(), &posts.id).await.unwrap();

    let summary = ctx.snapshots().restore(&owner(), &snapshot.id).await.unwrap();
    assert!(summary.upserted > 0);
    assert!(summary.removed > 0);

    let restored = graph(&ctx, &project.id).await;
    assert_eq!(structure(&restored), structure(&captured));
    assert!(ctx.tables().get_table(&owner(), &extra.id).await.unwrap().is_none());

    let restored_users = restored.tables.iter().find(|t| t.table.id == users.id).unwrap();
    assert_eq!(restored_users.table.created_at, users.created_at);
    assert!(restored_users.table.updated_at >= users.updated_at);
}

#[tokio::test]
async fn restore_is_undoable() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Undo restore").await;
    build_sample(&ctx, &project.id).await;
    let snapshot = ctx
        .snapshots()
        .capture(&owner(), &project.id, "v1")
        .await
        .unwrap();

    let table = create_table(&ctx, &project.id, "later").await;
    let column = create_column(&ctx, &table.id, "id", 0).await;
    ctx.columns()
        .update_column(
            &owner(),
            &column.id,
            &ColumnUpdate {
                is_primary_key: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let diverged = graph(&ctx, &project.id).await;

    ctx.snapshots().restore(&owner(), &snapshot.id).await.unwrap();
    assert!(ctx.tables().get_table(&owner(), &table.id).await.unwrap().is_none());

    let entry = ctx.undo().undo(&owner(), &project.id).await.unwrap().unwrap();
    assert_eq!(entry.action_type, "snapshot.restore");
    assert_eq!(structure(&graph(&ctx, &project.id).await), structure(&diverged));
}

#[tokio::test]
async fn restore_of_an_empty_snapshot_clears_the_project() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Blank").await;
    let empty = ctx
        .snapshots()
        .capture(&owner(), &project.id, "empty")
        .await
        .unwrap();
    build_sample(&ctx, &project.id).await;

    ctx.snapshots().restore(&owner(), &empty.id).await.unwrap();
    let restored = graph(&ctx, &project.id).await;
    assert!(restored.tables.is_empty());
    assert!(restored.relationships.is_empty());
    assert!(restored.enum_types.is_empty());
}

#[test]
fn golden_payload_pins_the_wire_format() {
    let value: serde_json::Value = load_golden_json("snapshots/v1_minimal.json").unwrap();
    assert_eq!(value["format"], "schemacanvas/snapshot");
    assert_eq!(value["version"], 1);
    assert_eq!(value["projectId"], GOLDEN_PROJECT);
    assert_eq!(value["relationships"][0]["relationType"], "one-to-many");
    assert_eq!(value["enumTypes"][0]["name"], "user_status");

    let columns = value["columns"].as_array().unwrap();
    let status = columns.iter().find(|c| c["name"] == "status").unwrap();
    assert_eq!(status["typeCategory"], "enum");
    assert!(status["enumTypeId"].is_string());

    // Encoding the decoded payload reproduces the stored document
    let payload: SnapshotPayload = load_golden_json("snapshots/v1_minimal.json").unwrap();
    let reencoded: serde_json::Value =
        serde_json::from_str(&payload.encode().unwrap()).unwrap();
    assert_eq!(reencoded, value);
}

#[tokio::test]
async fn golden_payload_restores_into_its_project() {
    let ctx = setup().await;
    let text = load_golden_text("snapshots/v1_minimal.json").unwrap();
    let payload = SnapshotPayload::decode(&text).unwrap();
    assert_eq!(payload.project_id, GOLDEN_PROJECT);
    assert_eq!(payload.tables.len(), 2);
    assert_eq!(payload.columns.len(), 3);

    let now = Utc::now();
    projects::ActiveModel {
        id: Set(GOLDEN_PROJECT.to_string()),
        name: Set("Imported".to_string()),
        owner_id: Set(OWNER.to_string()),
        share_link: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(ctx.db())
    .await
    .unwrap();
    snapshots::ActiveModel {
        id: Set("golden-snapshot".to_string()),
        project_id: Set(GOLDEN_PROJECT.to_string()),
        description: Set("golden".to_string()),
        data: Set(text),
        created_by: Set(OWNER.to_string()),
        created_at: Set(now),
    }
    .insert(ctx.db())
    .await
    .unwrap();

    ctx.snapshots()
        .restore(&owner(), "golden-snapshot")
        .await
        .unwrap();

    let restored = graph(&ctx, GOLDEN_PROJECT).await;
    let users = restored
        .tables
        .iter()
        .find(|t| t.table.name == "users")
        .unwrap();
    let names: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "status"]);
    assert_eq!(restored.relationships.len(), 1);
    assert_eq!(restored.enum_types[0].values, vec!["active", "suspended", "deleted"]);

    // Re-encoding the live graph gives back the same entities
    let recaptured = ctx
        .snapshots()
        .capture(&owner(), GOLDEN_PROJECT, "again")
        .await
        .unwrap();
    let again = SnapshotPayload::decode(&recaptured.data).unwrap();
    assert_eq!(again.tables.len(), payload.tables.len());
    assert_eq!(again.relationships, payload.relationships);
}

#[tokio::test]
async fn corrupt_payload_leaves_the_graph_untouched() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Corrupt").await;
    build_sample(&ctx, &project.id).await;
    let before = graph(&ctx, &project.id).await;

    for (id, data) in [
        ("truncated", "{\"format\":\"schemacanvas/snapshot\",\"vers".to_string()),
        (
            "future",
            format!(
                "{{\"format\":\"schemacanvas/snapshot\",\"version\":99,\"projectId\":\"{}\"}}",
                project.id
            ),
        ),
        (
            "dangling",
            format!(
                concat!(
                    "{{\"format\":\"schemacanvas/snapshot\",\"version\":1,\"projectId\":\"{0}\",",
                    "\"tables\":[],\"columns\":[{{\"id\":\"c1\",\"tableId\":\"missing\",",
                    "\"name\":\"id\",\"dataType\":\"uuid\",\"typeCategory\":\"uuid\",",
                    "\"isPrimaryKey\":true,\"isNullable\":false,\"isUnique\":true,",
                    "\"defaultValue\":null,\"arrayBaseType\":null,\"enumTypeId\":null,",
                    "\"order\":0,\"createdAt\":\"2026-03-01T12:00:00Z\",",
                    "\"updatedAt\":\"2026-03-01T12:00:00Z\"}}],",
                    "\"relationships\":[],\"enumTypes\":[]}}"
                ),
                project.id
            ),
        ),
    ] {
        snapshots::ActiveModel {
            id: Set(id.to_string()),
            project_id: Set(project.id.clone()),
            description: Set(id.to_string()),
            data: Set(data),
            created_by: Set(OWNER.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(ctx.db())
        .await
        .unwrap();

        let result = ctx.snapshots().restore(&owner(), id).await;
        assert!(
            matches!(result, Err(SchemaError::CorruptSnapshot(_))),
            "{} gave {:?}",
            id,
            result
        );
    }

    assert_eq!(graph(&ctx, &project.id).await, before);
    assert!(ctx
        .undo()
        .history(&owner(), &project.id)
        .await
        .unwrap()
        .iter()
        .all(|e| e.action_type != "snapshot.restore"));
}

#[tokio::test]
async fn oversized_snapshots_are_rejected() {
    let ctx = setup_with(EngineConfig {
        max_snapshot_bytes: 64,
        ..test_config()
    })
    .await;
    let project = create_project(&ctx, "Large").await;
    build_sample(&ctx, &project.id).await;

    let result = ctx.snapshots().capture(&owner(), &project.id, "big").await;
    assert!(matches!(result, Err(SchemaError::InvalidArgument(_))));
    assert!(ctx
        .snapshots()
        .list_snapshots(&owner(), &project.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn snapshots_list_newest_first() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Listing").await;
    let first = ctx
        .snapshots()
        .capture(&owner(), &project.id, "first")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = ctx
        .snapshots()
        .capture(&owner(), &project.id, "second")
        .await
        .unwrap();

    let listed = ctx
        .snapshots()
        .list_snapshots(&owner(), &project.id)
        .await
        .unwrap();
    assert_eq!(
        listed.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        vec![second.id.as_str(), first.id.as_str()]
    );
    let fetched = ctx
        .snapshots()
        .get_snapshot(&owner(), &first.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, first);
}
