mod common;

use common::{
    create_column, create_project, create_table, link_columns, owner, setup, setup_file_backed,
};
use futures_util::future::join;
use schemacanvas::errors::{ConflictReason, SchemaError};
use schemacanvas::graph_types::{
    ColumnUpdate, EnumTypeUpdate, NewColumn, NewRelationship, RelationType, TypeCategory,
};

fn conflict(result: Result<(), SchemaError>) -> Option<ConflictReason> {
    result.err().and_then(|e| e.conflict_reason())
}

#[tokio::test]
async fn deleting_a_related_column_is_a_conflict() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Blog").await;
    let t1 = create_table(&ctx, &project.id, "posts").await;
    let t2 = create_table(&ctx, &project.id, "users").await;
    let a = create_column(&ctx, &t1.id, "author_id", 0).await;
    let b = create_column(&ctx, &t2.id, "id", 0).await;
    link_columns(&ctx, &project.id, &a, &b).await;

    assert_eq!(
        conflict(ctx.columns().delete_column(&owner(), &a.id).await),
        Some(ConflictReason::RelationshipSource)
    );
    assert_eq!(
        conflict(ctx.columns().delete_column(&owner(), &b.id).await),
        Some(ConflictReason::RelationshipTarget)
    );

    let err = ctx
        .columns()
        .delete_column(&owner(), &a.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Conflict: relationship-source");

    assert!(ctx.columns().get_column(&owner(), &a.id).await.unwrap().is_some());
    assert!(ctx.columns().get_column(&owner(), &b.id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_a_column_after_its_relationship_succeeds() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Blog").await;
    let t1 = create_table(&ctx, &project.id, "posts").await;
    let t2 = create_table(&ctx, &project.id, "users").await;
    let a = create_column(&ctx, &t1.id, "author_id", 0).await;
    let b = create_column(&ctx, &t2.id, "id", 0).await;
    let relationship = link_columns(&ctx, &project.id, &a, &b).await;

    ctx.relationships()
        .delete_relationship(&owner(), &relationship.id)
        .await
        .unwrap();
    ctx.columns().delete_column(&owner(), &a.id).await.unwrap();

    assert!(ctx.columns().get_column(&owner(), &a.id).await.unwrap().is_none());
    assert!(ctx
        .relationships()
        .list_relationships(&owner(), &project.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deleting_a_table_cascades_to_its_relationships() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Shop").await;
    let orders = create_table(&ctx, &project.id, "orders").await;
    let customers = create_table(&ctx, &project.id, "customers").await;
    let products = create_table(&ctx, &project.id, "products").await;

    let order_customer = create_column(&ctx, &orders.id, "customer_id", 0).await;
    let order_product = create_column(&ctx, &orders.id, "product_id", 1).await;
    let customer_id = create_column(&ctx, &customers.id, "id", 0).await;
    let product_id = create_column(&ctx, &products.id, "id", 0).await;

    link_columns(&ctx, &project.id, &order_customer, &customer_id).await;
    link_columns(&ctx, &project.id, &order_product, &product_id).await;
    let survivor = link_columns(&ctx, &project.id, &product_id, &customer_id).await;

    ctx.tables().delete_table(&owner(), &orders.id).await.unwrap();

    assert!(ctx.tables().get_table(&owner(), &orders.id).await.unwrap().is_none());
    assert!(ctx
        .columns()
        .get_column(&owner(), &order_customer.id)
        .await
        .unwrap()
        .is_none());

    let remaining = ctx
        .relationships()
        .list_relationships(&owner(), &project.id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, survivor.id);

    let tables = ctx.tables().list_tables(&owner(), &project.id).await.unwrap();
    assert_eq!(tables.len(), 2);
}

#[tokio::test]
async fn deleting_a_junction_table_drops_the_many_to_many_edge() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Tags").await;
    let posts = create_table(&ctx, &project.id, "posts").await;
    let tags = create_table(&ctx, &project.id, "tags").await;
    let post_tags = create_table(&ctx, &project.id, "post_tags").await;
    let post_id = create_column(&ctx, &posts.id, "id", 0).await;
    let tag_id = create_column(&ctx, &tags.id, "id", 0).await;

    ctx.relationships()
        .create_relationship(
            &owner(),
            &NewRelationship {
                project_id: project.id.clone(),
                source_table_id: posts.id.clone(),
                source_column_id: post_id.id.clone(),
                target_table_id: tags.id.clone(),
                target_column_id: tag_id.id.clone(),
                relation_type: RelationType::ManyToMany,
                junction_table_id: Some(post_tags.id.clone()),
            },
        )
        .await
        .unwrap();

    ctx.tables().delete_table(&owner(), &post_tags.id).await.unwrap();
    assert!(ctx
        .relationships()
        .list_relationships(&owner(), &project.id)
        .await
        .unwrap()
        .is_empty());
    assert!(ctx.columns().get_column(&owner(), &post_id.id).await.unwrap().is_some());
}

#[tokio::test]
async fn relationship_junction_rules() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Rules").await;
    let t1 = create_table(&ctx, &project.id, "a").await;
    let t2 = create_table(&ctx, &project.id, "b").await;
    let junction = create_table(&ctx, &project.id, "a_b").await;
    let c1 = create_column(&ctx, &t1.id, "id", 0).await;
    let c2 = create_column(&ctx, &t2.id, "id", 0).await;

    let input = |relation_type, junction_table_id: Option<&str>| NewRelationship {
        project_id: project.id.clone(),
        source_table_id: t1.id.clone(),
        source_column_id: c1.id.clone(),
        target_table_id: t2.id.clone(),
        target_column_id: c2.id.clone(),
        relation_type,
        junction_table_id: junction_table_id.map(str::to_string),
    };

    let missing_junction = ctx
        .relationships()
        .create_relationship(&owner(), &input(RelationType::ManyToMany, None))
        .await;
    assert!(matches!(missing_junction, Err(SchemaError::InvalidArgument(_))));

    let stray_junction = ctx
        .relationships()
        .create_relationship(&owner(), &input(RelationType::OneToOne, Some(&junction.id)))
        .await;
    assert!(matches!(stray_junction, Err(SchemaError::InvalidArgument(_))));

    let created = ctx
        .relationships()
        .create_relationship(&owner(), &input(RelationType::OneToOne, None))
        .await
        .unwrap();

    let upgraded = ctx
        .relationships()
        .update_relationship_type(
            &owner(),
            &created.id,
            RelationType::ManyToMany,
            Some(&junction.id),
        )
        .await
        .unwrap();
    assert_eq!(upgraded.relation_type, RelationType::ManyToMany);
    assert_eq!(upgraded.junction_table_id.as_deref(), Some(junction.id.as_str()));

    let result = ctx.tables().list_tables(&owner(), &project.id).await.unwrap();
    assert_eq!(result.len(), 3);
}

#[tokio::test]
async fn relationship_endpoints_must_match_their_tables() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Endpoints").await;
    let t1 = create_table(&ctx, &project.id, "a").await;
    let t2 = create_table(&ctx, &project.id, "b").await;
    let c1 = create_column(&ctx, &t1.id, "id", 0).await;
    let c2 = create_column(&ctx, &t2.id, "id", 0).await;

    let swapped = ctx
        .relationships()
        .create_relationship(
            &owner(),
            &NewRelationship {
                project_id: project.id.clone(),
                source_table_id: t2.id.clone(),
                source_column_id: c1.id.clone(),
                target_table_id: t1.id.clone(),
                target_column_id: c2.id.clone(),
                relation_type: RelationType::OneToMany,
                junction_table_id: None,
            },
        )
        .await;
    assert!(matches!(swapped, Err(SchemaError::InvalidArgument(_))));

    let other_project = create_project(&ctx, "Elsewhere").await;
    let foreign = ctx
        .relationships()
        .create_relationship(
            &owner(),
            &NewRelationship {
                project_id: other_project.id.clone(),
                source_table_id: t1.id.clone(),
                source_column_id: c1.id.clone(),
                target_table_id: t2.id.clone(),
                target_column_id: c2.id.clone(),
                relation_type: RelationType::OneToMany,
                junction_table_id: None,
            },
        )
        .await;
    assert!(matches!(foreign, Err(SchemaError::InvalidArgument(_))));

    let dangling = ctx
        .relationships()
        .create_relationship(
            &owner(),
            &NewRelationship {
                project_id: project.id.clone(),
                source_table_id: t1.id.clone(),
                source_column_id: "gone".to_string(),
                target_table_id: t2.id.clone(),
                target_column_id: c2.id.clone(),
                relation_type: RelationType::OneToMany,
                junction_table_id: None,
            },
        )
        .await;
    assert!(matches!(dangling, Err(SchemaError::NotFound { .. })));
}

#[tokio::test]
async fn enum_types_are_unique_and_protected_while_used() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Enums").await;
    let table = create_table(&ctx, &project.id, "users").await;
    let values = vec!["active".to_string(), "banned".to_string()];

    let status = ctx
        .enum_types()
        .create_enum_type(&owner(), &project.id, "user_status", &values)
        .await
        .unwrap();
    assert_eq!(status.values, values);

    let duplicate = ctx
        .enum_types()
        .create_enum_type(&owner(), &project.id, "user_status", &values)
        .await;
    assert_eq!(
        duplicate.err().and_then(|e| e.conflict_reason()),
        Some(ConflictReason::DuplicateEnumName)
    );

    let mut input = NewColumn::new(&table.id, "status", "user_status", TypeCategory::Enum, 0);
    input.enum_type_id = Some(status.id.clone());
    let column = ctx.columns().create_column(&owner(), &input).await.unwrap();

    assert_eq!(
        conflict(ctx.enum_types().delete_enum_type(&owner(), &status.id).await),
        Some(ConflictReason::EnumInUse)
    );

    let renamed = ctx
        .enum_types()
        .update_enum_type(
            &owner(),
            &status.id,
            &EnumTypeUpdate {
                name: Some("account_status".to_string()),
                values: Some(vec![
                    "active".to_string(),
                    "banned".to_string(),
                    "deleted".to_string(),
                ]),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "account_status");
    assert_eq!(renamed.values.len(), 3);

    ctx.columns()
        .update_column(
            &owner(),
            &column.id,
            &ColumnUpdate {
                type_category: Some(TypeCategory::Text),
                data_type: Some("text".to_string()),
                enum_type_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    ctx.enum_types()
        .delete_enum_type(&owner(), &status.id)
        .await
        .unwrap();
    assert!(ctx
        .enum_types()
        .list_enum_types(&owner(), &project.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn columns_cannot_use_an_enum_of_another_project() {
    let ctx = setup().await;
    let project = create_project(&ctx, "Mine").await;
    let other = create_project(&ctx, "Other").await;
    let table = create_table(&ctx, &project.id, "users").await;
    let foreign_enum = ctx
        .enum_types()
        .create_enum_type(&owner(), &other.id, "mood", &["ok".to_string()])
        .await
        .unwrap();

    let mut input = NewColumn::new(&table.id, "mood", "mood", TypeCategory::Enum, 0);
    input.enum_type_id = Some(foreign_enum.id.clone());
    let result = ctx.columns().create_column(&owner(), &input).await;
    assert!(matches!(result, Err(SchemaError::InvalidArgument(_))));
}

#[tokio::test]
async fn racing_delete_and_link_never_leave_a_dangling_relationship() {
    let (_dir, ctx) = setup_file_backed().await;
    let project = create_project(&ctx, "Race").await;
    let posts = create_table(&ctx, &project.id, "posts").await;
    let users = create_table(&ctx, &project.id, "users").await;
    let author_id = create_column(&ctx, &posts.id, "author_id", 0).await;

    for round in 0..10 {
        let target = create_column(&ctx, &users.id, &format!("id_{}", round), round).await;

        let delete = {
            let ctx = ctx.clone();
            let column_id = target.id.clone();
            tokio::spawn(async move { ctx.columns().delete_column(&owner(), &column_id).await })
        };
        let link = {
            let ctx = ctx.clone();
            let input = NewRelationship {
                project_id: project.id.clone(),
                source_table_id: posts.id.clone(),
                source_column_id: author_id.id.clone(),
                target_table_id: users.id.clone(),
                target_column_id: target.id.clone(),
                relation_type: RelationType::OneToMany,
                junction_table_id: None,
            };
            tokio::spawn(async move {
                ctx.relationships()
                    .create_relationship(&owner(), &input)
                    .await
            })
        };
        let (deleted, linked) = join(delete, link).await;
        let (deleted, linked) = (deleted.unwrap(), linked.unwrap());

        let column = ctx.columns().get_column(&owner(), &target.id).await.unwrap();
        let relationships = ctx
            .relationships()
            .list_relationships(&owner(), &project.id)
            .await
            .unwrap();
        let pointing_at_target = relationships
            .iter()
            .filter(|r| r.target_column_id == target.id)
            .count();

        match (&deleted, &linked) {
            (Err(err), Ok(_)) => {
                assert_eq!(err.conflict_reason(), Some(ConflictReason::RelationshipTarget));
                assert!(column.is_some());
                assert_eq!(pointing_at_target, 1);
            }
            (Ok(()), Err(err)) => {
                assert!(err.is_not_found(), "round {}: {}", round, err);
                assert!(column.is_none());
                assert_eq!(pointing_at_target, 0);
            }
            _ => panic!(
                "round {}: delete {:?} and link {:?} cannot both settle this way",
                round, deleted, linked
            ),
        }
    }
}
