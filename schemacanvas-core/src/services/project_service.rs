use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{debug, info};

use crate::auth::Actor;
use crate::common::{clean_name, new_id, with_retry, RetryPolicy};
use crate::database::entities::{
    columns, enum_types, project_collaborators, projects, relationships, snapshots, tables,
    undo_cursors, undo_entries,
};
use crate::errors::{ConflictReason, SchemaError, SchemaResult};
use crate::graph_types::{CollaboratorRecord, CollaboratorRole, ProjectGraph, ProjectRecord};
use crate::services::authorization::{AuthorizationService, Capability};
use crate::services::graph_query::{assemble_graph, load_entities};

/// Projects, their sharing state and collaborators
pub struct ProjectService {
    db: DatabaseConnection,
    auth: AuthorizationService,
    retry: RetryPolicy,
}

impl ProjectService {
    pub fn new(db: DatabaseConnection, auth: AuthorizationService, retry: RetryPolicy) -> Self {
        Self { db, auth, retry }
    }

    /// The acting user becomes the owner
    pub async fn create_project(&self, actor: &Actor, name: &str) -> SchemaResult<ProjectRecord> {
        let owner_id = actor.require_user()?;
        let name = clean_name("project", name)?;

        let now = Utc::now();
        let project = projects::ActiveModel {
            id: Set(new_id()),
            name: Set(name),
            owner_id: Set(owner_id.to_string()),
            share_link: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(|e| SchemaError::from(e).with_operation("create project"))?;

        info!("Created project {} for user {}", project.id, owner_id);
        Ok(ProjectRecord::from(project))
    }

    pub async fn get_project(&self, actor: &Actor, id: &str) -> SchemaResult<Option<ProjectRecord>> {
        Ok(self
            .auth
            .authorize_read(&self.db, actor, id)
            .await?
            .map(|authorized| ProjectRecord::from(authorized.project)))
    }

    /// Newest first; empty without an actor
    pub async fn list_owned_projects(&self, actor: &Actor) -> SchemaResult<Vec<ProjectRecord>> {
        let Some(owner_id) = actor.user_id.as_deref() else {
            return Ok(Vec::new());
        };

        Ok(projects::Entity::find()
            .filter(projects::Column::OwnerId.eq(owner_id))
            .order_by_desc(projects::Column::CreatedAt)
            .order_by_desc(projects::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(ProjectRecord::from)
            .collect())
    }

    pub async fn rename_project(
        &self,
        actor: &Actor,
        id: &str,
        name: &str,
    ) -> SchemaResult<ProjectRecord> {
        with_retry(&self.retry, "rename project", move || {
            self.rename_project_once(actor, id, name)
        })
        .await
    }

    async fn rename_project_once(
        &self,
        actor: &Actor,
        id: &str,
        name: &str,
    ) -> SchemaResult<ProjectRecord> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, id, Capability::Write)
            .await?;
        let name = clean_name("project", name)?;

        let mut active: projects::ActiveModel = authorized.project.into();
        active.name = Set(name);
        active.updated_at = Set(Utc::now());
        let project = active.update(&txn).await?;
        txn.commit().await?;

        info!("Renamed project {}", id);
        Ok(ProjectRecord::from(project))
    }

    /// Removes the project and everything that belongs to it
    pub async fn delete_project(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        with_retry(&self.retry, "delete project", move || {
            self.delete_project_once(actor, id)
        })
        .await
    }

    async fn delete_project_once(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        let txn = self.db.begin().await?;
        self.auth
            .authorize(&txn, actor, id, Capability::Admin)
            .await?;

        let table_ids: Vec<String> = tables::Entity::find()
            .filter(tables::Column::ProjectId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        undo_entries::Entity::delete_many()
            .filter(undo_entries::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        undo_cursors::Entity::delete_many()
            .filter(undo_cursors::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        snapshots::Entity::delete_many()
            .filter(snapshots::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        let relationships = relationships::Entity::delete_many()
            .filter(relationships::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        let columns = columns::Entity::delete_many()
            .filter(columns::Column::TableId.is_in(table_ids.clone()))
            .exec(&txn)
            .await?
            .rows_affected;
        tables::Entity::delete_many()
            .filter(tables::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        enum_types::Entity::delete_many()
            .filter(enum_types::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        project_collaborators::Entity::delete_many()
            .filter(project_collaborators::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        projects::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(
            "Deleted project {} ({} tables, {} columns, {} relationships)",
            id,
            table_ids.len(),
            columns,
            relationships
        );
        Ok(())
    }

    /// Replace the share link with a fresh one
    pub async fn create_share_link(&self, actor: &Actor, id: &str) -> SchemaResult<String> {
        with_retry(&self.retry, "create share link", move || {
            self.set_share_link_once(actor, id, Some(new_id()))
        })
        .await
        .and_then(|link| link.ok_or_else(|| SchemaError::corrupt_record("share link not stored")))
    }

    pub async fn clear_share_link(&self, actor: &Actor, id: &str) -> SchemaResult<()> {
        with_retry(&self.retry, "clear share link", move || {
            self.set_share_link_once(actor, id, None)
        })
        .await
        .map(|_| ())
    }

    async fn set_share_link_once(
        &self,
        actor: &Actor,
        id: &str,
        link: Option<String>,
    ) -> SchemaResult<Option<String>> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, id, Capability::Admin)
            .await?;

        let mut active: projects::ActiveModel = authorized.project.into();
        active.share_link = Set(link);
        active.updated_at = Set(Utc::now());
        let project = active.update(&txn).await?;
        txn.commit().await?;

        debug!("Share link of project {} updated", id);
        Ok(project.share_link)
    }

    /// Lookup for anonymous viewers holding the link
    pub async fn find_by_share_link(&self, link: &str) -> SchemaResult<Option<ProjectRecord>> {
        Ok(projects::Entity::find()
            .filter(projects::Column::ShareLink.eq(link))
            .one(&self.db)
            .await?
            .map(ProjectRecord::from))
    }

    pub async fn add_collaborator(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
        role: CollaboratorRole,
    ) -> SchemaResult<CollaboratorRecord> {
        with_retry(&self.retry, "add collaborator", move || {
            self.add_collaborator_once(actor, project_id, user_id, role)
        })
        .await
    }

    async fn add_collaborator_once(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
        role: CollaboratorRole,
    ) -> SchemaResult<CollaboratorRecord> {
        let txn = self.db.begin().await?;
        let authorized = self
            .auth
            .authorize(&txn, actor, project_id, Capability::Admin)
            .await?;

        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SchemaError::invalid("collaborator user id cannot be empty"));
        }
        if user_id == authorized.project.owner_id {
            return Err(SchemaError::invalid("the owner cannot be added as a collaborator"));
        }

        let existing = project_collaborators::Entity::find()
            .filter(project_collaborators::Column::ProjectId.eq(project_id))
            .filter(project_collaborators::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(SchemaError::Conflict(ConflictReason::DuplicateCollaborator));
        }

        let collaborator = project_collaborators::ActiveModel {
            id: Set(new_id()),
            project_id: Set(project_id.to_string()),
            user_id: Set(user_id.to_string()),
            role: Set(role.into()),
            invited_by: Set(authorized.user_id.clone()),
            invited_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(
            "Added {} as {} on project {}",
            user_id,
            role.as_str(),
            project_id
        );
        CollaboratorRecord::try_from(collaborator)
    }

    pub async fn remove_collaborator(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
    ) -> SchemaResult<()> {
        with_retry(&self.retry, "remove collaborator", move || {
            self.remove_collaborator_once(actor, project_id, user_id)
        })
        .await
    }

    async fn remove_collaborator_once(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
    ) -> SchemaResult<()> {
        let txn = self.db.begin().await?;
        self.auth
            .authorize(&txn, actor, project_id, Capability::Admin)
            .await?;

        let result = project_collaborators::Entity::delete_many()
            .filter(project_collaborators::Column::ProjectId.eq(project_id))
            .filter(project_collaborators::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(SchemaError::not_found("collaborator", user_id));
        }
        txn.commit().await?;

        info!("Removed {} from project {}", user_id, project_id);
        Ok(())
    }

    pub async fn list_collaborators(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Vec<CollaboratorRecord>> {
        if self
            .auth
            .authorize_read(&self.db, actor, project_id)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        project_collaborators::Entity::find()
            .filter(project_collaborators::Column::ProjectId.eq(project_id))
            .order_by_asc(project_collaborators::Column::InvitedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(CollaboratorRecord::try_from)
            .collect()
    }

    /// The whole schema graph of a project, read in one transaction
    pub async fn load_graph(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Option<ProjectGraph>> {
        let txn = self.db.begin().await?;
        let Some(authorized) = self.auth.authorize_read(&txn, actor, project_id).await? else {
            return Ok(None);
        };
        let entities = load_entities(&txn, project_id).await?;
        txn.commit().await?;

        Ok(Some(assemble_graph(
            ProjectRecord::from(authorized.project),
            entities,
        )))
    }
}
