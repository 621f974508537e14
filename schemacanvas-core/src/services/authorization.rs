use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::auth::Actor;
use crate::config::AccessPolicy;
use crate::database::entities::{
    columns, enum_types, project_collaborators, projects, relationships, snapshots, tables,
};
use crate::errors::{SchemaError, SchemaResult};
use crate::graph_types::CollaboratorRole;

/// What an operation needs to do with a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    /// Project management: deletion, sharing, collaborators
    Admin,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Admin => "admin",
        }
    }
}

/// How the acting user relates to a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAccess {
    Owner,
    Collaborator(CollaboratorRole),
}

impl ProjectAccess {
    pub fn grants(&self, capability: Capability) -> bool {
        match (self, capability) {
            (ProjectAccess::Owner, _) => true,
            (ProjectAccess::Collaborator(_), Capability::Admin) => false,
            (ProjectAccess::Collaborator(CollaboratorRole::Editor), _) => true,
            (ProjectAccess::Collaborator(CollaboratorRole::Viewer), Capability::Read) => true,
            (ProjectAccess::Collaborator(CollaboratorRole::Viewer), _) => false,
        }
    }
}

/// A project the actor was allowed to touch, with the resolved user id
#[derive(Debug, Clone)]
pub struct AuthorizedProject {
    pub project: projects::Model,
    pub user_id: String,
    pub access: ProjectAccess,
}

impl AuthorizedProject {
    pub fn project_id(&self) -> &str {
        &self.project.id
    }
}

/// Resolves the owning project of an entity and checks the actor against it
///
/// Every check takes the connection explicitly so that it runs on the same
/// transaction as the operation it guards.
#[derive(Clone, Debug)]
pub struct AuthorizationService {
    policy: AccessPolicy,
}

impl AuthorizationService {
    pub fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Check order: missing actor, missing project, then insufficient access
    pub async fn authorize<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        project_id: &str,
        capability: Capability,
    ) -> SchemaResult<AuthorizedProject> {
        let user_id = actor.require_user()?;

        let project = projects::Entity::find_by_id(project_id)
            .one(conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("project", project_id))?;

        let access = self.resolve_access(conn, &project, user_id).await?;
        match access {
            Some(access) if access.grants(capability) => Ok(AuthorizedProject {
                project,
                user_id: user_id.to_string(),
                access,
            }),
            _ => {
                debug!(
                    "Denied {} access to project {} for user {}",
                    capability.as_str(),
                    project_id,
                    user_id
                );
                Err(SchemaError::unauthorized(format!(
                    "User {} lacks {} access to project {}",
                    user_id,
                    capability.as_str(),
                    project_id
                )))
            }
        }
    }

    /// Read variant: `None` instead of NotFound/Unauthorized
    pub async fn authorize_read<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        project_id: &str,
    ) -> SchemaResult<Option<AuthorizedProject>> {
        read_or_none(self.authorize(conn, actor, project_id, Capability::Read).await)
    }

    pub async fn authorize_table<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        table_id: &str,
        capability: Capability,
    ) -> SchemaResult<(tables::Model, AuthorizedProject)> {
        actor.require_user()?;
        let table = tables::Entity::find_by_id(table_id)
            .one(conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("table", table_id))?;
        let authorized = self
            .authorize(conn, actor, &table.project_id, capability)
            .await?;
        Ok((table, authorized))
    }

    /// Column -> Table -> Project
    pub async fn authorize_column<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        column_id: &str,
        capability: Capability,
    ) -> SchemaResult<(columns::Model, tables::Model, AuthorizedProject)> {
        actor.require_user()?;
        let column = columns::Entity::find_by_id(column_id)
            .one(conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("column", column_id))?;
        let (table, authorized) = self
            .authorize_table(conn, actor, &column.table_id, capability)
            .await?;
        Ok((column, table, authorized))
    }

    pub async fn authorize_relationship<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        relationship_id: &str,
        capability: Capability,
    ) -> SchemaResult<(relationships::Model, AuthorizedProject)> {
        actor.require_user()?;
        let relationship = relationships::Entity::find_by_id(relationship_id)
            .one(conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("relationship", relationship_id))?;
        let authorized = self
            .authorize(conn, actor, &relationship.project_id, capability)
            .await?;
        Ok((relationship, authorized))
    }

    pub async fn authorize_enum_type<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        enum_type_id: &str,
        capability: Capability,
    ) -> SchemaResult<(enum_types::Model, AuthorizedProject)> {
        actor.require_user()?;
        let enum_type = enum_types::Entity::find_by_id(enum_type_id)
            .one(conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("enum type", enum_type_id))?;
        let authorized = self
            .authorize(conn, actor, &enum_type.project_id, capability)
            .await?;
        Ok((enum_type, authorized))
    }

    pub async fn authorize_snapshot<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        snapshot_id: &str,
        capability: Capability,
    ) -> SchemaResult<(snapshots::Model, AuthorizedProject)> {
        actor.require_user()?;
        let snapshot = snapshots::Entity::find_by_id(snapshot_id)
            .one(conn)
            .await?
            .ok_or_else(|| SchemaError::not_found("snapshot", snapshot_id))?;
        let authorized = self
            .authorize(conn, actor, &snapshot.project_id, capability)
            .await?;
        Ok((snapshot, authorized))
    }

    async fn resolve_access<C: ConnectionTrait>(
        &self,
        conn: &C,
        project: &projects::Model,
        user_id: &str,
    ) -> SchemaResult<Option<ProjectAccess>> {
        if project.owner_id == user_id {
            return Ok(Some(ProjectAccess::Owner));
        }
        if self.policy == AccessPolicy::OwnerOnly {
            return Ok(None);
        }

        let collaboration = project_collaborators::Entity::find()
            .filter(project_collaborators::Column::ProjectId.eq(project.id.as_str()))
            .filter(project_collaborators::Column::UserId.eq(user_id))
            .one(conn)
            .await?;

        match collaboration {
            Some(collaboration) => {
                let role: CollaboratorRole = collaboration.role.parse().map_err(|e| {
                    SchemaError::corrupt_record(format!("collaborator {}: {}", collaboration.id, e))
                })?;
                Ok(Some(ProjectAccess::Collaborator(role)))
            }
            None => Ok(None),
        }
    }
}

/// Turn an access denial into `None`; store failures still propagate
pub fn read_or_none<T>(result: SchemaResult<T>) -> SchemaResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_access_denial() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_has_every_capability() {
        for capability in [Capability::Read, Capability::Write, Capability::Admin] {
            assert!(ProjectAccess::Owner.grants(capability));
        }
    }

    #[test]
    fn test_collaborator_roles() {
        let editor = ProjectAccess::Collaborator(CollaboratorRole::Editor);
        let viewer = ProjectAccess::Collaborator(CollaboratorRole::Viewer);

        assert!(editor.grants(Capability::Read));
        assert!(editor.grants(Capability::Write));
        assert!(!editor.grants(Capability::Admin));

        assert!(viewer.grants(Capability::Read));
        assert!(!viewer.grants(Capability::Write));
        assert!(!viewer.grants(Capability::Admin));
    }

    #[test]
    fn test_read_or_none() {
        let denied: SchemaResult<i32> = Err(SchemaError::unauthorized("nope"));
        assert_eq!(read_or_none(denied).expect("denial is not an error"), None);

        let missing: SchemaResult<i32> = Err(SchemaError::not_found("project", "p1"));
        assert_eq!(read_or_none(missing).expect("missing is not an error"), None);

        let invalid: SchemaResult<i32> = Err(SchemaError::invalid("bad"));
        assert!(read_or_none(invalid).is_err());
        assert_eq!(read_or_none(Ok(3)).expect("value"), Some(3));
    }
}
