use crate::errors::{SchemaError, SchemaResult};

pub type UserId = String;

/// The user on whose behalf an operation runs
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Actor {
    pub user_id: Option<UserId>,
}

impl Actor {
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// No resolvable identity; every write is rejected
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn require_user(&self) -> SchemaResult<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| SchemaError::unauthorized("No authenticated user"))
    }
}

/// Identity oracle supplied by the authentication layer
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Actor;
}

/// Fixed identity, used by the operator binary and in tests
#[derive(Clone, Debug)]
pub struct StaticIdentity {
    actor: Actor,
}

impl StaticIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        let actor = match user_id {
            Some(id) if !id.trim().is_empty() => Actor::user(id.trim()),
            _ => Actor::anonymous(),
        };
        Self { actor }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_actor(&self) -> Actor {
        self.actor.clone()
    }
}
