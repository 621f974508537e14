//! Schema graph error types
//!
//! Every public operation of the engine reports failures through
//! [`SchemaError`]. Store errors are wrapped as [`SchemaError::StoreFailure`]
//! together with their [`DbErrorKind`], so raw `DbErr` values never reach callers.
//!
//! # Examples
//!
//! ```rust
//! use schemacanvas::errors::{ConflictReason, SchemaError};
//!
//! let err = SchemaError::Conflict(ConflictReason::RelationshipSource);
//! assert_eq!(err.conflict_reason(), Some(ConflictReason::RelationshipSource));
//! assert_eq!(err.to_string(), "Conflict: relationship-source");
//! ```

use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

use crate::common::db_errors::DbErrorKind;

/// Why a mutation was rejected to keep the graph consistent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// A relationship uses the column as its source
    RelationshipSource,
    /// A relationship uses the column as its target
    RelationshipTarget,
    /// A relationship uses the table as its junction table
    RelationshipJunction,
    /// Another enum type in the project already has this name
    DuplicateEnumName,
    /// A column still references the enum type
    EnumInUse,
    /// Columns still belong to the table
    TableHasColumns,
    /// A referenced entity no longer exists
    MissingReference,
    /// The user already collaborates on the project
    DuplicateCollaborator,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::RelationshipSource => "relationship-source",
            ConflictReason::RelationshipTarget => "relationship-target",
            ConflictReason::RelationshipJunction => "relationship-junction",
            ConflictReason::DuplicateEnumName => "duplicate-enum-name",
            ConflictReason::EnumInUse => "enum-in-use",
            ConflictReason::TableHasColumns => "table-has-columns",
            ConflictReason::MissingReference => "missing-reference",
            ConflictReason::DuplicateCollaborator => "duplicate-collaborator",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the schema graph engine
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Actor is absent or lacks the required capability on the project
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Operation would break referential integrity
    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    /// Malformed input, rejected before any write
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Snapshot payload could not be decoded
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// The store failed while running the operation
    #[error("Store failure during {operation} ({}): {source}", kind.as_str())]
    StoreFailure {
        operation: String,
        kind: DbErrorKind,
        #[source]
        source: DbErr,
    },
}

impl From<DbErr> for SchemaError {
    fn from(err: DbErr) -> Self {
        SchemaError::StoreFailure {
            operation: "database access".to_string(),
            kind: DbErrorKind::from_db_err(&err),
            source: err,
        }
    }
}

impl SchemaError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        SchemaError::Unauthorized(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        SchemaError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        SchemaError::InvalidArgument(message.into())
    }

    /// A stored value that cannot be mapped back into the domain model
    pub fn corrupt_record(message: impl Into<String>) -> Self {
        SchemaError::from(DbErr::Type(message.into()))
    }

    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            SchemaError::Conflict(reason) => Some(*reason),
            _ => None,
        }
    }

    /// NotFound or Unauthorized; read operations turn these into empty results
    pub fn is_access_denial(&self) -> bool {
        matches!(
            self,
            SchemaError::NotFound { .. } | SchemaError::Unauthorized(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaError::NotFound { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SchemaError::StoreFailure { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }

    /// Attach the failing operation name to a store failure
    pub fn with_operation(self, operation: &str) -> Self {
        match self {
            SchemaError::StoreFailure { kind, source, .. } => SchemaError::StoreFailure {
                operation: operation.to_string(),
                kind,
                source,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_conflict_reason_tags() {
        assert_eq!(
            ConflictReason::RelationshipTarget.as_str(),
            "relationship-target"
        );
        assert_eq!(ConflictReason::EnumInUse.to_string(), "enum-in-use");
    }

    #[test]
    fn test_store_failure_classification() {
        let err: SchemaError =
            DbErr::Exec(RuntimeErr::Internal("database is locked".to_string())).into();
        assert!(err.is_retryable());

        let err = err.with_operation("reorder columns");
        match &err {
            SchemaError::StoreFailure { operation, kind, .. } => {
                assert_eq!(operation, "reorder columns");
                assert_eq!(*kind, DbErrorKind::Busy);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("reorder columns"));
    }

    #[test]
    fn test_domain_errors_are_not_retried() {
        assert!(!SchemaError::Conflict(ConflictReason::EnumInUse).is_retryable());
        assert!(!SchemaError::unauthorized("no actor").is_retryable());
        assert!(SchemaError::not_found("table", "t1").is_access_denial());
        assert!(!SchemaError::invalid("bad").is_access_denial());
    }
}
