//! Error types for schemacanvas-core
//!
//! - **SchemaError**: the single failure taxonomy of the engine
//!   (Unauthorized, NotFound, Conflict, InvalidArgument, CorruptSnapshot, StoreFailure)
//! - **ConflictReason**: why a referential-integrity check rejected a mutation
//!
//! Configuration problems have their own type, [`crate::config::ConfigError`],
//! because they happen before any store is reachable.

pub mod schema;

pub use schema::{ConflictReason, SchemaError};

/// Result type alias for schema graph operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_result_alias() {
        let result: SchemaResult<()> = Err(SchemaError::Conflict(ConflictReason::TableHasColumns));
        assert!(result.is_err());
    }
}
