pub mod db_errors;
pub mod retry;

pub use db_errors::DbErrorKind;
pub use retry::{with_retry, RetryPolicy};

use uuid::Uuid;

/// Fresh opaque identifier for a new record
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trim a user supplied name and reject it when nothing is left
pub fn clean_name(kind: &str, name: &str) -> crate::errors::SchemaResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(crate::errors::SchemaError::invalid(format!(
            "{} name cannot be empty",
            kind
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("table", "  users ").expect("valid name"), "users");
        assert!(clean_name("table", "   ").is_err());
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }
}
