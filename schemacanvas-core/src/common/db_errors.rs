//! Database error categorization
//!
//! Classifies `sea_orm::DbErr` values so callers can decide whether a failed
//! unit of work is worth retrying or must be reported as a store failure.
//!
//! # Examples
//!
//! ```
//! use schemacanvas::common::db_errors::DbErrorKind;
//! use sea_orm::DbErr;
//!
//! let err = DbErr::RecordNotFound("column".to_string());
//! assert_eq!(DbErrorKind::from_db_err(&err), DbErrorKind::NotFound);
//! assert!(!DbErrorKind::NotFound.is_retryable());
//! ```

use sea_orm::DbErr;

/// Categories of database errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Record not found (query returned no results)
    NotFound,

    /// Unique constraint violation
    UniqueViolation,

    /// Foreign key constraint violation
    ForeignKeyViolation,

    /// Database locked by a concurrent writer, or a lock upgrade deadlock
    Busy,

    /// Database connection error
    ConnectionError,

    /// Query or pool acquire timeout
    Timeout,

    /// Unknown/other database error
    Unknown,
}

impl DbErrorKind {
    /// Categorize a sea_orm database error
    pub fn from_db_err(err: &DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) => Self::NotFound,
            DbErr::ConnectionAcquire(_) => Self::Timeout,
            DbErr::Conn(_) => Self::from_message(&err.to_string()).or(Self::ConnectionError),
            DbErr::Exec(_) | DbErr::Query(_) => Self::from_message(&err.to_string()),
            _ => Self::Unknown,
        }
    }

    fn from_message(message: &str) -> Self {
        let msg_lower = message.to_lowercase();
        if msg_lower.contains("unique") || msg_lower.contains("duplicate") {
            Self::UniqueViolation
        } else if msg_lower.contains("foreign key") {
            Self::ForeignKeyViolation
        } else if msg_lower.contains("locked")
            || msg_lower.contains("busy")
            || msg_lower.contains("deadlock")
        {
            Self::Busy
        } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
            Self::Timeout
        } else {
            Self::Unknown
        }
    }

    fn or(self, fallback: Self) -> Self {
        if self == Self::Unknown {
            fallback
        } else {
            self
        }
    }

    /// Short label used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::UniqueViolation => "unique-violation",
            Self::ForeignKeyViolation => "foreign-key-violation",
            Self::Busy => "busy",
            Self::ConnectionError => "connection",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Transient failures that might succeed when the unit of work is re-run
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy | Self::ConnectionError | Self::Timeout)
    }
}
