use serde::Serialize;
use thiserror::Error;

/// A single field-level rule violation, carrying enough context for the
/// caller to report every problem with an input at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Field that violated a rule (e.g. "name", "duration_seconds").
    pub field: &'static str,
    /// Human-readable description of the violation.
    pub message: String,
}

impl Violation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Error, Debug)]
pub enum LibraryError {
    /// Malformed or missing required input. Carries all violations found,
    /// not just the first.
    #[error("validation failed for {entity}: {}", format_violations(.violations))]
    Validation {
        entity: &'static str,
        violations: Vec<Violation>,
    },

    /// A row with the given id does not exist (either the target of an
    /// update/delete, or a dangling foreign-key reference in an input).
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Uniqueness or restrict-policy violation. The caller may retry with
    /// different input or with an explicit cascade.
    #[error("conflict on {entity}: {reason}")]
    Conflict {
        entity: &'static str,
        reason: String,
    },

    /// Storage structure mismatch at initialization. Fatal.
    #[error("schema error: {0}")]
    Schema(String),

    /// Engine-level failure (connection, lock contention, I/O). Distinct
    /// from the logical errors above; callers may retry with backoff.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl LibraryError {
    /// Translate a sqlx error into a domain error where the repository
    /// knows the context: unique-constraint failures become `Conflict`,
    /// everything else stays a `Storage` error.
    pub(crate) fn on_conflict(entity: &'static str, reason: &str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => LibraryError::Conflict {
                entity,
                reason: reason.to_string(),
            },
            _ => LibraryError::Storage(err),
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, LibraryError>;
