//! Planner error types

use std::fmt;

use crate::sql::SqlError;

/// Errors raised while building a `Phi` plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    /// Spec has fewer than the required sections
    InvalidFileLength { found: usize, required: usize },
    /// Tokenizer or parser failure
    Sql(SqlError),
    /// Clause parsed to a bare value where a predicate is required
    NotAPredicate(String),
    /// No grouping variable could be found in a predicate
    UnboundPredicate(String),
    /// Two predicates define the same grouping variable
    DuplicateGroupingVariable(String),
    /// Aggregate names a grouping variable without a predicate
    UnknownGroupingVariable(String),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::InvalidFileLength { found, required } => write!(
                f,
                "Invalid file length: found {} sections, need at least {}",
                found, required
            ),
            PlannerError::Sql(e) => write!(f, "{}", e),
            PlannerError::NotAPredicate(clause) => {
                write!(f, "Clause '{}' is not a predicate", clause)
            }
            PlannerError::UnboundPredicate(clause) => {
                write!(f, "No grouping variable found in '{}'", clause)
            }
            PlannerError::DuplicateGroupingVariable(var) => {
                write!(f, "Grouping variable '{}' is defined more than once", var)
            }
            PlannerError::UnknownGroupingVariable(var) => {
                write!(f, "Grouping variable '{}' has no predicate", var)
            }
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Sql(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SqlError> for PlannerError {
    fn from(e: SqlError) -> Self {
        PlannerError::Sql(e)
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
