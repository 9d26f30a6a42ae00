//! Predicate language error types

use std::fmt;

/// Lexical and syntax errors raised while reading predicate clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// The clause produced no tokens at all
    NoTokens(String),
    /// A token that cannot appear where it was found
    InvalidToken(String),
    /// An opening parenthesis without a balancing close
    MissingClosingParenthesis(String),
    /// `not` used where a binary operator is expected
    RightHandSideHasNotOperator(String),
    /// An operator with nothing on one of its sides
    UnexpectedEndOfClause(String),
    /// Aggregate function name outside max/min/count/sum/avg
    UnknownAggregateFunction(String),
    /// Projected value with an unsupported shape
    InvalidProjectedValue(String),
    /// Parentheses and `not` nested past the given limit
    NestingTooDeep(usize),
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::NoTokens(clause) => write!(f, "No tokens in clause '{}'", clause),
            SqlError::InvalidToken(token) => write!(f, "Invalid token '{}'", token),
            SqlError::MissingClosingParenthesis(clause) => {
                write!(f, "Missing closing parenthesis in '{}'", clause)
            }
            SqlError::RightHandSideHasNotOperator(clause) => {
                write!(f, "'not' cannot be used as a binary operator in '{}'", clause)
            }
            SqlError::UnexpectedEndOfClause(op) => {
                write!(f, "Operator '{}' is missing an operand", op)
            }
            SqlError::UnknownAggregateFunction(name) => {
                write!(f, "Unknown aggregate function '{}'", name)
            }
            SqlError::InvalidProjectedValue(entry) => {
                write!(f, "Invalid projected value '{}'", entry)
            }
            SqlError::NestingTooDeep(limit) => {
                write!(f, "Clause nests deeper than {} levels", limit)
            }
        }
    }
}

impl std::error::Error for SqlError {}

/// Result type for predicate language operations
pub type SqlResult<T> = Result<T, SqlError>;
