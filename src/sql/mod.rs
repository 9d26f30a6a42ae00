//! Predicate language - tokenizing and parsing
//!
//! This module provides:
//! - `tokenize`: Splits a clause into `Token`s
//! - `Parser`: Builds `PredicateValue` trees from tokens
//! - The AST shared by the planner and executor

pub mod ast;
pub mod error;
pub mod parser;
pub mod token;

pub use ast::*;
pub use error::{SqlError, SqlResult};
pub use parser::Parser;
pub use token::{tokenize, Token};
