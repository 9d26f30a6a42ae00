//! PhiQL - Phi-operator query evaluation
//!
//! A Phi spec describes an extended GROUP BY: per group, any number of
//! grouping variables each select their own subset of rows through a
//! predicate, and aggregates are computed over those subsets.
//!
//! - `sql`: tokenizer, predicate parser and AST
//! - `planner`: builds the validated `Phi` plan from spec text
//! - `executor`: binds the plan and evaluates it over a row stream

pub mod config;
pub mod executor;
pub mod planner;
pub mod sql;
