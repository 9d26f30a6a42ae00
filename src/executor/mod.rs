//! Phi evaluator - Volcano iterator model
//!
//! A bound Phi plan is evaluated by a single aggregate operator pulling
//! rows from a `RowSource`: each operator implements open/next/close.
//!
//! ```text
//! RowSource ─rows─▶ PhiAggregate ─records─▶ ResultSet ─▶ ResultSink
//!                     │
//!                     └─ GroupTable (group-by key → accumulators)
//! ```

pub mod aggregate;
pub mod bind;
pub mod datum;
pub mod engine;
pub mod error;
pub mod eval;
pub mod row;
pub mod schema;
pub mod sink;
pub mod source;

pub use aggregate::{Accumulator, GroupRecord, GroupTable, PhiAggregate};
pub use bind::BoundPlan;
pub use datum::Datum;
pub use engine::ExecutorEngine;
pub use error::{ExecutorError, ExecutorResult, SourceError};
pub use row::Row;
pub use schema::{Column, DataType, Schema};
pub use sink::{ResultSet, ResultSink, TableSink};
pub use source::{ChannelSource, MemorySource, ReplaySource, RowSender, RowSource};
