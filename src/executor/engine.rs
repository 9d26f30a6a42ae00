//! Executor engine
//!
//! Binds a `Phi` to the row schema, drives the aggregate operator over a
//! row source and collects the result set.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::EvalConfig;
use crate::planner::Phi;

use super::aggregate::PhiAggregate;
use super::bind::BoundPlan;
use super::error::ExecutorResult;
use super::row::Row;
use super::schema::Schema;
use super::sink::ResultSet;
use super::source::{ReplaySource, RowSource};

/// Executor engine - evaluates Phi plans against a row stream
pub struct ExecutorEngine {
    schema: Schema,
    config: EvalConfig,
}

impl ExecutorEngine {
    pub fn new(schema: Schema, config: EvalConfig) -> Self {
        ExecutorEngine { schema, config }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Bind `phi` without reading any rows
    pub fn bind(&self, phi: &Phi) -> ExecutorResult<BoundPlan> {
        BoundPlan::bind(phi, &self.schema)
    }

    /// Evaluate `phi` over every row of `source`
    ///
    /// The source is closed on every exit path, including a bind failure.
    pub async fn execute(
        &self,
        phi: &Phi,
        mut source: Box<dyn RowSource>,
    ) -> ExecutorResult<ResultSet> {
        let plan = match self.bind(phi) {
            Ok(plan) => plan,
            Err(e) => {
                if let Err(close_err) = source.close().await {
                    warn!(error = %close_err, "Failed to close row source after bind error");
                }
                return Err(e);
            }
        };

        let columns = plan.column_names();
        let start = Instant::now();
        let mut aggregate = PhiAggregate::new(source, plan);

        let result = collect(&mut aggregate).await;
        let closed = aggregate.close().await;

        let rows = match (result, closed) {
            (Ok(rows), Ok(())) => rows,
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "Failed to close row source after error");
                }
                return Err(e);
            }
            (Ok(_), Err(e)) => return Err(e),
        };

        info!(
            groups = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Phi evaluation complete"
        );
        Ok(ResultSet::new(columns, rows))
    }

    /// Evaluate `phi` over a replayed sales file
    pub async fn execute_file(&self, phi: &Phi, path: impl AsRef<Path>) -> ExecutorResult<ResultSet> {
        let source = ReplaySource::new(path, self.schema.clone(), &self.config);
        self.execute(phi, Box::new(source)).await
    }
}

async fn collect(aggregate: &mut PhiAggregate) -> ExecutorResult<Vec<Row>> {
    aggregate.open().await?;
    let mut rows = Vec::new();
    while let Some(row) = aggregate.next().await? {
        rows.push(row);
    }
    Ok(rows)
}
