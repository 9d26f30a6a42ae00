//! Phi aggregate executor
//!
//! Single-pass GROUP BY over several grouping variables. Each input row
//! updates every attribute aggregate of its group, then every grouping
//! aggregate whose grouping variable predicate holds for the row. The
//! having clause runs once per finished group record.

use async_trait::async_trait;
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;

use crate::sql::AggregateFunction;

use super::bind::{BoundPlan, OutputSource};
use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::eval::{eval_predicate, EvalContext};
use super::row::Row;
use super::schema::DataType;
use super::RowSource;

/// Accumulator for a single aggregate function
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count(i64),
    /// Integer until a float is added
    Sum(Datum),
    Avg { sum: f64, count: i64 },
    /// `None` is the -inf identity
    Max(Option<Datum>),
    /// `None` is the +inf identity
    Min(Option<Datum>),
}

impl Accumulator {
    /// Identity accumulator for `function`
    pub fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum(Datum::Int(0)),
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::Min => Accumulator::Min(None),
        }
    }

    pub fn accumulate(&mut self, value: &Datum) -> ExecutorResult<()> {
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(sum) => {
                if !value.is_null() {
                    *sum = add_numeric(sum, numeric(value, "sum")?)?;
                }
            }
            Accumulator::Avg { sum, count } => {
                if let Some(v) = numeric(value, "avg")?.as_float() {
                    *sum += v;
                    *count += 1;
                }
            }
            Accumulator::Max(max) => {
                if !value.is_null() && max.as_ref().is_none_or(|m| value > m) {
                    *max = Some(value.clone());
                }
            }
            Accumulator::Min(min) => {
                if !value.is_null() && min.as_ref().is_none_or(|m| value < m) {
                    *min = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    /// Combine a partial accumulator of the same function into this one
    pub fn merge(&mut self, other: &Accumulator) -> ExecutorResult<()> {
        match (self, other) {
            (Accumulator::Count(a), Accumulator::Count(b)) => *a += b,
            (Accumulator::Sum(a), Accumulator::Sum(b)) => *a = add_numeric(a, b)?,
            (
                Accumulator::Avg { sum, count },
                Accumulator::Avg {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *sum += other_sum;
                *count += other_count;
            }
            (Accumulator::Max(a), Accumulator::Max(Some(b))) => {
                if a.as_ref().is_none_or(|m| b > m) {
                    *a = Some(b.clone());
                }
            }
            (Accumulator::Min(a), Accumulator::Min(Some(b))) => {
                if a.as_ref().is_none_or(|m| b < m) {
                    *a = Some(b.clone());
                }
            }
            (Accumulator::Max(_), Accumulator::Max(None))
            | (Accumulator::Min(_), Accumulator::Min(None)) => {}
            (a, b) => {
                return Err(ExecutorError::Internal(format!(
                    "cannot merge {:?} into {:?}",
                    b, a
                )))
            }
        }
        Ok(())
    }

    /// Current value; `Null` where no row contributed to avg/max/min
    pub fn finalize(&self) -> Datum {
        match self {
            Accumulator::Count(n) => Datum::Int(*n),
            Accumulator::Sum(sum) => sum.clone(),
            Accumulator::Avg { sum, count } => {
                if *count == 0 {
                    Datum::Null
                } else {
                    Datum::Float(*sum / *count as f64)
                }
            }
            Accumulator::Max(max) => max.clone().unwrap_or(Datum::Null),
            Accumulator::Min(min) => min.clone().unwrap_or(Datum::Null),
        }
    }
}

fn numeric<'a>(value: &'a Datum, context: &str) -> ExecutorResult<&'a Datum> {
    match value {
        Datum::Int(_) | Datum::Float(_) | Datum::Null => Ok(value),
        other => Err(ExecutorError::TypeMismatch {
            expected: DataType::Float,
            got: other.data_type(),
            context: context.to_string(),
        }),
    }
}

fn add_numeric(acc: &Datum, value: &Datum) -> ExecutorResult<Datum> {
    match (acc, value) {
        (Datum::Int(a), Datum::Int(b)) => a
            .checked_add(*b)
            .map(Datum::Int)
            .ok_or_else(|| ExecutorError::InvalidOperation("integer overflow in sum".to_string())),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(Datum::Float(x + y)),
            _ => Ok(a.clone()),
        },
    }
}

/// Accumulator bundle for one group-by key
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    key: Row,
    accumulators: Vec<Accumulator>,
}

impl GroupRecord {
    fn new(key: Row, plan: &BoundPlan) -> Self {
        let accumulators = plan
            .aggregates
            .iter()
            .map(|agg| Accumulator::new(agg.function))
            .collect();
        GroupRecord { key, accumulators }
    }

    /// Group-by values
    pub fn key(&self) -> &Row {
        &self.key
    }

    pub fn accumulators(&self) -> &[Accumulator] {
        &self.accumulators
    }

    /// Project the record onto the plan's output columns
    pub fn output_row(&self, plan: &BoundPlan) -> ExecutorResult<Row> {
        let mut row = Row::new(Vec::with_capacity(plan.output.len()));
        for column in &plan.output {
            let value = match column.source {
                OutputSource::GroupKey(i) => self.group_key(i)?,
                OutputSource::Aggregate(i) => self.aggregate(i)?,
            };
            row.push(value);
        }
        Ok(row)
    }
}

impl EvalContext for GroupRecord {
    fn group_key(&self, index: usize) -> ExecutorResult<Datum> {
        self.key.get(index).cloned()
    }

    fn aggregate(&self, index: usize) -> ExecutorResult<Datum> {
        self.accumulators
            .get(index)
            .map(Accumulator::finalize)
            .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                index,
                row_len: self.accumulators.len(),
            })
    }
}

/// Group records keyed by group-by tuple, in discovery order
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    groups: IndexMap<Row, GroupRecord>,
    rows_seen: u64,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of input rows folded into the table
    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    /// Fold one input row into its group
    pub fn update(&mut self, plan: &BoundPlan, row: &Row) -> ExecutorResult<()> {
        let key = row.project(&plan.group_by)?;
        let record = match self.groups.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let record = GroupRecord::new(e.key().clone(), plan);
                e.insert(record)
            }
        };

        for &slot in &plan.attribute_aggregates {
            let column = plan.aggregates[slot].column;
            record.accumulators[slot].accumulate(row.get(column)?)?;
        }

        for var in &plan.grouping_vars {
            if !eval_predicate(&var.predicate, row)? {
                continue;
            }
            for &slot in &var.aggregates {
                let column = plan.aggregates[slot].column;
                record.accumulators[slot].accumulate(row.get(column)?)?;
            }
        }

        self.rows_seen += 1;
        Ok(())
    }

    /// Merge a table built over another partition of the same input
    pub fn merge(&mut self, other: GroupTable) -> ExecutorResult<()> {
        self.rows_seen += other.rows_seen;
        for (key, record) in other.groups {
            match self.groups.entry(key) {
                Entry::Occupied(mut e) => {
                    let target = e.get_mut();
                    for (acc, partial) in target.accumulators.iter_mut().zip(&record.accumulators) {
                        acc.merge(partial)?;
                    }
                }
                Entry::Vacant(e) => {
                    e.insert(record);
                }
            }
        }
        Ok(())
    }

    /// Apply the having clause and return surviving records in discovery order
    pub fn finish(self, plan: &BoundPlan) -> ExecutorResult<Vec<GroupRecord>> {
        let mut records = Vec::with_capacity(self.groups.len());
        for (_, record) in self.groups {
            if let Some(having) = &plan.having {
                if !eval_predicate(having, &record)? {
                    continue;
                }
            }
            records.push(record);
        }
        Ok(records)
    }
}

/// Phi aggregate executor
pub struct PhiAggregate {
    /// Input rows
    input: Box<dyn RowSource>,
    plan: BoundPlan,
    /// Finished output rows
    output: Vec<Row>,
    /// Current position in output
    position: usize,
}

impl PhiAggregate {
    pub fn new(input: Box<dyn RowSource>, plan: BoundPlan) -> Self {
        PhiAggregate {
            input,
            plan,
            output: Vec::new(),
            position: 0,
        }
    }

    pub fn plan(&self) -> &BoundPlan {
        &self.plan
    }
}

#[async_trait]
impl RowSource for PhiAggregate {
    async fn open(&mut self) -> ExecutorResult<()> {
        self.output.clear();
        self.position = 0;

        self.input.open().await?;

        let mut table = GroupTable::new();
        while let Some(row) = self.input.next().await? {
            table.update(&self.plan, &row)?;
        }

        let rows_seen = table.rows_seen();
        let groups = table.len();
        let records = table.finish(&self.plan)?;
        debug!(rows_seen, groups, emitted = records.len(), "Phi aggregation finished");

        for record in &records {
            self.output.push(record.output_row(&self.plan)?);
        }
        Ok(())
    }

    async fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if self.position >= self.output.len() {
            return Ok(None);
        }
        let row = self.output[self.position].clone();
        self.position += 1;
        Ok(Some(row))
    }

    async fn close(&mut self) -> ExecutorResult<()> {
        self.output.clear();
        self.position = 0;
        self.input.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::schema::Schema;
    use crate::executor::source::MemorySource;
    use crate::planner::Phi;

    fn sale(cust: &str, state: &str, quant: i64) -> Row {
        Schema::sales()
            .decode_line(
                &format!("{},Eggs,1,1,2020,{},{},2020-01-01", cust, state, quant),
                0,
            )
            .unwrap()
    }

    fn plan(spec: &str) -> BoundPlan {
        BoundPlan::bind(&Phi::build(spec).unwrap(), &Schema::sales()).unwrap()
    }

    #[test]
    fn test_accumulator_identities() {
        assert_eq!(Accumulator::new(AggregateFunction::Count).finalize(), Datum::Int(0));
        assert_eq!(Accumulator::new(AggregateFunction::Sum).finalize(), Datum::Int(0));
        assert_eq!(Accumulator::new(AggregateFunction::Avg).finalize(), Datum::Null);
        assert_eq!(Accumulator::new(AggregateFunction::Max).finalize(), Datum::Null);
        assert_eq!(Accumulator::new(AggregateFunction::Min).finalize(), Datum::Null);
    }

    #[test]
    fn test_accumulator_combine_rules() {
        let values = [Datum::Int(4), Datum::Int(10), Datum::Int(1)];
        let mut count = Accumulator::new(AggregateFunction::Count);
        let mut sum = Accumulator::new(AggregateFunction::Sum);
        let mut avg = Accumulator::new(AggregateFunction::Avg);
        let mut max = Accumulator::new(AggregateFunction::Max);
        let mut min = Accumulator::new(AggregateFunction::Min);
        for v in &values {
            for acc in [&mut count, &mut sum, &mut avg, &mut max, &mut min] {
                acc.accumulate(v).unwrap();
            }
        }
        assert_eq!(count.finalize(), Datum::Int(3));
        assert_eq!(sum.finalize(), Datum::Int(15));
        assert_eq!(avg.finalize(), Datum::Float(5.0));
        assert_eq!(max.finalize(), Datum::Int(10));
        assert_eq!(min.finalize(), Datum::Int(1));
    }

    #[test]
    fn test_sum_rejects_text() {
        let mut sum = Accumulator::new(AggregateFunction::Sum);
        assert!(matches!(
            sum.accumulate(&Datum::String("NY".to_string())),
            Err(ExecutorError::TypeMismatch { .. })
        ));
        // count and max accept any value
        let mut max = Accumulator::new(AggregateFunction::Max);
        max.accumulate(&Datum::String("NY".to_string())).unwrap();
        max.accumulate(&Datum::String("CT".to_string())).unwrap();
        assert_eq!(max.finalize(), Datum::String("NY".to_string()));
    }

    #[test]
    fn test_accumulator_merge() {
        let mut a = Accumulator::new(AggregateFunction::Avg);
        let mut b = Accumulator::new(AggregateFunction::Avg);
        a.accumulate(&Datum::Int(2)).unwrap();
        b.accumulate(&Datum::Int(4)).unwrap();
        b.accumulate(&Datum::Int(6)).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a.finalize(), Datum::Float(4.0));

        let mut max = Accumulator::new(AggregateFunction::Max);
        max.merge(&Accumulator::Max(Some(Datum::Int(3)))).unwrap();
        max.merge(&Accumulator::Max(None)).unwrap();
        assert_eq!(max.finalize(), Datum::Int(3));

        assert!(max.merge(&Accumulator::Count(1)).is_err());
    }

    #[test]
    fn test_group_table_grouping_variables() {
        let plan = plan("cust, count_1_quant, sum_2_quant\n2\ncust\n\n1.state = 'NY'; 2.state = 'NJ'");
        let mut table = GroupTable::new();
        for row in [sale("A", "NY", 10), sale("A", "NJ", 5), sale("B", "NY", 3)] {
            table.update(&plan, &row).unwrap();
        }
        assert_eq!(table.rows_seen(), 3);

        let records = table.finish(&plan).unwrap();
        let rows: Vec<Vec<Datum>> = records
            .iter()
            .map(|r| r.output_row(&plan).unwrap().values().to_vec())
            .collect();
        assert_eq!(
            rows,
            vec![
                vec![Datum::String("A".to_string()), Datum::Int(1), Datum::Int(5)],
                vec![Datum::String("B".to_string()), Datum::Int(1), Datum::Int(0)],
            ]
        );
    }

    #[test]
    fn test_having_filters_records() {
        let plan = plan("cust, sum_quant\n0\ncust\n\n\nsum_quant > 5");
        let mut table = GroupTable::new();
        for row in [sale("A", "NY", 10), sale("B", "NY", 3), sale("C", "CT", 6)] {
            table.update(&plan, &row).unwrap();
        }
        let records = table.finish(&plan).unwrap();
        let keys: Vec<&Datum> = records.iter().map(|r| r.key().get(0).unwrap()).collect();
        assert_eq!(
            keys,
            vec![&Datum::String("A".to_string()), &Datum::String("C".to_string())]
        );
    }

    #[tokio::test]
    async fn test_phi_aggregate_operator() {
        let rows = vec![sale("A", "NY", 10), sale("B", "NJ", 4), sale("A", "NY", 20)];
        let input = Box::new(MemorySource::new(rows));
        let mut agg = PhiAggregate::new(
            input,
            plan("cust, avg_1_quant, avg_2_quant\n2\ncust\n\n1.state = 'NY'; 2.state = 'NJ'"),
        );
        agg.open().await.unwrap();

        let a = agg.next().await.unwrap().unwrap();
        assert_eq!(a.values()[1], Datum::Float(15.0));
        assert_eq!(a.values()[2], Datum::Null);

        let b = agg.next().await.unwrap().unwrap();
        assert_eq!(b.values()[0], Datum::String("B".to_string()));
        assert_eq!(b.values()[2], Datum::Float(4.0));

        assert!(agg.next().await.unwrap().is_none());
        agg.close().await.unwrap();
    }
}
