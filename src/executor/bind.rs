//! Plan binding against a row schema
//!
//! Resolves every name in a `Phi` to a position before the first row is
//! read: attribute names to column indices, having-clause attributes to
//! group key slots and aggregate references to accumulator slots.
//!
//! Binding also infers a type for every expression. Comparisons need
//! comparable operands, arithmetic needs numbers, `and`/`or` and whole
//! predicates need booleans; anything else is a `TypeMismatch`.

use crate::planner::Phi;
use crate::sql::{
    AggregateFunction, AggregateRef, Operator, OperatorKind, Predicate, PredicateValue,
    ProjectedValue,
};

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::schema::{DataType, Schema};

/// Expression with all names resolved
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Literal(Datum),
    /// Column of the current input row
    Column(usize),
    /// Group-by value of a group record
    GroupKey(usize),
    /// Finalized accumulator of a group record
    Aggregate(usize),
    Binary {
        left: Box<BoundExpr>,
        op: Operator,
        right: Box<BoundExpr>,
    },
    /// `and`/`or` over two or more operands
    Chain { op: Operator, operands: Vec<BoundExpr> },
}

/// Aggregate with its input column resolved
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAggregate {
    pub function: AggregateFunction,
    pub column: usize,
}

/// Grouping variable predicate and the aggregate slots it feeds
#[derive(Debug, Clone, PartialEq)]
pub struct BoundGroupingVar {
    pub name: String,
    pub predicate: BoundExpr,
    pub aggregates: Vec<usize>,
}

/// Where an output column's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    GroupKey(usize),
    Aggregate(usize),
}

/// Output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub source: OutputSource,
}

/// Executable form of a `Phi`
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPlan {
    /// Column indices forming the group key
    pub group_by: Vec<usize>,
    /// One entry per `Phi::aggregates()` slot
    pub aggregates: Vec<BoundAggregate>,
    /// Slots updated for every row
    pub attribute_aggregates: Vec<usize>,
    pub grouping_vars: Vec<BoundGroupingVar>,
    pub having: Option<BoundExpr>,
    pub output: Vec<OutputColumn>,
}

/// Name scope of an expression
#[derive(Clone, Copy)]
enum Scope<'a> {
    /// Grouping variable predicate, evaluated per row
    Row,
    /// Having clause, evaluated per group record
    Group(&'a Phi),
}

impl BoundPlan {
    /// Bind `phi` to `schema`
    pub fn bind(phi: &Phi, schema: &Schema) -> ExecutorResult<BoundPlan> {
        let group_by = phi
            .group_by()
            .iter()
            .map(|name| column_index(schema, name))
            .collect::<ExecutorResult<Vec<_>>>()?;

        let mut aggregates = Vec::with_capacity(phi.aggregates().len());
        let mut attribute_aggregates = Vec::new();
        let mut grouping_vars: Vec<BoundGroupingVar> = phi
            .grouping_var_predicates()
            .map(|(name, predicate)| {
                Ok(BoundGroupingVar {
                    name: name.to_string(),
                    predicate: bind_condition(predicate, schema, Scope::Row)?,
                    aggregates: Vec::new(),
                })
            })
            .collect::<ExecutorResult<_>>()?;

        for (slot, agg) in phi.aggregates().iter().enumerate() {
            aggregate_type(agg, schema)?;
            aggregates.push(BoundAggregate {
                function: agg.function(),
                column: column_index(schema, agg.attribute())?,
            });
            match agg.grouping_var() {
                None => attribute_aggregates.push(slot),
                Some(var) => {
                    let bound = grouping_vars
                        .iter_mut()
                        .find(|gv| gv.name == var)
                        .ok_or_else(|| {
                            ExecutorError::Bind(format!("grouping variable '{}' has no predicate", var))
                        })?;
                    bound.aggregates.push(slot);
                }
            }
        }

        let having = phi
            .having()
            .map(|p| bind_condition(p, schema, Scope::Group(phi)))
            .transpose()?;

        let output = phi
            .projected_values()
            .iter()
            .map(|value| output_column(phi, value))
            .collect::<ExecutorResult<_>>()?;

        Ok(BoundPlan {
            group_by,
            aggregates,
            attribute_aggregates,
            grouping_vars,
            having,
            output,
        })
    }

    /// Output column names, in projection order
    pub fn column_names(&self) -> Vec<String> {
        self.output.iter().map(|c| c.name.clone()).collect()
    }
}

fn column_index(schema: &Schema, name: &str) -> ExecutorResult<usize> {
    schema
        .column_index(name)
        .ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()))
}

fn output_column(phi: &Phi, value: &ProjectedValue) -> ExecutorResult<OutputColumn> {
    let source = match value {
        ProjectedValue::Attribute(name) => phi
            .group_by()
            .iter()
            .position(|g| g == name)
            .map(OutputSource::GroupKey),
        ProjectedValue::Aggregate(agg) => phi.aggregate_index(agg).map(OutputSource::Aggregate),
    };
    let source =
        source.ok_or_else(|| ExecutorError::Internal(format!("unplanned output column {}", value)))?;
    Ok(OutputColumn {
        name: value.to_string(),
        source,
    })
}

/// Output type of an aggregate, checked against its input column
fn aggregate_type(agg: &AggregateRef, schema: &Schema) -> ExecutorResult<DataType> {
    let index = column_index(schema, agg.attribute())?;
    let input = schema.columns()[index].data_type;
    match (agg.function(), input) {
        (AggregateFunction::Count, _) => Ok(DataType::Int),
        (AggregateFunction::Max | AggregateFunction::Min, input) => Ok(input),
        (AggregateFunction::Sum, DataType::Int) => Ok(DataType::Int),
        (AggregateFunction::Sum, DataType::Float) => Ok(DataType::Float),
        (AggregateFunction::Avg, DataType::Int | DataType::Float) => Ok(DataType::Float),
        (_, other) => Err(ExecutorError::TypeMismatch {
            expected: DataType::Float,
            got: Some(other),
            context: agg.to_string(),
        }),
    }
}

fn is_numeric(data_type: DataType) -> bool {
    matches!(data_type, DataType::Int | DataType::Float)
}

fn check_is_boolean(data_type: DataType, context: &dyn std::fmt::Display) -> ExecutorResult<()> {
    if data_type == DataType::Boolean {
        Ok(())
    } else {
        Err(ExecutorError::TypeMismatch {
            expected: DataType::Boolean,
            got: Some(data_type),
            context: context.to_string(),
        })
    }
}

/// Result type of `left op right`
fn binary_type(
    left: DataType,
    op: Operator,
    right: DataType,
    predicate: &Predicate,
) -> ExecutorResult<DataType> {
    let mismatch = |expected: DataType, got: DataType| ExecutorError::TypeMismatch {
        expected,
        got: Some(got),
        context: predicate.to_string(),
    };

    match op.kind() {
        OperatorKind::Numeric => {
            let operand = if op == Operator::Mod { DataType::Int } else { DataType::Float };
            for side in [left, right] {
                let accepted = match op {
                    Operator::Mod => side == DataType::Int,
                    _ => is_numeric(side),
                };
                if !accepted {
                    return Err(mismatch(operand, side));
                }
            }
            if left == DataType::Int && right == DataType::Int {
                Ok(DataType::Int)
            } else {
                Ok(DataType::Float)
            }
        }
        OperatorKind::Comparison => {
            if left == right || (is_numeric(left) && is_numeric(right)) {
                Ok(DataType::Boolean)
            } else {
                Err(mismatch(left, right))
            }
        }
        OperatorKind::Logical => {
            check_is_boolean(left, predicate)?;
            check_is_boolean(right, predicate)?;
            Ok(DataType::Boolean)
        }
    }
}

/// Bind a whole grouping variable predicate or having clause
fn bind_condition(predicate: &Predicate, schema: &Schema, scope: Scope) -> ExecutorResult<BoundExpr> {
    let (expr, data_type) = bind_predicate(predicate, schema, scope)?;
    check_is_boolean(data_type, predicate)?;
    Ok(expr)
}

fn bind_predicate(
    predicate: &Predicate,
    schema: &Schema,
    scope: Scope,
) -> ExecutorResult<(BoundExpr, DataType)> {
    match predicate.op {
        Operator::And | Operator::Or => bind_chain(predicate, schema, scope),
        Operator::Not => Err(ExecutorError::Internal(format!(
            "'not' used as a binary operator in {}",
            predicate
        ))),
        op => {
            let (left, left_type) = bind_value(&predicate.left, schema, scope)?;
            let (right, right_type) = bind_value(&predicate.right, schema, scope)?;
            let data_type = binary_type(left_type, op, right_type, predicate)?;
            let expr = BoundExpr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
            Ok((expr, data_type))
        }
    }
}

/// Flatten a right-leaning run of one connective into a `Chain`
fn bind_chain(
    predicate: &Predicate,
    schema: &Schema,
    scope: Scope,
) -> ExecutorResult<(BoundExpr, DataType)> {
    let mut operands = Vec::new();
    let mut current = predicate;
    loop {
        operands.push(bind_operand(&current.left, current, schema, scope)?);
        match &current.right {
            PredicateValue::Predicate(next) if next.op == predicate.op => current = next,
            last => {
                operands.push(bind_operand(last, current, schema, scope)?);
                break;
            }
        }
    }
    let expr = BoundExpr::Chain {
        op: predicate.op,
        operands,
    };
    Ok((expr, DataType::Boolean))
}

fn bind_operand(
    value: &PredicateValue,
    parent: &Predicate,
    schema: &Schema,
    scope: Scope,
) -> ExecutorResult<BoundExpr> {
    let (expr, data_type) = bind_value(value, schema, scope)?;
    check_is_boolean(data_type, parent)?;
    Ok(expr)
}

fn bind_value(
    value: &PredicateValue,
    schema: &Schema,
    scope: Scope,
) -> ExecutorResult<(BoundExpr, DataType)> {
    if let Some(datum) = Datum::from_literal(value) {
        let data_type = datum
            .data_type()
            .ok_or_else(|| ExecutorError::Internal(format!("untyped literal {}", value)))?;
        return Ok((BoundExpr::Literal(datum), data_type));
    }

    let column_type = |index: usize| schema.columns()[index].data_type;

    match (value, scope) {
        (PredicateValue::Predicate(p) | PredicateValue::Expression(p), _) => {
            bind_predicate(p, schema, scope)
        }

        (PredicateValue::Attribute { attribute, .. }, Scope::Row) => {
            let index = column_index(schema, attribute)?;
            Ok((BoundExpr::Column(index), column_type(index)))
        }

        (PredicateValue::Attribute { attribute, .. }, Scope::Group(phi)) => {
            let index = column_index(schema, attribute)?;
            let slot = phi.group_by().iter().position(|g| g == attribute).ok_or_else(|| {
                ExecutorError::Bind(format!(
                    "'{}' is not a group-by attribute and cannot appear in the having clause",
                    attribute
                ))
            })?;
            Ok((BoundExpr::GroupKey(slot), column_type(index)))
        }

        (PredicateValue::Aggregate(agg), Scope::Row) => Err(ExecutorError::Bind(format!(
            "aggregate '{}' cannot appear in a grouping variable predicate",
            agg
        ))),

        (PredicateValue::Aggregate(agg), Scope::Group(phi)) => {
            let slot = phi
                .aggregate_index(agg)
                .ok_or_else(|| ExecutorError::Internal(format!("unplanned aggregate {}", agg)))?;
            Ok((BoundExpr::Aggregate(slot), aggregate_type(agg, schema)?))
        }

        _ => Err(ExecutorError::Internal(format!(
            "unsupported operand {}",
            value
        ))),
    }
}
