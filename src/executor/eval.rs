//! Expression evaluation
//!
//! Evaluates a `BoundExpr` against an input row (grouping variable
//! predicates) or a group record (having clause).

use crate::sql::Operator;

use super::bind::BoundExpr;
use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;

/// Values an expression can read
pub trait EvalContext {
    /// Column of the current input row
    fn column(&self, index: usize) -> ExecutorResult<Datum> {
        Err(ExecutorError::Internal(format!(
            "column {} is not available in this context",
            index
        )))
    }

    /// Group-by value of the current group record
    fn group_key(&self, index: usize) -> ExecutorResult<Datum> {
        Err(ExecutorError::Internal(format!(
            "group key {} is not available in this context",
            index
        )))
    }

    /// Finalized aggregate of the current group record
    fn aggregate(&self, index: usize) -> ExecutorResult<Datum> {
        Err(ExecutorError::Internal(format!(
            "aggregate {} is not available in this context",
            index
        )))
    }
}

impl EvalContext for Row {
    fn column(&self, index: usize) -> ExecutorResult<Datum> {
        self.get(index).cloned()
    }
}

/// Evaluate an expression
pub fn eval(expr: &BoundExpr, ctx: &dyn EvalContext) -> ExecutorResult<Datum> {
    match expr {
        BoundExpr::Literal(datum) => Ok(datum.clone()),
        BoundExpr::Column(index) => ctx.column(*index),
        BoundExpr::GroupKey(index) => ctx.group_key(*index),
        BoundExpr::Aggregate(index) => ctx.aggregate(*index),
        BoundExpr::Binary { left, op, right } => {
            let lval = eval(left, ctx)?;
            let rval = eval(right, ctx)?;
            eval_binary_op(*op, &lval, &rval)
        }
        BoundExpr::Chain { op, operands } => {
            let mut acc = Datum::Bool(*op == Operator::And);
            for operand in operands {
                let value = eval(operand, ctx)?;
                acc = match op {
                    Operator::And => eval_and(&acc, &value),
                    _ => eval_or(&acc, &value),
                };
            }
            Ok(acc)
        }
    }
}

/// Evaluate a predicate; anything but true counts as false
pub fn eval_predicate(expr: &BoundExpr, ctx: &dyn EvalContext) -> ExecutorResult<bool> {
    Ok(eval(expr, ctx)?.as_bool().unwrap_or(false))
}

/// Evaluate a binary operation
fn eval_binary_op(op: Operator, left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    // NULL propagation for everything except the logical connectives
    if !matches!(op, Operator::And | Operator::Or) && (left.is_null() || right.is_null()) {
        return Ok(Datum::Null);
    }

    match op {
        Operator::Add => eval_add(left, right),
        Operator::Sub => eval_sub(left, right),
        Operator::Mul => eval_mul(left, right),
        Operator::Div => eval_div(left, right),
        Operator::Mod => eval_mod(left, right),

        Operator::Eq => Ok(Datum::Bool(left == right)),
        Operator::NotEq => Ok(Datum::Bool(left != right)),
        Operator::Lt => Ok(Datum::Bool(left < right)),
        Operator::LtEq => Ok(Datum::Bool(left <= right)),
        Operator::Gt => Ok(Datum::Bool(left > right)),
        Operator::GtEq => Ok(Datum::Bool(left >= right)),

        Operator::And => Ok(eval_and(left, right)),
        Operator::Or => Ok(eval_or(left, right)),

        Operator::Not => Err(ExecutorError::InvalidOperation(
            "not is a prefix operator".to_string(),
        )),
    }
}

fn overflow(op: &str) -> ExecutorError {
    ExecutorError::InvalidOperation(format!("integer overflow in {}", op))
}

fn eval_add(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_add(*b).map(Datum::Int).ok_or_else(|| overflow("+")),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a + b)),
        (Datum::Int(a), Datum::Float(b)) | (Datum::Float(b), Datum::Int(a)) => {
            Ok(Datum::Float(*a as f64 + b))
        }
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot add {:?} and {:?}",
            left, right
        ))),
    }
}

fn eval_sub(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_sub(*b).map(Datum::Int).ok_or_else(|| overflow("-")),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a - b)),
        (Datum::Int(a), Datum::Float(b)) => Ok(Datum::Float(*a as f64 - b)),
        (Datum::Float(a), Datum::Int(b)) => Ok(Datum::Float(a - *b as f64)),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot subtract {:?} from {:?}",
            right, left
        ))),
    }
}

fn eval_mul(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_mul(*b).map(Datum::Int).ok_or_else(|| overflow("*")),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a * b)),
        (Datum::Int(a), Datum::Float(b)) | (Datum::Float(b), Datum::Int(a)) => {
            Ok(Datum::Float(*a as f64 * b))
        }
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot multiply {:?} and {:?}",
            left, right
        ))),
    }
}

fn eval_div(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    if right.as_float() == Some(0.0) {
        return Err(ExecutorError::InvalidOperation(
            "division by zero".to_string(),
        ));
    }

    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_div(*b).map(Datum::Int).ok_or_else(|| overflow("/")),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a / b)),
        (Datum::Int(a), Datum::Float(b)) => Ok(Datum::Float(*a as f64 / b)),
        (Datum::Float(a), Datum::Int(b)) => Ok(Datum::Float(a / *b as f64)),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot divide {:?} by {:?}",
            left, right
        ))),
    }
}

fn eval_mod(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    if let Datum::Int(0) = right {
        return Err(ExecutorError::InvalidOperation(
            "modulo by zero".to_string(),
        ));
    }

    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_rem(*b).map(Datum::Int).ok_or_else(|| overflow("%")),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot compute modulo of {:?} and {:?}",
            left, right
        ))),
    }
}

/// AND with three-valued logic
fn eval_and(left: &Datum, right: &Datum) -> Datum {
    match (left.as_bool(), right.as_bool()) {
        (Some(false), _) | (_, Some(false)) => Datum::Bool(false),
        (Some(true), Some(true)) => Datum::Bool(true),
        _ => Datum::Null,
    }
}

/// OR with three-valued logic
fn eval_or(left: &Datum, right: &Datum) -> Datum {
    match (left.as_bool(), right.as_bool()) {
        (Some(true), _) | (_, Some(true)) => Datum::Bool(true),
        (Some(false), Some(false)) => Datum::Bool(false),
        _ => Datum::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(d: Datum) -> Box<BoundExpr> {
        Box::new(BoundExpr::Literal(d))
    }

    fn binary(left: BoundExpr, op: Operator, right: BoundExpr) -> BoundExpr {
        BoundExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    #[test]
    fn test_eval_column_comparison() {
        let row = Row::new(vec![Datum::String("NY".to_string()), Datum::Int(12)]);
        let expr = binary(
            binary(
                BoundExpr::Column(0),
                Operator::Eq,
                BoundExpr::Literal(Datum::String("NY".to_string())),
            ),
            Operator::And,
            binary(BoundExpr::Column(1), Operator::Gt, BoundExpr::Literal(Datum::Int(10))),
        );
        assert!(eval_predicate(&expr, &row).unwrap());
    }

    #[test]
    fn test_eval_negation_encoding() {
        let row = Row::new(vec![Datum::Int(3)]);
        // not 1.quant = 3  ->  (quant = 3) = false
        let expr = binary(
            binary(BoundExpr::Column(0), Operator::Eq, BoundExpr::Literal(Datum::Int(3))),
            Operator::Eq,
            BoundExpr::Literal(Datum::Bool(false)),
        );
        assert!(!eval_predicate(&expr, &row).unwrap());
    }

    #[test]
    fn test_eval_arithmetic() {
        let row = Row::new(vec![]);
        let expr = BoundExpr::Binary {
            left: lit(Datum::Int(7)),
            op: Operator::Mod,
            right: lit(Datum::Int(4)),
        };
        assert_eq!(eval(&expr, &row).unwrap(), Datum::Int(3));

        let expr = BoundExpr::Binary {
            left: lit(Datum::Int(7)),
            op: Operator::Div,
            right: lit(Datum::Float(2.0)),
        };
        assert_eq!(eval(&expr, &row).unwrap(), Datum::Float(3.5));
    }

    #[test]
    fn test_eval_division_by_zero() {
        let row = Row::new(vec![]);
        let expr = BoundExpr::Binary {
            left: lit(Datum::Int(7)),
            op: Operator::Div,
            right: lit(Datum::Int(0)),
        };
        assert!(matches!(
            eval(&expr, &row),
            Err(ExecutorError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_eval_null_is_not_true() {
        let row = Row::new(vec![]);
        let expr = BoundExpr::Binary {
            left: lit(Datum::Null),
            op: Operator::Gt,
            right: lit(Datum::Int(5)),
        };
        assert_eq!(eval(&expr, &row).unwrap(), Datum::Null);
        assert!(!eval_predicate(&expr, &row).unwrap());

        let expr = BoundExpr::Binary {
            left: Box::new(expr),
            op: Operator::Or,
            right: lit(Datum::Bool(true)),
        };
        assert!(eval_predicate(&expr, &row).unwrap());
    }

    #[test]
    fn test_eval_chain_three_valued() {
        let row = Row::new(vec![]);
        let chain = |op, values: Vec<Datum>| BoundExpr::Chain {
            op,
            operands: values.into_iter().map(BoundExpr::Literal).collect(),
        };

        let all = chain(Operator::And, vec![Datum::Bool(true), Datum::Bool(true), Datum::Bool(true)]);
        assert_eq!(eval(&all, &row).unwrap(), Datum::Bool(true));

        let unknown = chain(Operator::And, vec![Datum::Bool(true), Datum::Null, Datum::Bool(true)]);
        assert_eq!(eval(&unknown, &row).unwrap(), Datum::Null);

        let settled = chain(Operator::And, vec![Datum::Null, Datum::Bool(false)]);
        assert_eq!(eval(&settled, &row).unwrap(), Datum::Bool(false));

        let any = chain(Operator::Or, vec![Datum::Bool(false), Datum::Null, Datum::Bool(true)]);
        assert_eq!(eval(&any, &row).unwrap(), Datum::Bool(true));
        assert!(!eval_predicate(&chain(Operator::Or, vec![Datum::Bool(false), Datum::Null]), &row).unwrap());
    }

    #[test]
    fn test_row_context_rejects_aggregates() {
        let row = Row::new(vec![Datum::Int(1)]);
        assert!(matches!(
            eval(&BoundExpr::Aggregate(0), &row),
            Err(ExecutorError::Internal(_))
        ));
    }
}
