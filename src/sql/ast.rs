//! Predicate language types
//!
//! These types represent parsed grouping-variable predicates, having
//! clauses and projected values. Predicate trees own their children.

use std::fmt;

use chrono::NaiveDate;

use super::error::{SqlError, SqlResult};
use super::token::Token;

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Max,
    Min,
    Count,
    Sum,
    Avg,
}

impl AggregateFunction {
    /// Look up a function by its lowercase name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "max" => Some(AggregateFunction::Max),
            "min" => Some(AggregateFunction::Min),
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "avg" => Some(AggregateFunction::Avg),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Max => "max",
            AggregateFunction::Min => "min",
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregate over every row of a group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeAggregate {
    pub function: AggregateFunction,
    pub attribute: String,
}

/// Aggregate over the rows of a group that satisfy one grouping variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupingAggregate {
    pub function: AggregateFunction,
    pub grouping_var: String,
    pub attribute: String,
}

/// Reference to either aggregate kind, as written `func_attr` or `func_g_attr`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregateRef {
    Attribute(AttributeAggregate),
    Grouping(GroupingAggregate),
}

impl AggregateRef {
    /// Parse `func_attr` or `func_g_attr`.
    ///
    /// Returns `Ok(None)` when `name` has no underscore at all.
    pub fn parse(name: &str) -> SqlResult<Option<AggregateRef>> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() == 1 {
            return Ok(None);
        }
        if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(SqlError::InvalidProjectedValue(name.to_string()));
        }

        let function = AggregateFunction::from_name(parts[0])
            .ok_or_else(|| SqlError::UnknownAggregateFunction(parts[0].to_string()))?;

        let aggregate = if parts.len() == 2 {
            AggregateRef::Attribute(AttributeAggregate {
                function,
                attribute: parts[1].to_string(),
            })
        } else {
            AggregateRef::Grouping(GroupingAggregate {
                function,
                grouping_var: parts[1].to_string(),
                attribute: parts[2].to_string(),
            })
        };
        Ok(Some(aggregate))
    }

    pub fn function(&self) -> AggregateFunction {
        match self {
            AggregateRef::Attribute(a) => a.function,
            AggregateRef::Grouping(g) => g.function,
        }
    }

    /// Attribute the aggregate reads from each row
    pub fn attribute(&self) -> &str {
        match self {
            AggregateRef::Attribute(a) => &a.attribute,
            AggregateRef::Grouping(g) => &g.attribute,
        }
    }

    /// Grouping variable, `None` for attribute aggregates
    pub fn grouping_var(&self) -> Option<&str> {
        match self {
            AggregateRef::Attribute(_) => None,
            AggregateRef::Grouping(g) => Some(&g.grouping_var),
        }
    }
}

impl fmt::Display for AggregateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateRef::Attribute(a) => write!(f, "{}_{}", a.function, a.attribute),
            AggregateRef::Grouping(g) => {
                write!(f, "{}_{}_{}", g.function, g.grouping_var, g.attribute)
            }
        }
    }
}

/// Entry of the projected value list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectedValue {
    Attribute(String),
    Aggregate(AggregateRef),
}

impl ProjectedValue {
    /// Parse one comma-separated projection entry
    pub fn parse(entry: &str) -> SqlResult<Self> {
        let entry = entry.trim();
        if entry.is_empty() || !entry.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SqlError::InvalidProjectedValue(entry.to_string()));
        }
        match AggregateRef::parse(entry)? {
            Some(aggregate) => Ok(ProjectedValue::Aggregate(aggregate)),
            None => Ok(ProjectedValue::Attribute(entry.to_string())),
        }
    }
}

impl fmt::Display for ProjectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectedValue::Attribute(name) => f.write_str(name),
            ProjectedValue::Aggregate(agg) => write!(f, "{}", agg),
        }
    }
}

/// Operator classes, in the order the parser resolves them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Numeric,
    Comparison,
    Logical,
}

/// Binary operators (plus `not`, which only ever appears as a prefix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Numeric
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
    Not,
}

impl Operator {
    /// Classify a token as an operator
    pub fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Symbol(s) => match s.as_str() {
                "+" => Some(Operator::Add),
                "-" => Some(Operator::Sub),
                "*" => Some(Operator::Mul),
                "/" => Some(Operator::Div),
                "%" => Some(Operator::Mod),
                "=" | "==" => Some(Operator::Eq),
                "!=" => Some(Operator::NotEq),
                "<" => Some(Operator::Lt),
                "<=" => Some(Operator::LtEq),
                ">" => Some(Operator::Gt),
                ">=" => Some(Operator::GtEq),
                _ => None,
            },
            Token::Word(w) => {
                if w.eq_ignore_ascii_case("and") {
                    Some(Operator::And)
                } else if w.eq_ignore_ascii_case("or") {
                    Some(Operator::Or)
                } else if w.eq_ignore_ascii_case("not") {
                    Some(Operator::Not)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod => {
                OperatorKind::Numeric
            }
            Operator::Eq
            | Operator::NotEq
            | Operator::Lt
            | Operator::LtEq
            | Operator::Gt
            | Operator::GtEq => OperatorKind::Comparison,
            Operator::And | Operator::Or | Operator::Not => OperatorKind::Logical,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operand of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    String(String),
    Number(i64),
    Boolean(bool),
    Date(NaiveDate),
    /// `g.attr`
    Attribute {
        grouping_var: String,
        attribute: String,
    },
    Aggregate(AggregateRef),
    /// Unparenthesized sub-predicate
    Predicate(Box<Predicate>),
    /// Parenthesized sub-predicate
    Expression(Box<Predicate>),
}

impl PredicateValue {
    pub fn attribute(grouping_var: impl Into<String>, attribute: impl Into<String>) -> Self {
        PredicateValue::Attribute {
            grouping_var: grouping_var.into(),
            attribute: attribute.into(),
        }
    }

    /// Wrap an unparenthesized predicate
    pub fn predicate(left: PredicateValue, op: Operator, right: PredicateValue) -> Self {
        PredicateValue::Predicate(Box::new(Predicate::new(left, op, right)))
    }

    /// Negation, encoded as `inner == false`
    pub fn negate(inner: PredicateValue) -> Self {
        PredicateValue::predicate(inner, Operator::Eq, PredicateValue::Boolean(false))
    }

    /// The nested predicate of a `Predicate` or `Expression` operand
    pub fn as_predicate(&self) -> Option<&Predicate> {
        match self {
            PredicateValue::Predicate(p) | PredicateValue::Expression(p) => Some(p),
            _ => None,
        }
    }

    /// Unwrap into a predicate, dropping any parenthesization
    pub fn into_predicate(self) -> Option<Predicate> {
        match self {
            PredicateValue::Predicate(p) | PredicateValue::Expression(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateValue::String(s) => write!(f, "'{}'", s),
            PredicateValue::Number(n) => write!(f, "{}", n),
            PredicateValue::Boolean(b) => write!(f, "{}", b),
            PredicateValue::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
            PredicateValue::Attribute {
                grouping_var,
                attribute,
            } => write!(f, "{}.{}", grouping_var, attribute),
            PredicateValue::Aggregate(agg) => write!(f, "{}", agg),
            PredicateValue::Predicate(p) => write_bare(p, Slot::CLAUSE, f),
            PredicateValue::Expression(p) => {
                f.write_str("( ")?;
                write_bare(p, Slot::CLAUSE, f)?;
                f.write_str(" )")
            }
        }
    }
}

/// `left op right`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub left: PredicateValue,
    pub op: Operator,
    pub right: PredicateValue,
}

impl Predicate {
    pub fn new(left: PredicateValue, op: Operator, right: PredicateValue) -> Self {
        Predicate { left, op, right }
    }

    /// Every aggregate referenced anywhere in the tree, left to right
    pub fn aggregate_refs(&self) -> Vec<&AggregateRef> {
        let mut out = Vec::new();
        let mut pending = vec![&self.right, &self.left];
        while let Some(value) = pending.pop() {
            match value {
                PredicateValue::Aggregate(agg) => out.push(agg),
                PredicateValue::Predicate(p) | PredicateValue::Expression(p) => {
                    pending.push(&p.right);
                    pending.push(&p.left);
                }
                _ => {}
            }
        }
        out
    }

    /// Operand of a negation that prints as `not x`
    ///
    /// A plain or arithmetic `x` prints as `x = false` and reads back
    /// unchanged, so it does not qualify.
    fn negation(&self) -> Option<&PredicateValue> {
        if self.op != Operator::Eq || !matches!(self.right, PredicateValue::Boolean(false)) {
            return None;
        }
        match &self.left {
            PredicateValue::Predicate(inner) if inner.op.kind() == OperatorKind::Numeric => None,
            value @ (PredicateValue::Predicate(_) | PredicateValue::Expression(_)) => Some(value),
            _ => None,
        }
    }

    /// Whether the unparenthesized text of this predicate reads back as
    /// itself in `slot`
    fn fits(&self, slot: Slot) -> bool {
        let mut current = self;
        loop {
            match current.negation() {
                Some(PredicateValue::Predicate(inner)) if slot.leading_not => current = inner,
                Some(PredicateValue::Predicate(_)) => return false,
                // `not ( x )`, or `( x ) = false` where `not` cannot lead
                Some(_) => return slot.leading_not || Operator::Eq.rank() >= slot.min_rank,
                None => return current.op.rank() >= slot.min_rank,
            }
        }
    }

    /// Grouping variable this predicate defines.
    ///
    /// Only the two operands and, for nested predicate operands, their
    /// operands are inspected.
    pub fn grouping_var(&self) -> Option<&str> {
        fn direct(value: &PredicateValue) -> Option<&str> {
            match value {
                PredicateValue::Attribute { grouping_var, .. } => Some(grouping_var),
                _ => None,
            }
        }

        direct(&self.left)
            .or_else(|| direct(&self.right))
            .or_else(|| {
                [&self.left, &self.right]
                    .into_iter()
                    .filter_map(PredicateValue::as_predicate)
                    .find_map(|p| direct(&p.left).or_else(|| direct(&p.right)))
            })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bare(self, Slot::CLAUSE, f)
    }
}

impl Drop for Predicate {
    // Long and/or chains nest one level per operand; free them without
    // recursing.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        take_children(self, &mut pending);
        while let Some(mut child) = pending.pop() {
            take_children(&mut child, &mut pending);
        }
    }
}

fn take_children(predicate: &mut Predicate, out: &mut Vec<Box<Predicate>>) {
    for value in [&mut predicate.left, &mut predicate.right] {
        if value.as_predicate().is_some() {
            if let PredicateValue::Predicate(child) | PredicateValue::Expression(child) =
                std::mem::replace(value, PredicateValue::Boolean(false))
            {
                out.push(child);
            }
        }
    }
}

/// Operand position as the parser sees it
#[derive(Debug, Clone, Copy)]
struct Slot {
    /// Loosest operator rank that may appear unparenthesized
    min_rank: u8,
    /// Whether a leading `not` reads back in place
    leading_not: bool,
}

impl Slot {
    /// A whole clause
    const CLAUSE: Slot = Slot {
        min_rank: 0,
        leading_not: true,
    };
}

impl Operator {
    /// 0 for `and` up to 3 for arithmetic
    fn rank(&self) -> u8 {
        match self {
            Operator::And | Operator::Not => 0,
            Operator::Or => 1,
            _ if self.kind() == OperatorKind::Comparison => 2,
            _ => 3,
        }
    }

    /// Positions of the left and right operand
    fn operand_slots(&self) -> (Slot, Slot) {
        let slot = |min_rank, leading_not| Slot {
            min_rank,
            leading_not,
        };
        match self {
            // the right side of a chain is the rest of the chain
            Operator::And => (slot(1, false), slot(0, true)),
            Operator::Or => (slot(2, false), slot(1, true)),
            Operator::Not => (slot(4, false), slot(4, false)),
            _ if self.kind() == OperatorKind::Comparison => (slot(3, false), slot(3, false)),
            _ => (slot(4, false), slot(4, false)),
        }
    }
}

/// Print a predicate unparenthesized so that parsing the text in `slot`
/// yields the same tree
fn write_bare(
    mut predicate: &Predicate,
    mut slot: Slot,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    loop {
        match predicate.negation() {
            Some(PredicateValue::Predicate(inner)) => {
                f.write_str("not ")?;
                predicate = inner;
                continue;
            }
            Some(group) if slot.leading_not => return write!(f, "not {}", group),
            _ => {}
        }

        let (left, right) = predicate.op.operand_slots();
        write_operand(&predicate.left, left, f)?;
        write!(f, " {} ", predicate.op)?;
        match &predicate.right {
            PredicateValue::Predicate(next) if next.fits(right) => {
                predicate = next;
                slot = right;
            }
            value => return write_operand(value, right, f),
        }
    }
}

fn write_operand(value: &PredicateValue, slot: Slot, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        PredicateValue::Predicate(p) if p.fits(slot) => write_bare(p, slot, f),
        PredicateValue::Predicate(p) | PredicateValue::Expression(p) => {
            f.write_str("( ")?;
            write_bare(p, Slot::CLAUSE, f)?;
            f.write_str(" )")
        }
        other => write!(f, "{}", other),
    }
}
