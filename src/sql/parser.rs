//! Recursive-descent predicate parser
//!
//! Precedence levels, loosest first: `and`, `or`, comparison, numeric,
//! value. Each level splits on the first of its operators found at
//! parenthesis depth 0; repeated `and`/`or` chain to the right.
//!
//! Recursion only follows parentheses and `not`, both capped at
//! `MAX_NESTING_DEPTH`. And/or chains are folded in a loop.

use std::iter;

use chrono::NaiveDate;

use super::ast::{AggregateRef, Operator, OperatorKind, PredicateValue};
use super::error::{SqlError, SqlResult};
use super::token::{tokenize, Token};

/// Deepest parenthesis and `not` nesting a clause may use
pub const MAX_NESTING_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    And,
    Or,
    Comparison,
    Numeric,
    Value,
}

/// Predicate parser
pub struct Parser;

impl Parser {
    /// Tokenize and parse a clause
    pub fn parse_clause(clause: &str) -> SqlResult<PredicateValue> {
        let tokens = tokenize(clause)?;
        Self::parse(&tokens)
    }

    /// Parse a token list into a predicate tree
    pub fn parse(tokens: &[Token]) -> SqlResult<PredicateValue> {
        if tokens.is_empty() {
            return Err(SqlError::NoTokens(String::new()));
        }
        check_parentheses(tokens)?;
        check_not_positions(tokens)?;
        parse_level(tokens, Level::And, 0)
    }
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_parentheses(tokens: &[Token]) -> SqlResult<()> {
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SqlError::InvalidToken(token.to_string()))?;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(SqlError::MissingClosingParenthesis(render(tokens)));
    }
    Ok(())
}

/// `not` is prefix only: reject it right after an operand
fn check_not_positions(tokens: &[Token]) -> SqlResult<()> {
    for pair in tokens.windows(2) {
        if !pair[1].is_keyword("not") {
            continue;
        }
        let follows_operand = match &pair[0] {
            Token::LParen | Token::Symbol(_) => false,
            Token::Word(_) => Operator::from_token(&pair[0]).is_none(),
            Token::AttributeRef { .. } | Token::Quoted(_) | Token::RParen => true,
        };
        if follows_operand {
            return Err(SqlError::RightHandSideHasNotOperator(render(tokens)));
        }
    }
    Ok(())
}

/// Index of the `)` balancing the `(` at `open`
fn matching_paren(tokens: &[Token], open: usize) -> SqlResult<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(SqlError::MissingClosingParenthesis(render(tokens)))
}

/// Every depth-0 occurrence of `op`
fn find_all(tokens: &[Token], op: Operator) -> Vec<usize> {
    let mut depth = 0usize;
    let mut found = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if depth == 0 && Operator::from_token(token) == Some(op) => found.push(i),
            _ => {}
        }
    }
    found
}

fn nest(depth: usize) -> SqlResult<usize> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(SqlError::NestingTooDeep(MAX_NESTING_DEPTH));
    }
    Ok(depth + 1)
}

/// First depth-0 operator accepted by `wanted`
fn find_split(tokens: &[Token], wanted: impl Fn(Operator) -> bool) -> Option<(usize, Operator)> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                if let Some(op) = Operator::from_token(token) {
                    if wanted(op) {
                        return Some((i, op));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_level(tokens: &[Token], level: Level, depth: usize) -> SqlResult<PredicateValue> {
    let first = tokens
        .first()
        .ok_or_else(|| SqlError::UnexpectedEndOfClause(String::new()))?;

    if *first == Token::LParen {
        let close = matching_paren(tokens, 0)?;
        if close == tokens.len() - 1 {
            let inner = &tokens[1..close];
            if inner.is_empty() {
                return Err(SqlError::UnexpectedEndOfClause("(".to_string()));
            }
            return Ok(match parse_level(inner, Level::And, nest(depth)?)? {
                PredicateValue::Predicate(p) => PredicateValue::Expression(p),
                other => other,
            });
        }

        // Group followed by an operator; the split below binds it
        let trailing = &tokens[close + 1];
        match Operator::from_token(trailing) {
            None => return Err(SqlError::InvalidToken(trailing.to_string())),
            Some(Operator::Not) => {
                return Err(SqlError::RightHandSideHasNotOperator(render(tokens)))
            }
            Some(_) => {}
        }
    }

    if first.is_keyword("not") {
        let rest = &tokens[1..];
        if rest.is_empty() {
            return Err(SqlError::UnexpectedEndOfClause(first.to_string()));
        }
        return Ok(PredicateValue::negate(parse_level(rest, level, nest(depth)?)?));
    }

    match level {
        Level::And => parse_chain(tokens, Operator::And, Level::Or, depth),
        Level::Or => parse_chain(tokens, Operator::Or, Level::Comparison, depth),
        Level::Comparison => {
            parse_single(tokens, OperatorKind::Comparison, Level::Numeric, depth)
        }
        Level::Numeric => parse_single(tokens, OperatorKind::Numeric, Level::Value, depth),
        Level::Value => parse_value(tokens),
    }
}

/// `lower (op lower)*`, chained to the right
///
/// A `not` opening an operand other than the first negates the rest of
/// the chain from that operand on.
fn parse_chain(
    tokens: &[Token],
    chain_op: Operator,
    lower: Level,
    depth: usize,
) -> SqlResult<PredicateValue> {
    let splits = find_all(tokens, chain_op);
    if splits.is_empty() {
        return parse_level(tokens, lower, depth);
    }

    let mut operands = Vec::with_capacity(splits.len() + 1);
    let mut depth = depth;
    let mut start = 0;
    for end in splits.iter().copied().chain(iter::once(tokens.len())) {
        let mut operand = &tokens[start..end];
        let mut negations = 0;
        if start > 0 {
            while operand.first().is_some_and(|t| t.is_keyword("not")) {
                operand = &operand[1..];
                negations += 1;
                depth = nest(depth)?;
            }
        }
        if operand.is_empty() {
            // the operator or `not` right before the gap, or the one after a leading gap
            let at = if start > 0 { end - 1 } else { end };
            return Err(SqlError::UnexpectedEndOfClause(tokens[at].to_string()));
        }
        operands.push((parse_level(operand, lower, depth)?, negations));
        start = end + 1;
    }

    let mut folded: Option<PredicateValue> = None;
    for (value, negations) in operands.into_iter().rev() {
        let mut tail = match folded {
            Some(right) => PredicateValue::predicate(value, chain_op, right),
            None => value,
        };
        for _ in 0..negations {
            tail = PredicateValue::negate(tail);
        }
        folded = Some(tail);
    }
    folded.ok_or_else(|| SqlError::UnexpectedEndOfClause(chain_op.to_string()))
}

/// `lower (op lower)?`
fn parse_single(
    tokens: &[Token],
    kind: OperatorKind,
    lower: Level,
    depth: usize,
) -> SqlResult<PredicateValue> {
    let Some((i, op)) = find_split(tokens, |op| op.kind() == kind) else {
        return parse_level(tokens, lower, depth);
    };
    let (left, right) = split_at(tokens, i)?;
    Ok(PredicateValue::predicate(
        parse_level(left, lower, depth)?,
        op,
        parse_level(right, lower, depth)?,
    ))
}

fn split_at(tokens: &[Token], i: usize) -> SqlResult<(&[Token], &[Token])> {
    let (left, right) = (&tokens[..i], &tokens[i + 1..]);
    if left.is_empty() || right.is_empty() {
        return Err(SqlError::UnexpectedEndOfClause(tokens[i].to_string()));
    }
    Ok((left, right))
}

fn parse_value(tokens: &[Token]) -> SqlResult<PredicateValue> {
    if let Some(extra) = tokens.get(1) {
        return Err(SqlError::InvalidToken(extra.to_string()));
    }

    match &tokens[0] {
        Token::AttributeRef {
            grouping_var,
            attribute,
        } => Ok(PredicateValue::attribute(grouping_var, attribute)),
        Token::Quoted(text) => Ok(parse_quoted(text)),
        Token::Word(word) => parse_word(word),
        other => Err(SqlError::InvalidToken(other.to_string())),
    }
}

fn parse_quoted(text: &str) -> PredicateValue {
    if text.len() == 10 {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return PredicateValue::Date(date);
        }
    }
    PredicateValue::String(text.to_string())
}

fn parse_word(word: &str) -> SqlResult<PredicateValue> {
    if word.eq_ignore_ascii_case("true") {
        return Ok(PredicateValue::Boolean(true));
    }
    if word.eq_ignore_ascii_case("false") {
        return Ok(PredicateValue::Boolean(false));
    }
    if let Ok(n) = word.parse::<i64>() {
        return Ok(PredicateValue::Number(n));
    }
    match AggregateRef::parse(word) {
        Ok(Some(agg)) => Ok(PredicateValue::Aggregate(agg)),
        _ => Err(SqlError::InvalidToken(word.to_string())),
    }
}
