//! Datum type - runtime values in the executor

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;

use crate::sql::PredicateValue;

use super::schema::DataType;

/// 2^63, the first float past `i64::MAX`
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NumericKey {
    Int(i64),
    Float(u64),
}

/// A single value in a row or group record
#[derive(Debug, Clone, Default)]
pub enum Datum {
    /// No value; rendered as "No Data"
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
}

impl Datum {
    /// Check if this datum is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Get a numeric type tag for ordering different types
    fn type_tag(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Bool(_) => 1,
            Datum::Int(_) => 2,
            Datum::Float(_) => 3,
            Datum::String(_) => 4,
            Datum::Date(_) => 5,
        }
    }

    /// Get the data type of this datum
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Datum::Null => None,
            Datum::Bool(_) => Some(DataType::Boolean),
            Datum::Int(_) => Some(DataType::Int),
            Datum::Float(_) => Some(DataType::Float),
            Datum::String(_) => Some(DataType::Text),
            Datum::Date(_) => Some(DataType::Date),
        }
    }

    /// Convert to boolean, returns None if NULL or not a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to i64, returns None if not an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to f64, returns None if NULL or not numeric
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Datum::Float(f) => Some(*f),
            Datum::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to string reference, returns None if not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Datum::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Canonical form of a numeric value
    ///
    /// An integral float inside the i64 range takes the integer form, so
    /// `Int(3)` and `Float(3.0)` share one key.
    fn numeric_key(&self) -> Option<NumericKey> {
        match self {
            Datum::Int(i) => Some(NumericKey::Int(*i)),
            Datum::Float(f) => {
                if f.fract() == 0.0 && *f >= -I64_BOUND && *f < I64_BOUND {
                    Some(NumericKey::Int(*f as i64))
                } else {
                    Some(NumericKey::Float(f.to_bits()))
                }
            }
            _ => None,
        }
    }

    /// Create a Datum from a literal predicate operand.
    ///
    /// Returns None for attribute, aggregate and predicate operands.
    pub fn from_literal(value: &PredicateValue) -> Option<Self> {
        match value {
            PredicateValue::String(s) => Some(Datum::String(s.clone())),
            PredicateValue::Number(n) => Some(Datum::Int(*n)),
            PredicateValue::Boolean(b) => Some(Datum::Bool(*b)),
            PredicateValue::Date(d) => Some(Datum::Date(*d)),
            _ => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("No Data"),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::Float(v) => write!(f, "{}", v),
            Datum::String(s) => f.write_str(s),
            Datum::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Null, Datum::Null) => true,
            (Datum::Bool(a), Datum::Bool(b)) => a == b,
            (Datum::String(a), Datum::String(b)) => a == b,
            (Datum::Date(a), Datum::Date(b)) => a == b,
            _ => match (self.numeric_key(), other.numeric_key()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Datum {}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // NULLs sort first (smallest)
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Null, _) => Ordering::Less,
            (_, Datum::Null) => Ordering::Greater,

            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::String(a), Datum::String(b)) => a.cmp(b),
            (Datum::Date(a), Datum::Date(b)) => a.cmp(b),

            _ => match (self.numeric_key(), other.numeric_key()) {
                (Some(NumericKey::Int(a)), Some(NumericKey::Int(b))) => a.cmp(&b),
                (Some(a), Some(b)) => {
                    let (x, y) = (self.as_float(), other.as_float());
                    let by_value = match (x, y) {
                        (Some(x), Some(y)) => x.total_cmp(&y),
                        _ => Ordering::Equal,
                    };
                    // Equal floats with different keys: integer form first
                    by_value.then_with(|| match (a, b) {
                        (NumericKey::Int(_), NumericKey::Float(_)) => Ordering::Less,
                        (NumericKey::Float(_), NumericKey::Int(_)) => Ordering::Greater,
                        _ => Ordering::Equal,
                    })
                }
                // Different types: use type tag for stable ordering
                _ => self.type_tag().cmp(&other.type_tag()),
            },
        }
    }
}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Int and Float share a tag so equal numerics hash alike
        match self.numeric_key() {
            Some(key) => {
                self.type_tag().min(2).hash(state);
                key.hash(state);
            }
            None => {
                self.type_tag().hash(state);
                match self {
                    Datum::Bool(b) => b.hash(state),
                    Datum::String(s) => s.hash(state),
                    Datum::Date(d) => d.hash(state),
                    Datum::Null | Datum::Int(_) | Datum::Float(_) => {}
                }
            }
        }
    }
}
